//! Integration tests for the Prometheus exporter.
//!
//! These tests drive the full flow from a gpsd connection to the HTTP
//! /metrics endpoint.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use gpsd_common::classify;
use gpsd_exporter_prometheus::config::PrometheusConfig;
use gpsd_exporter_prometheus::mapping::{DeviceGauge, SatelliteGauge};
use gpsd_exporter_prometheus::{
    Exposition, GpsdClient, HttpServer, MetricsRegistry, SessionStats, SharedRegistry,
    TelemetryBridge,
};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

const DEVICE: &str = "/dev/ttyACM0";

const VERSION: &str = r#"{"class":"VERSION","release":"3.25","rev":"3.25","proto_major":3,"proto_minor":15}"#;
const TPV: &str = r#"{"class":"TPV","device":"/dev/ttyACM0","mode":3,"lat":52.520008,"lon":13.404954,"alt":35.5,"track":271.3,"speed":0.012,"climb":-0.01,"ept":0.005,"epx":2.385,"epy":3.011,"epv":5.12}"#;
const TPV_NO_FIX: &str = r#"{"class":"TPV","device":"/dev/ttyACM0","mode":1}"#;
const SKY_FIRST: &str = r#"{"class":"SKY","device":"/dev/ttyACM0","hdop":0.95,"pdop":1.52,"satellites":[{"PRN":2,"el":64,"az":280,"ss":41,"used":true},{"PRN":5,"el":21,"az":55,"ss":30,"used":true},{"PRN":7,"el":10,"az":12,"ss":18,"used":false}]}"#;
const SKY_SECOND: &str = r#"{"class":"SKY","device":"/dev/ttyACM0","hdop":1.1,"pdop":1.9,"satellites":[{"PRN":5,"el":22,"az":56,"ss":31,"used":true},{"PRN":30,"el":44,"az":190,"ss":37,"used":true}]}"#;

fn create_registry() -> SharedRegistry {
    Arc::new(MetricsRegistry::new())
}

fn prns(list: &[&str]) -> BTreeSet<String> {
    list.iter().map(|p| p.to_string()).collect()
}

/// Accept one client, return the command it sent, then stream `lines` and close.
async fn spawn_fake_gpsd(lines: Vec<&'static str>) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();

    let handle = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let (read_half, mut write_half) = stream.into_split();

        let mut command = String::new();
        BufReader::new(read_half)
            .read_line(&mut command)
            .await
            .unwrap();

        for line in lines {
            write_half.write_all(line.as_bytes()).await.unwrap();
            write_half.write_all(b"\n").await.unwrap();
        }
        write_half.shutdown().await.unwrap();
        command
    });

    (addr, handle)
}

/// Run a full gpsd session into a fresh registry.
async fn run_session(lines: Vec<&'static str>) -> (SharedRegistry, SessionStats, String) {
    let (addr, gpsd) = spawn_fake_gpsd(lines).await;
    let registry = create_registry();

    let client = GpsdClient::connect(&addr).await.unwrap();
    assert_eq!(client.address(), addr);

    let (tx, rx) = mpsc::channel(16);
    let source = tokio::spawn(client.run(tx));
    TelemetryBridge::new(registry.clone()).run(rx).await;

    let stats = source.await.unwrap();
    let command = gpsd.await.unwrap();
    (registry, stats, command)
}

#[tokio::test]
async fn test_session_sends_watch_command() {
    let (_, _, command) = run_session(vec![VERSION]).await;

    assert_eq!(command, "?WATCH={\"enable\":true,\"json\":true}\n");
}

#[tokio::test]
async fn test_full_flow_position_and_sky() {
    let (registry, stats, _) = run_session(vec![VERSION, TPV, SKY_FIRST]).await;

    assert_eq!(
        stats,
        SessionStats {
            lines: 3,
            reports: 3,
            malformed: 0
        }
    );

    let snapshot = registry.snapshot();
    assert_eq!(snapshot.device_value(DeviceGauge::FixMode, DEVICE), Some(3.0));
    assert_eq!(
        snapshot.device_value(DeviceGauge::Latitude, DEVICE),
        Some(52.520008)
    );
    assert_eq!(snapshot.device_value(DeviceGauge::Altitude, DEVICE), Some(35.5));
    assert_eq!(
        snapshot.device_value(DeviceGauge::DopHorizontal, DEVICE),
        Some(0.95)
    );
    assert_eq!(
        snapshot.device_value(DeviceGauge::SatellitesTotal, DEVICE),
        Some(3.0)
    );
    assert_eq!(
        snapshot.device_value(DeviceGauge::SatellitesUsed, DEVICE),
        Some(3.0)
    );
    assert_eq!(
        snapshot.satellite_value(SatelliteGauge::SignalNoiseRatio, DEVICE, "2"),
        Some(41.0)
    );

    let stats = registry.stats();
    assert_eq!(stats.reports_received, 3);
    assert_eq!(stats.unrecognized_reports, 1);
}

#[tokio::test]
async fn test_full_flow_replaces_satellite_set() {
    let (registry, _, _) = run_session(vec![SKY_FIRST, SKY_SECOND]).await;

    let snapshot = registry.snapshot();
    for family in SatelliteGauge::ALL {
        assert_eq!(snapshot.prns(family, DEVICE), prns(&["30", "5"]));
    }
    assert_eq!(
        snapshot.satellite_value(SatelliteGauge::Azimuth, DEVICE, "5"),
        Some(56.0)
    );
    assert_eq!(
        snapshot.device_value(DeviceGauge::SatellitesTotal, DEVICE),
        Some(2.0)
    );
}

#[tokio::test]
async fn test_full_flow_keeps_last_known_position() {
    let (registry, _, _) = run_session(vec![TPV, TPV_NO_FIX]).await;

    let snapshot = registry.snapshot();
    assert_eq!(snapshot.device_value(DeviceGauge::FixMode, DEVICE), Some(1.0));
    assert_eq!(
        snapshot.device_value(DeviceGauge::Longitude, DEVICE),
        Some(13.404954)
    );
}

#[tokio::test]
async fn test_full_flow_skips_garbage() {
    let (registry, stats, _) = run_session(vec!["not json", TPV, "{\"oops\":"]).await;

    assert_eq!(stats.malformed, 2);
    assert_eq!(stats.reports, 1);
    assert_eq!(registry.stats().position_reports, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_scrapes_see_whole_satellite_sets() {
    let registry = create_registry();
    let bridge = TelemetryBridge::new(registry.clone());

    let first = classify(SKY_FIRST).unwrap();
    let second = classify(SKY_SECOND).unwrap();
    let first_set = prns(&["2", "5", "7"]);
    let second_set = prns(&["30", "5"]);

    bridge.handle(&first);

    let writer = tokio::spawn(async move {
        for i in 0..2000 {
            if i % 2 == 0 {
                bridge.handle(&second);
            } else {
                bridge.handle(&first);
            }
            if i % 100 == 0 {
                tokio::task::yield_now().await;
            }
        }
    });

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let registry = registry.clone();
            let first_set = first_set.clone();
            let second_set = second_set.clone();
            tokio::spawn(async move {
                for _ in 0..500 {
                    let snapshot = registry.snapshot();
                    let azimuths = snapshot.prns(SatelliteGauge::Azimuth, DEVICE);
                    assert!(
                        azimuths == first_set || azimuths == second_set,
                        "mixed satellite set: {:?}",
                        azimuths
                    );
                    for family in SatelliteGauge::ALL {
                        assert_eq!(snapshot.prns(family, DEVICE), azimuths);
                    }
                    assert_eq!(
                        snapshot.device_value(DeviceGauge::SatellitesTotal, DEVICE),
                        Some(azimuths.len() as f64)
                    );
                    tokio::task::yield_now().await;
                }
            })
        })
        .collect();

    writer.await.unwrap();
    for reader in readers {
        reader.await.unwrap();
    }
}

#[tokio::test]
async fn test_http_server_metrics_endpoint() {
    let (registry, _, _) = run_session(vec![TPV, SKY_FIRST]).await;
    let exposition = Arc::new(Exposition::new(registry, &PrometheusConfig::default()));

    // Bind first so the port is known before serving
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let server = HttpServer::new(exposition, addr, "/metrics".to_string());
    let server_handle = tokio::spawn(server.serve(listener, shutdown_rx));

    let client = reqwest::Client::new();
    let metrics = client
        .get(format!("http://{}/metrics", addr))
        .send()
        .await
        .unwrap();
    assert!(metrics.status().is_success());
    let body = metrics.text().await.unwrap();

    let ready = client
        .get(format!("http://{}/ready", addr))
        .send()
        .await
        .unwrap();
    assert!(ready.status().is_success());

    // Shutdown server
    shutdown_tx.send(true).unwrap();
    let result = tokio::time::timeout(Duration::from_secs(2), server_handle)
        .await
        .expect("server should stop after shutdown");
    assert!(result.unwrap().is_ok());

    assert!(body.contains("# TYPE gpsd_latitude gauge"));
    assert!(body.contains("gpsd_latitude{device=\"/dev/ttyACM0\"} 52.520008"));
    assert!(body.contains("gpsd_space_vehicle_azimuth{device=\"/dev/ttyACM0\",prn=\"7\"} 12"));
    assert!(body.contains("gpsd_space_vehicles_used{device=\"/dev/ttyACM0\"} 3"));
    assert!(body.contains("gpsd_exporter_reports_total{class=\"sky\"} 1"));
    assert!(body.ends_with("# EOF\n"));
}

#[tokio::test]
async fn test_http_server_bind_failure_is_reported() {
    let occupied = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = occupied.local_addr().unwrap();
    let exposition = Arc::new(Exposition::new(
        create_registry(),
        &PrometheusConfig::default(),
    ));
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);

    let result = HttpServer::new(exposition, addr, "/metrics".to_string())
        .run(shutdown_rx)
        .await;

    let err = result.unwrap_err();
    assert!(err.to_string().contains("Failed to bind"));
}
