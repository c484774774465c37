//! Prometheus exporter for gpsd.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};

use gpsd_exporter_prometheus::{
    Exposition, ExporterConfig, GpsdClient, HttpServer, MetricsRegistry, TelemetryBridge,
};

/// Prometheus exporter for gpsd.
#[derive(Parser, Debug)]
#[command(name = "gpsd-exporter-prometheus")]
#[command(about = "Export gpsd position and satellite data as Prometheus metrics")]
#[command(version)]
struct Args {
    /// Path to configuration file (JSON5 format).
    #[arg(short, long)]
    config: Option<String>,

    /// gpsd address as host:port (overrides config, default localhost:2947).
    #[arg(long)]
    gpsd: Option<String>,

    /// HTTP listen address (overrides config, default 0.0.0.0:2112).
    #[arg(long)]
    listen: Option<String>,

    /// Log level: trace, debug, info, warn, error (overrides config).
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load configuration
    let mut config = match &args.config {
        Some(path) => ExporterConfig::load_from_file(path)
            .with_context(|| format!("Failed to load config from {}", path))?,
        None => ExporterConfig::default(),
    };

    // CLI overrides
    if let Some(gpsd) = args.gpsd {
        config.gpsd.address = gpsd;
    }
    if let Some(listen) = args.listen {
        config.prometheus.listen = listen;
    }
    if let Some(level) = args.log_level {
        config.logging.level = level;
    }
    config.validate()?;

    gpsd_common::init_tracing(&config.logging)?;

    info!("Starting gpsd Prometheus exporter");

    let listen_addr: SocketAddr = config
        .prometheus
        .listen
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid listen address: {}", e))?;

    let registry = Arc::new(MetricsRegistry::new());
    let exposition = Arc::new(Exposition::new(registry.clone(), &config.prometheus));

    // Connection failure at startup is fatal
    let client = GpsdClient::connect(&config.gpsd.address).await?;

    // Create shutdown signal
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Start HTTP server
    let http_server = HttpServer::new(exposition, listen_addr, config.prometheus.path.clone());
    let mut http_task = tokio::spawn(http_server.run(shutdown_rx));

    // Start gpsd reader
    let (report_tx, report_rx) = mpsc::channel(config.gpsd.channel_capacity);
    let source_task = tokio::spawn(client.run(report_tx));

    let bridge = TelemetryBridge::new(registry.clone());
    let mut http_error: Option<anyhow::Error> = None;

    tokio::select! {
        handled = bridge.run(report_rx) => {
            info!(handled, "gpsd connection closed, shutting down...");
        }
        result = &mut http_task => {
            let e = match result {
                Ok(Ok(())) => anyhow::anyhow!("HTTP server exited unexpectedly"),
                Ok(Err(e)) => e,
                Err(e) => anyhow::anyhow!("HTTP server task failed: {}", e),
            };
            error!("{:#}", e);
            http_error = Some(e);
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down...");
        }
        _ = terminate_signal() => {
            info!("Received SIGTERM, shutting down...");
        }
    }

    // Signal shutdown; the HTTP task may already be gone
    let _ = shutdown_tx.send(true);
    source_task.abort();

    // Wait for tasks to complete
    let _ = tokio::time::timeout(Duration::from_secs(5), async {
        if !http_task.is_finished() {
            let _ = http_task.await;
        }
        let _ = source_task.await;
    })
    .await;

    // Print final stats
    let stats = registry.stats();
    info!(
        reports_received = stats.reports_received,
        position_reports = stats.position_reports,
        sky_reports = stats.sky_reports,
        unrecognized_reports = stats.unrecognized_reports,
        series_count = registry.series_count(),
        "Final statistics"
    );

    if let Some(e) = http_error {
        return Err(e);
    }

    info!("Exporter stopped");
    Ok(())
}

/// Resolve when the process receives SIGTERM.
async fn terminate_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        std::future::pending::<()>().await;
    }
}
