//! OpenMetrics text exposition of the registry, via `prometheus-client`.

use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Arc;

use gpsd_common::ReportKind;
use prometheus_client::collector::Collector;
use prometheus_client::encoding::{DescriptorEncoder, EncodeMetric};
use prometheus_client::metrics::MetricType;
use prometheus_client::metrics::counter::ConstCounter;
use prometheus_client::metrics::gauge::ConstGauge;
use prometheus_client::registry::Registry;

use crate::config::PrometheusConfig;
use crate::mapping::{DEVICE_LABEL, DeviceGauge, PRN_LABEL, SatelliteGauge, escape_label_value};
use crate::registry::SharedRegistry;

/// Content type of the rendered exposition.
pub const CONTENT_TYPE: &str = "application/openmetrics-text; version=1.0.0; charset=utf-8";

/// Encodes a registry snapshot on every scrape.
#[derive(Debug)]
struct SnapshotCollector {
    registry: SharedRegistry,
}

impl Collector for SnapshotCollector {
    fn encode(&self, mut encoder: DescriptorEncoder) -> Result<(), std::fmt::Error> {
        let snapshot = self.registry.snapshot();

        for family in DeviceGauge::ALL {
            let mut series = snapshot.device_series(family).peekable();
            if series.peek().is_none() {
                continue;
            }

            let mut metric_encoder =
                encoder.encode_descriptor(family.name(), family.help(), None, MetricType::Gauge)?;
            for (device, value) in series {
                let labels = [(DEVICE_LABEL, escape_label_value(device))];
                ConstGauge::new(value).encode(metric_encoder.encode_family(&labels)?)?;
            }
        }

        for family in SatelliteGauge::ALL {
            let mut series = snapshot.satellite_series(family).peekable();
            if series.peek().is_none() {
                continue;
            }

            let mut metric_encoder =
                encoder.encode_descriptor(family.name(), family.help(), None, MetricType::Gauge)?;
            for (key, value) in series {
                let labels = [
                    (DEVICE_LABEL, escape_label_value(&key.device)),
                    (PRN_LABEL, escape_label_value(&key.prn)),
                ];
                ConstGauge::new(value).encode(metric_encoder.encode_family(&labels)?)?;
            }
        }

        let stats = self.registry.stats();
        let mut metric_encoder = encoder.encode_descriptor(
            "exporter_reports",
            "gpsd reports handled by the exporter, by class.",
            None,
            MetricType::Counter,
        )?;
        for kind in [
            ReportKind::Position,
            ReportKind::Sky,
            ReportKind::Unrecognized,
        ] {
            let labels = [("class", kind.as_str())];
            ConstCounter::new(stats.reports(kind)).encode(metric_encoder.encode_family(&labels)?)?;
        }

        let metric_encoder = encoder.encode_descriptor(
            "exporter_series",
            "Number of gauge series currently exposed.",
            None,
            MetricType::Gauge,
        )?;
        ConstGauge::new(snapshot.series_count() as i64).encode(metric_encoder)?;

        Ok(())
    }
}

/// The metrics sink: a `prometheus-client` registry fed from [`MetricsRegistry`](crate::registry::MetricsRegistry).
#[derive(Debug)]
pub struct Exposition {
    metrics: SharedRegistry,
    registry: Registry,
}

impl Exposition {
    /// Create the exposition for a registry, applying the configured prefix
    /// and constant labels to every family.
    pub fn new(metrics: SharedRegistry, config: &PrometheusConfig) -> Self {
        let mut registry =
            Registry::with_prefix_and_labels(config.prefix.clone(), const_labels(&config.default_labels));
        registry.register_collector(Box::new(SnapshotCollector {
            registry: metrics.clone(),
        }));

        Self { metrics, registry }
    }

    /// The registry this exposition reads from.
    pub fn metrics(&self) -> &SharedRegistry {
        &self.metrics
    }

    /// Render the current state in OpenMetrics text format.
    pub fn render(&self) -> Result<String, std::fmt::Error> {
        let mut body = String::new();
        prometheus_client::encoding::text::encode(&mut body, &self.registry)?;
        Ok(body)
    }
}

/// Create a shareable exposition handle.
pub type SharedExposition = Arc<Exposition>;

fn const_labels(
    labels: &HashMap<String, String>,
) -> impl Iterator<Item = (Cow<'static, str>, Cow<'static, str>)> {
    let mut sorted: Vec<_> = labels
        .iter()
        .map(|(k, v)| (Cow::Owned(k.clone()), Cow::Owned(escape_label_value(v))))
        .collect();
    sorted.sort();
    sorted.into_iter()
}
