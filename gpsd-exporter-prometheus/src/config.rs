//! Configuration for the gpsd Prometheus exporter.

use gpsd_common::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

use crate::mapping::{DEVICE_LABEL, PRN_LABEL, is_valid_label_name, is_valid_metric_name};

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] json5::Error),
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Complete exporter configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExporterConfig {
    /// gpsd connection settings.
    #[serde(default)]
    pub gpsd: GpsdConfig,

    /// Prometheus exporter settings.
    #[serde(default)]
    pub prometheus: PrometheusConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// gpsd report source configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GpsdConfig {
    /// Remote gpsd `host:port` (default: "localhost:2947").
    #[serde(default = "default_address")]
    pub address: String,

    /// Reports buffered between the connection reader and the bridge.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

fn default_address() -> String {
    "localhost:2947".to_string()
}

fn default_channel_capacity() -> usize {
    1024
}

impl Default for GpsdConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

/// Prometheus HTTP endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrometheusConfig {
    /// Address to listen on (default: "0.0.0.0:2112").
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Path for metrics endpoint (default: "/metrics").
    #[serde(default = "default_path")]
    pub path: String,

    /// Constant labels added to every series.
    #[serde(default)]
    pub default_labels: HashMap<String, String>,

    /// Metric name prefix (default: "gpsd").
    #[serde(default = "default_prefix")]
    pub prefix: String,
}

fn default_listen() -> String {
    "0.0.0.0:2112".to_string()
}

fn default_path() -> String {
    "/metrics".to_string()
}

fn default_prefix() -> String {
    "gpsd".to_string()
}

impl Default for PrometheusConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            path: default_path(),
            default_labels: HashMap::new(),
            prefix: default_prefix(),
        }
    }
}

impl ExporterConfig {
    /// Load configuration from a JSON5 file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse configuration from a JSON5 string.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: ExporterConfig = json5::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        // gpsd address must be host:port
        let port = self
            .gpsd
            .address
            .rsplit_once(':')
            .filter(|(host, _)| !host.is_empty())
            .and_then(|(_, port)| port.parse::<u16>().ok());
        if port.is_none() {
            return Err(ConfigError::Validation(format!(
                "Invalid gpsd address (expected host:port): {}",
                self.gpsd.address
            )));
        }

        if self.gpsd.channel_capacity == 0 {
            return Err(ConfigError::Validation(
                "channel_capacity must be > 0".to_string(),
            ));
        }

        // Validate listen address format
        if self
            .prometheus
            .listen
            .parse::<std::net::SocketAddr>()
            .is_err()
        {
            return Err(ConfigError::Validation(format!(
                "Invalid listen address: {}",
                self.prometheus.listen
            )));
        }

        // Validate path starts with /
        if !self.prometheus.path.starts_with('/') {
            return Err(ConfigError::Validation(
                "Metrics path must start with /".to_string(),
            ));
        }

        if !is_valid_metric_name(&self.prometheus.prefix) {
            return Err(ConfigError::Validation(format!(
                "Invalid metric prefix: {:?}",
                self.prometheus.prefix
            )));
        }

        for name in self.prometheus.default_labels.keys() {
            if !is_valid_label_name(name) {
                return Err(ConfigError::Validation(format!(
                    "Invalid default label name: {:?}",
                    name
                )));
            }
            if name == DEVICE_LABEL || name == PRN_LABEL {
                return Err(ConfigError::Validation(format!(
                    "Default label {:?} collides with a built-in label",
                    name
                )));
            }
        }

        Ok(())
    }
}
