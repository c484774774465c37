//! Prometheus exporter for gpsd.
//!
//! This crate connects to a gpsd daemon, watches its JSON report stream, and
//! exposes the latest position fix and satellite view of every receiver via
//! an HTTP `/metrics` endpoint.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐      ┌─────────────────┐     ┌─────────────────┐     ┌─────────────────┐
//! │      gpsd       │─────>│  TelemetryBridge│────>│ MetricsRegistry │────>│   HTTP Server   │
//! │ (TPV/SKY lines) │ mpsc │  (UpdateBatch)  │     │    (RwLock)     │     │   (/metrics)    │
//! └─────────────────┘      └─────────────────┘     └─────────────────┘     └─────────────────┘
//! ```
//!
//! # Usage
//!
//! ```bash
//! gpsd-exporter-prometheus --gpsd localhost:2947 --listen 0.0.0.0:2112
//! ```
//!
//! # Configuration
//!
//! See [`config::ExporterConfig`] for configuration options.

pub mod bridge;
pub mod config;
pub mod exposition;
pub mod http;
pub mod mapping;
pub mod registry;
pub mod source;

pub use bridge::TelemetryBridge;
pub use config::ExporterConfig;
pub use exposition::{Exposition, SharedExposition};
pub use http::HttpServer;
pub use registry::{MetricsRegistry, RegistrySnapshot, SharedRegistry, UpdateBatch};
pub use source::{GpsdClient, SessionStats, SourceError};
