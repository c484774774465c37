use thiserror::Error;

/// Common error type for the gpsd exporter components.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Malformed report: {0}")]
    MalformedReport(String),
}

/// Result type alias using the common Error.
pub type Result<T> = std::result::Result<T, Error>;
