//! gpsd client: connects, enables JSON watch mode, and forwards classified reports.

use gpsd_common::{Report, classify};
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::OwnedReadHalf;
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

/// Errors raised while establishing a gpsd session.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Failed to connect to gpsd at {address}: {source}")]
    Connect {
        address: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to send WATCH command: {0}")]
    Watch(#[source] std::io::Error),
}

/// Build the command enabling JSON report streaming.
pub fn watch_command() -> String {
    let watch = serde_json::json!({ "enable": true, "json": true });
    format!("?WATCH={}\n", watch)
}

/// Counters for one gpsd session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Non-empty lines read from the connection.
    pub lines: u64,
    /// Lines classified and forwarded.
    pub reports: u64,
    /// Lines that were not a gpsd JSON object.
    pub malformed: u64,
}

/// A connected gpsd session in watch mode.
pub struct GpsdClient {
    address: String,
    reader: BufReader<OwnedReadHalf>,
    // Held so the socket is not half-closed while reading.
    _writer: tokio::net::tcp::OwnedWriteHalf,
}

impl GpsdClient {
    /// Connect to gpsd and enable watch mode.
    pub async fn connect(address: &str) -> Result<Self, SourceError> {
        let stream = TcpStream::connect(address)
            .await
            .map_err(|source| SourceError::Connect {
                address: address.to_string(),
                source,
            })?;

        let (read_half, mut write_half) = stream.into_split();
        write_half
            .write_all(watch_command().as_bytes())
            .await
            .map_err(SourceError::Watch)?;

        info!(address = %address, "Connected to gpsd");

        Ok(Self {
            address: address.to_string(),
            reader: BufReader::new(read_half),
            _writer: write_half,
        })
    }

    /// The address this session is connected to.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Forward reports until the connection closes or the receiver goes away.
    pub async fn run(self, tx: mpsc::Sender<Report>) -> SessionStats {
        let stats = forward_reports(self.reader, &tx).await;
        info!(
            address = %self.address,
            lines = stats.lines,
            reports = stats.reports,
            malformed = stats.malformed,
            "gpsd session ended"
        );
        stats
    }
}

/// Read newline-delimited gpsd output and forward every classified report.
///
/// Malformed lines, including ones that are not valid UTF-8, are logged and
/// skipped. A read error ends the session the same way a closed connection does.
pub async fn forward_reports<R>(reader: R, tx: &mpsc::Sender<Report>) -> SessionStats
where
    R: AsyncBufRead + Unpin,
{
    let mut stats = SessionStats::default();
    let mut segments = reader.split(b'\n');

    loop {
        let raw = match segments.next_segment().await {
            Ok(Some(raw)) => raw,
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, "Error reading from gpsd");
                break;
            }
        };

        if raw.iter().all(u8::is_ascii_whitespace) {
            continue;
        }
        stats.lines += 1;

        let line = match String::from_utf8(raw) {
            Ok(line) => line,
            Err(e) => {
                stats.malformed += 1;
                debug!(error = %e, "Skipping non-UTF-8 gpsd line");
                continue;
            }
        };

        let report = match classify(&line) {
            Ok(report) => report,
            Err(e) => {
                stats.malformed += 1;
                debug!(error = %e, "Skipping malformed gpsd line");
                continue;
            }
        };

        trace!(kind = %report.kind(), device = report.device(), "Received report");

        if tx.send(report).await.is_err() {
            debug!("Report channel closed, stopping reader");
            break;
        }
        stats.reports += 1;
    }

    stats
}
