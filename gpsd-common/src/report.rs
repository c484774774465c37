//! gpsd report data model and classifier.
//!
//! gpsd streams one JSON object per line, each tagged with a `class` member.
//! Only two classes carry receiver telemetry:
//!
//! - `TPV` (time-position-velocity): decoded into [`PositionFix`]
//! - `SKY` (satellites in view): decoded into [`SkyView`]
//!
//! Every other class is reported as [`Report::Unrecognized`]. Fields that
//! are missing or carry the wrong JSON type never fail decoding: they are
//! read as absent (TPV) or zero (SKY).

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::error::{Error, Result};

/// gpsd class name of position-fix reports.
pub const CLASS_TPV: &str = "TPV";

/// gpsd class name of sky-visibility reports.
pub const CLASS_SKY: &str = "SKY";

/// NMEA-style fix mode carried by TPV reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FixMode {
    /// No mode value seen yet.
    NoValueSeen,
    /// Mode seen, but no fix.
    NoFix,
    /// Two-dimensional fix.
    Fix2d,
    /// Three-dimensional fix.
    Fix3d,
}

impl FixMode {
    /// Map a gpsd mode code to a fix mode.
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(FixMode::NoValueSeen),
            1 => Some(FixMode::NoFix),
            2 => Some(FixMode::Fix2d),
            3 => Some(FixMode::Fix3d),
            _ => None,
        }
    }

    /// The numeric code gpsd uses for this mode.
    pub fn code(&self) -> u8 {
        match self {
            FixMode::NoValueSeen => 0,
            FixMode::NoFix => 1,
            FixMode::Fix2d => 2,
            FixMode::Fix3d => 3,
        }
    }
}

/// Receiver position, velocity and error estimates (class `TPV`).
///
/// `None` means "no observation" and must never be read as zero.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PositionFix {
    /// Device path the report originates from.
    #[serde(default, deserialize_with = "lenient_string")]
    pub device: String,

    #[serde(default, deserialize_with = "lenient_mode")]
    pub mode: Option<FixMode>,

    /// Latitude in degrees, +/- for North/South.
    #[serde(default, deserialize_with = "lenient_f64")]
    pub lat: Option<f64>,

    /// Longitude in degrees, +/- for East/West.
    #[serde(default, deserialize_with = "lenient_f64")]
    pub lon: Option<f64>,

    /// Altitude in meters (deprecated by gpsd 3.20 in favour of `altMSL`).
    #[serde(default, deserialize_with = "lenient_f64")]
    pub alt: Option<f64>,

    /// Altitude above mean sea level in meters.
    #[serde(rename = "altMSL", default, deserialize_with = "lenient_f64")]
    pub alt_msl: Option<f64>,

    /// Course over ground, degrees from true north.
    #[serde(default, deserialize_with = "lenient_f64")]
    pub track: Option<f64>,

    /// Speed over ground, meters per second.
    #[serde(default, deserialize_with = "lenient_f64")]
    pub speed: Option<f64>,

    /// Climb (positive) or sink (negative) rate, meters per second.
    #[serde(default, deserialize_with = "lenient_f64")]
    pub climb: Option<f64>,

    #[serde(default, deserialize_with = "lenient_f64")]
    pub ept: Option<f64>,

    #[serde(default, deserialize_with = "lenient_f64")]
    pub epx: Option<f64>,

    #[serde(default, deserialize_with = "lenient_f64")]
    pub epy: Option<f64>,

    #[serde(default, deserialize_with = "lenient_f64")]
    pub epv: Option<f64>,

    #[serde(default, deserialize_with = "lenient_f64")]
    pub epd: Option<f64>,

    #[serde(default, deserialize_with = "lenient_f64")]
    pub eps: Option<f64>,

    #[serde(default, deserialize_with = "lenient_f64")]
    pub epc: Option<f64>,
}

impl PositionFix {
    /// Altitude, falling back to `altMSL` when the legacy `alt` is absent.
    pub fn altitude(&self) -> Option<f64> {
        self.alt.or(self.alt_msl)
    }
}

/// Satellites in view and dilution of precision (class `SKY`).
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SkyView {
    /// Device path the report originates from.
    #[serde(default, deserialize_with = "lenient_string")]
    pub device: String,

    #[serde(default, deserialize_with = "lenient_f64_or_zero")]
    pub xdop: f64,

    #[serde(default, deserialize_with = "lenient_f64_or_zero")]
    pub ydop: f64,

    #[serde(default, deserialize_with = "lenient_f64_or_zero")]
    pub vdop: f64,

    #[serde(default, deserialize_with = "lenient_f64_or_zero")]
    pub tdop: f64,

    #[serde(default, deserialize_with = "lenient_f64_or_zero")]
    pub hdop: f64,

    #[serde(default, deserialize_with = "lenient_f64_or_zero")]
    pub pdop: f64,

    #[serde(default, deserialize_with = "lenient_f64_or_zero")]
    pub gdop: f64,

    /// The complete set of satellites currently visible, in report order.
    #[serde(default, deserialize_with = "lenient_satellites")]
    pub satellites: Vec<Satellite>,
}

/// One entry of a SKY report's satellite list.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Satellite {
    /// Pseudo-random-noise satellite number.
    #[serde(rename = "PRN", default, deserialize_with = "lenient_f64_or_zero")]
    pub prn: f64,

    /// Azimuth, degrees from true north.
    #[serde(default, deserialize_with = "lenient_f64_or_zero")]
    pub az: f64,

    /// Elevation in degrees.
    #[serde(default, deserialize_with = "lenient_f64_or_zero")]
    pub el: f64,

    /// Signal to noise ratio in dBHz.
    #[serde(default, deserialize_with = "lenient_f64_or_zero")]
    pub ss: f64,
}

impl Satellite {
    /// The PRN as a label value: a decimal integer without fractional part.
    pub fn prn_label(&self) -> String {
        format!("{:.0}", self.prn)
    }
}

/// The kind of an inbound report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReportKind {
    Position,
    Sky,
    Unrecognized,
}

impl ReportKind {
    /// Label value used for this kind in exporter statistics.
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportKind::Position => "tpv",
            ReportKind::Sky => "sky",
            ReportKind::Unrecognized => "unrecognized",
        }
    }
}

impl std::fmt::Display for ReportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A classified gpsd report.
#[derive(Debug, Clone, PartialEq)]
pub enum Report {
    Position(PositionFix),
    Sky(SkyView),
    /// Any class other than TPV and SKY (VERSION, DEVICES, WATCH, ...).
    Unrecognized { class: String },
}

impl Report {
    /// The kind of this report.
    pub fn kind(&self) -> ReportKind {
        match self {
            Report::Position(_) => ReportKind::Position,
            Report::Sky(_) => ReportKind::Sky,
            Report::Unrecognized { .. } => ReportKind::Unrecognized,
        }
    }

    /// The device the report refers to, if it carries telemetry.
    pub fn device(&self) -> Option<&str> {
        match self {
            Report::Position(fix) => Some(&fix.device),
            Report::Sky(sky) => Some(&sky.device),
            Report::Unrecognized { .. } => None,
        }
    }
}

/// Classify one line of gpsd output.
///
/// Returns [`Error::MalformedReport`] only when the line is not a JSON
/// object with a string `class` member.
pub fn classify(message: &str) -> Result<Report> {
    let value: Value = serde_json::from_str(message.trim())
        .map_err(|e| Error::MalformedReport(e.to_string()))?;

    let class = value
        .get("class")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::MalformedReport("missing class member".to_string()))?
        .to_string();

    let report = match class.as_str() {
        CLASS_TPV => Report::Position(
            serde_json::from_value(value).map_err(|e| Error::MalformedReport(e.to_string()))?,
        ),
        CLASS_SKY => Report::Sky(
            serde_json::from_value(value).map_err(|e| Error::MalformedReport(e.to_string()))?,
        ),
        _ => Report::Unrecognized { class },
    };

    Ok(report)
}

fn lenient_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value
        .as_ref()
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_default())
}

fn lenient_f64<'de, D>(deserializer: D) -> std::result::Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(Value::as_f64))
}

fn lenient_f64_or_zero<'de, D>(deserializer: D) -> std::result::Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_f64(deserializer)?.unwrap_or(0.0))
}

fn lenient_mode<'de, D>(deserializer: D) -> std::result::Result<Option<FixMode>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value
        .as_ref()
        .and_then(Value::as_i64)
        .and_then(FixMode::from_code))
}

fn lenient_satellites<'de, D>(deserializer: D) -> std::result::Result<Vec<Satellite>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    let satellites = match value {
        Some(Value::Array(entries)) => entries
            .into_iter()
            .filter(Value::is_object)
            .filter_map(|entry| serde_json::from_value(entry).ok())
            .collect(),
        _ => Vec::new(),
    };
    Ok(satellites)
}
