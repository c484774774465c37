//! Catalog of exported gauge families and Prometheus naming rules.

/// Label name carrying the gpsd device path.
pub const DEVICE_LABEL: &str = "device";

/// Label name carrying the satellite PRN.
pub const PRN_LABEL: &str = "prn";

/// Gauge families labeled by device only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DeviceGauge {
    FixMode,
    Latitude,
    Longitude,
    Altitude,
    Track,
    Speed,
    Climb,
    ErrorTimestamp,
    ErrorLongitude,
    ErrorLatitude,
    ErrorAltitude,
    ErrorDirection,
    ErrorSpeed,
    ErrorClimb,
    DopLongitude,
    DopLatitude,
    DopAltitude,
    DopTime,
    DopHorizontal,
    DopPosition,
    DopGeometric,
    SatellitesTotal,
    SatellitesUsed,
}

impl DeviceGauge {
    /// Every device gauge, in exposition order.
    pub const ALL: [DeviceGauge; 23] = [
        DeviceGauge::FixMode,
        DeviceGauge::Latitude,
        DeviceGauge::Longitude,
        DeviceGauge::Altitude,
        DeviceGauge::Track,
        DeviceGauge::Speed,
        DeviceGauge::Climb,
        DeviceGauge::ErrorTimestamp,
        DeviceGauge::ErrorLongitude,
        DeviceGauge::ErrorLatitude,
        DeviceGauge::ErrorAltitude,
        DeviceGauge::ErrorDirection,
        DeviceGauge::ErrorSpeed,
        DeviceGauge::ErrorClimb,
        DeviceGauge::DopLongitude,
        DeviceGauge::DopLatitude,
        DeviceGauge::DopAltitude,
        DeviceGauge::DopTime,
        DeviceGauge::DopHorizontal,
        DeviceGauge::DopPosition,
        DeviceGauge::DopGeometric,
        DeviceGauge::SatellitesTotal,
        DeviceGauge::SatellitesUsed,
    ];

    /// Metric name without the exporter prefix.
    pub fn name(&self) -> &'static str {
        match self {
            DeviceGauge::FixMode => "fix_mode",
            DeviceGauge::Latitude => "latitude",
            DeviceGauge::Longitude => "longitude",
            DeviceGauge::Altitude => "altitude",
            DeviceGauge::Track => "track",
            DeviceGauge::Speed => "speed",
            DeviceGauge::Climb => "climb",
            DeviceGauge::ErrorTimestamp => "estimated_error_timestamp",
            DeviceGauge::ErrorLongitude => "estimated_error_longitude",
            DeviceGauge::ErrorLatitude => "estimated_error_latitude",
            DeviceGauge::ErrorAltitude => "estimated_error_altitude",
            DeviceGauge::ErrorDirection => "estimated_error_direction",
            DeviceGauge::ErrorSpeed => "estimated_error_speed",
            DeviceGauge::ErrorClimb => "estimated_error_climb",
            DeviceGauge::DopLongitude => "dilution_of_precision_longitude",
            DeviceGauge::DopLatitude => "dilution_of_precision_latitude",
            DeviceGauge::DopAltitude => "dilution_of_precision_altitude",
            DeviceGauge::DopTime => "dilution_of_precision_time",
            DeviceGauge::DopHorizontal => "dilution_of_precision_horizontal",
            DeviceGauge::DopPosition => "dilution_of_precision_position",
            DeviceGauge::DopGeometric => "dilution_of_precision_geometric",
            DeviceGauge::SatellitesTotal => "space_vehicles_total",
            DeviceGauge::SatellitesUsed => "space_vehicles_used",
        }
    }

    /// HELP text for the exposition.
    pub fn help(&self) -> &'static str {
        match self {
            DeviceGauge::FixMode => "gpsd mode (0=NoValueSeen, 1=NoFix, 2=2D fix, 3=3D fix)",
            DeviceGauge::Latitude => "Latitude in degrees: +/- signifies North/South.",
            DeviceGauge::Longitude => "Longitude in degrees: +/- signifies East/West.",
            DeviceGauge::Altitude => "Altitude in meters.",
            DeviceGauge::Track => "Course over ground, degrees from true north.",
            DeviceGauge::Speed => "Speed over ground, meters per second.",
            DeviceGauge::Climb => "Climb (positive) or sink (negative) rate, meters per second.",
            DeviceGauge::ErrorTimestamp => {
                "Estimated time stamp error in seconds. Certainty unknown."
            }
            DeviceGauge::ErrorLongitude => "Longitude error estimate in meters. Certainty unknown.",
            DeviceGauge::ErrorLatitude => "Latitude error estimate in meters. Certainty unknown.",
            DeviceGauge::ErrorAltitude => "Estimated vertical error in meters. Certainty unknown.",
            DeviceGauge::ErrorDirection => {
                "Estimated track (direction) error in degrees. Certainty unknown."
            }
            DeviceGauge::ErrorSpeed => {
                "Estimated speed error in meters per second. Certainty unknown."
            }
            DeviceGauge::ErrorClimb => {
                "Estimated climb error in meters per second. Certainty unknown."
            }
            DeviceGauge::DopLongitude => {
                "Longitudinal dilution of precision, a dimensionless factor which should be multiplied by a base UERE to get an error estimate."
            }
            DeviceGauge::DopLatitude => {
                "Latitudinal dilution of precision, a dimensionless factor which should be multiplied by a base UERE to get an error estimate."
            }
            DeviceGauge::DopAltitude => {
                "Vertical (altitude) dilution of precision, a dimensionless factor which should be multiplied by a base UERE to get an error estimate."
            }
            DeviceGauge::DopTime => {
                "Time dilution of precision, a dimensionless factor which should be multiplied by a base UERE to get an error estimate."
            }
            DeviceGauge::DopHorizontal => {
                "Horizontal dilution of precision, a dimensionless factor which should be multiplied by a base UERE to get a circular error estimate."
            }
            DeviceGauge::DopPosition => {
                "Position (spherical/3D) dilution of precision, a dimensionless factor which should be multiplied by a base UERE to get an error estimate."
            }
            DeviceGauge::DopGeometric => {
                "Geometric (hyperspherical) dilution of precision, a combination of PDOP and TDOP. A dimensionless factor which should be multiplied by a base UERE to get an error estimate."
            }
            DeviceGauge::SatellitesTotal => "Total number of space vehicles observed.",
            DeviceGauge::SatellitesUsed => "Number of space vehicles used in fix.",
        }
    }
}

/// Gauge families labeled by device and satellite PRN.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SatelliteGauge {
    Azimuth,
    Elevation,
    SignalNoiseRatio,
}

impl SatelliteGauge {
    /// Every satellite gauge, in exposition order.
    pub const ALL: [SatelliteGauge; 3] = [
        SatelliteGauge::Azimuth,
        SatelliteGauge::Elevation,
        SatelliteGauge::SignalNoiseRatio,
    ];

    /// Metric name without the exporter prefix.
    pub fn name(&self) -> &'static str {
        match self {
            SatelliteGauge::Azimuth => "space_vehicle_azimuth",
            SatelliteGauge::Elevation => "space_vehicle_elevation",
            SatelliteGauge::SignalNoiseRatio => "space_vehicle_signal_noise_ratio",
        }
    }

    /// HELP text for the exposition.
    pub fn help(&self) -> &'static str {
        match self {
            SatelliteGauge::Azimuth => "Per-SV Azimuth, degrees from true north.",
            SatelliteGauge::Elevation => "Per-SV Elevation in degrees.",
            SatelliteGauge::SignalNoiseRatio => "Per-SV Signal to Noise ratio in dBHz.",
        }
    }
}

/// Any gauge family, regardless of its label dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GaugeFamily {
    Device(DeviceGauge),
    Satellite(SatelliteGauge),
}

impl GaugeFamily {
    /// Metric name without the exporter prefix.
    pub fn name(&self) -> &'static str {
        match self {
            GaugeFamily::Device(gauge) => gauge.name(),
            GaugeFamily::Satellite(gauge) => gauge.name(),
        }
    }
}

impl From<DeviceGauge> for GaugeFamily {
    fn from(gauge: DeviceGauge) -> Self {
        GaugeFamily::Device(gauge)
    }
}

impl From<SatelliteGauge> for GaugeFamily {
    fn from(gauge: SatelliteGauge) -> Self {
        GaugeFamily::Satellite(gauge)
    }
}

/// Check a metric name (or prefix) against `[a-zA-Z_:][a-zA-Z0-9_:]*`.
pub fn is_valid_metric_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' || first == ':' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':')
}

/// Check a label name against `[a-zA-Z_][a-zA-Z0-9_]*`.
///
/// Names starting with `__` are reserved for Prometheus internal use.
pub fn is_valid_label_name(name: &str) -> bool {
    if name.starts_with("__") {
        return false;
    }
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Escape backslash, double quote and newline in a label value.
pub fn escape_label_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            c => escaped.push(c),
        }
    }
    escaped
}
