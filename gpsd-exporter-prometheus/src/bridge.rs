//! Telemetry bridge: turns classified gpsd reports into registry updates.

use gpsd_common::{PositionFix, Report, SkyView};
use tokio::sync::mpsc;
use tracing::{debug, info, trace};

use crate::mapping::{DeviceGauge, SatelliteGauge};
use crate::registry::{SharedRegistry, UpdateBatch};

/// Applies gpsd reports to a [`MetricsRegistry`](crate::registry::MetricsRegistry).
///
/// Each report becomes one [`UpdateBatch`], so a concurrent scrape sees a
/// report either fully applied or not at all.
pub struct TelemetryBridge {
    registry: SharedRegistry,
}

impl TelemetryBridge {
    /// Create a bridge writing into the given registry.
    pub fn new(registry: SharedRegistry) -> Self {
        Self { registry }
    }

    /// The registry updated by this bridge.
    pub fn registry(&self) -> &SharedRegistry {
        &self.registry
    }

    /// Route one report to its update routine.
    ///
    /// Unrecognized report classes are counted and otherwise ignored.
    pub fn handle(&self, report: &Report) {
        self.registry.record_report(report.kind());

        match report {
            Report::Position(fix) => self.update_position(fix),
            Report::Sky(sky) => self.update_sky(sky),
            Report::Unrecognized { class } => {
                trace!(class = %class, "Ignoring report");
            }
        }
    }

    /// Apply a TPV report.
    ///
    /// Absent fields are skipped so the gauge keeps its last known value.
    pub fn update_position(&self, fix: &PositionFix) {
        let fields = [
            (
                DeviceGauge::FixMode,
                fix.mode.map(|mode| f64::from(mode.code())),
            ),
            (DeviceGauge::Latitude, fix.lat),
            (DeviceGauge::Longitude, fix.lon),
            (DeviceGauge::Altitude, fix.altitude()),
            (DeviceGauge::Track, fix.track),
            (DeviceGauge::Speed, fix.speed),
            (DeviceGauge::Climb, fix.climb),
            (DeviceGauge::ErrorTimestamp, fix.ept),
            (DeviceGauge::ErrorLongitude, fix.epx),
            (DeviceGauge::ErrorLatitude, fix.epy),
            (DeviceGauge::ErrorAltitude, fix.epv),
            (DeviceGauge::ErrorDirection, fix.epd),
            (DeviceGauge::ErrorSpeed, fix.eps),
            (DeviceGauge::ErrorClimb, fix.epc),
        ];

        let mut batch = UpdateBatch::new();
        for (family, value) in fields {
            if let Some(value) = value {
                batch.set_device_gauge(family, &fix.device, value);
            }
        }

        trace!(
            device = %fix.device,
            fields = batch.len(),
            "Applying TPV report"
        );
        self.registry.apply(batch);
    }

    /// Apply a SKY report.
    ///
    /// The per-satellite series of the device are replaced wholesale by the
    /// satellites listed in the report.
    pub fn update_sky(&self, sky: &SkyView) {
        let device = sky.device.as_str();
        let mut batch = UpdateBatch::new();

        batch.set_device_gauge(DeviceGauge::DopLongitude, device, sky.xdop);
        batch.set_device_gauge(DeviceGauge::DopLatitude, device, sky.ydop);
        batch.set_device_gauge(DeviceGauge::DopAltitude, device, sky.vdop);
        batch.set_device_gauge(DeviceGauge::DopTime, device, sky.tdop);
        batch.set_device_gauge(DeviceGauge::DopHorizontal, device, sky.hdop);
        batch.set_device_gauge(DeviceGauge::DopPosition, device, sky.pdop);
        batch.set_device_gauge(DeviceGauge::DopGeometric, device, sky.gdop);

        batch.set_device_gauge(
            DeviceGauge::SatellitesTotal,
            device,
            sky.satellites.len() as f64,
        );

        for family in SatelliteGauge::ALL {
            batch.clear_satellites(family, device);
        }

        // gpsd's per-satellite "used" flag is not consulted: every listed
        // satellite counts as used.
        let mut used = 0usize;
        for satellite in &sky.satellites {
            let prn = satellite.prn_label();
            batch.set_satellite_gauge(SatelliteGauge::Azimuth, device, &prn, satellite.az);
            batch.set_satellite_gauge(SatelliteGauge::Elevation, device, &prn, satellite.el);
            batch.set_satellite_gauge(
                SatelliteGauge::SignalNoiseRatio,
                device,
                &prn,
                satellite.ss,
            );
            used += 1;
        }

        batch.set_device_gauge(DeviceGauge::SatellitesUsed, device, used as f64);

        trace!(
            device = %device,
            satellites = sky.satellites.len(),
            "Applying SKY report"
        );
        self.registry.apply(batch);
    }

    /// Consume reports in arrival order until the sending side closes.
    ///
    /// Returns the number of reports handled.
    pub async fn run(self, mut reports: mpsc::Receiver<Report>) -> u64 {
        info!("Telemetry bridge started");
        let mut handled = 0u64;

        while let Some(report) = reports.recv().await {
            self.handle(&report);
            handled += 1;
        }

        debug!(handled, "Report channel closed");
        info!(
            handled,
            series = self.registry.series_count(),
            "Telemetry bridge stopped"
        );
        handled
    }
}
