//! Metrics registry holding every gauge series the exporter exposes.
//!
//! All state sits behind one [`RwLock`]. Writers stage their changes in an
//! [`UpdateBatch`] and apply them with [`MetricsRegistry::apply`], which
//! performs the whole batch under a single write guard. Readers copy a
//! [`RegistrySnapshot`] under the read guard, so a scrape observes either
//! the state before a batch or the state after it, never a partial mix.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use gpsd_common::ReportKind;
use parking_lot::RwLock;
use tracing::trace;

use crate::mapping::{DeviceGauge, GaugeFamily, SatelliteGauge};

/// A `(device, prn)` label pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SatelliteKey {
    pub device: String,
    pub prn: String,
}

impl SatelliteKey {
    pub fn new(device: impl Into<String>, prn: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            prn: prn.into(),
        }
    }
}

/// Gauge values, keyed by family and then by label tuple.
#[derive(Debug, Clone, Default, PartialEq)]
struct Gauges {
    device: BTreeMap<DeviceGauge, BTreeMap<String, f64>>,
    satellite: BTreeMap<SatelliteGauge, BTreeMap<SatelliteKey, f64>>,
}

impl Gauges {
    fn set_device(&mut self, family: DeviceGauge, device: String, value: f64) {
        self.device.entry(family).or_default().insert(device, value);
    }

    fn set_satellite(&mut self, family: SatelliteGauge, key: SatelliteKey, value: f64) {
        self.satellite.entry(family).or_default().insert(key, value);
    }

    fn clear_satellites(&mut self, family: SatelliteGauge, device: &str) -> usize {
        let Some(series) = self.satellite.get_mut(&family) else {
            return 0;
        };
        let before = series.len();
        series.retain(|key, _| key.device != device);
        before - series.len()
    }

    fn clear_family(&mut self, family: GaugeFamily) {
        match family {
            GaugeFamily::Device(gauge) => {
                self.device.remove(&gauge);
            }
            GaugeFamily::Satellite(gauge) => {
                self.satellite.remove(&gauge);
            }
        }
    }

    fn series_count(&self) -> usize {
        self.device.values().map(BTreeMap::len).sum::<usize>()
            + self.satellite.values().map(BTreeMap::len).sum::<usize>()
    }
}

/// One staged registry mutation.
#[derive(Debug, Clone, PartialEq)]
enum Update {
    SetDevice {
        family: DeviceGauge,
        device: String,
        value: f64,
    },
    SetSatellite {
        family: SatelliteGauge,
        key: SatelliteKey,
        value: f64,
    },
    ClearSatellites {
        family: SatelliteGauge,
        device: String,
    },
    ClearFamily(GaugeFamily),
}

/// An ordered set of mutations applied atomically by [`MetricsRegistry::apply`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateBatch {
    updates: Vec<Update>,
}

impl UpdateBatch {
    /// Create an empty batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage a device-labeled gauge value.
    pub fn set_device_gauge(&mut self, family: DeviceGauge, device: &str, value: f64) {
        self.updates.push(Update::SetDevice {
            family,
            device: device.to_string(),
            value,
        });
    }

    /// Stage a device and PRN labeled gauge value.
    pub fn set_satellite_gauge(
        &mut self,
        family: SatelliteGauge,
        device: &str,
        prn: &str,
        value: f64,
    ) {
        self.updates.push(Update::SetSatellite {
            family,
            key: SatelliteKey::new(device, prn),
            value,
        });
    }

    /// Stage removal of every `(device, *)` entry of a satellite family.
    pub fn clear_satellites(&mut self, family: SatelliteGauge, device: &str) {
        self.updates.push(Update::ClearSatellites {
            family,
            device: device.to_string(),
        });
    }

    /// Stage removal of every entry of a family.
    pub fn clear_family(&mut self, family: impl Into<GaugeFamily>) {
        self.updates.push(Update::ClearFamily(family.into()));
    }

    /// Number of staged mutations.
    pub fn len(&self) -> usize {
        self.updates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.updates.is_empty()
    }
}

/// Report counters kept alongside the gauges.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestStats {
    /// Total reports handed to the bridge.
    pub reports_received: u64,
    /// TPV reports applied.
    pub position_reports: u64,
    /// SKY reports applied.
    pub sky_reports: u64,
    /// Reports of any other class, ignored.
    pub unrecognized_reports: u64,
}

impl IngestStats {
    /// Counter value for one report kind.
    pub fn reports(&self, kind: ReportKind) -> u64 {
        match kind {
            ReportKind::Position => self.position_reports,
            ReportKind::Sky => self.sky_reports,
            ReportKind::Unrecognized => self.unrecognized_reports,
        }
    }
}

/// Immutable point-in-time copy of the registry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegistrySnapshot {
    gauges: Gauges,
}

impl RegistrySnapshot {
    /// Value of a device gauge.
    pub fn device_value(&self, family: DeviceGauge, device: &str) -> Option<f64> {
        self.gauges.device.get(&family)?.get(device).copied()
    }

    /// Value of a satellite gauge.
    pub fn satellite_value(&self, family: SatelliteGauge, device: &str, prn: &str) -> Option<f64> {
        self.gauges
            .satellite
            .get(&family)?
            .get(&SatelliteKey::new(device, prn))
            .copied()
    }

    /// PRNs present in a satellite family for one device.
    pub fn prns(&self, family: SatelliteGauge, device: &str) -> BTreeSet<String> {
        self.satellite_series(family)
            .filter(|(key, _)| key.device == device)
            .map(|(key, _)| key.prn.clone())
            .collect()
    }

    /// All `(device, value)` series of a device family, ordered by device.
    pub fn device_series(&self, family: DeviceGauge) -> impl Iterator<Item = (&str, f64)> + '_ {
        self.gauges
            .device
            .get(&family)
            .into_iter()
            .flat_map(|series| series.iter().map(|(device, value)| (device.as_str(), *value)))
    }

    /// All series of a satellite family, ordered by device then PRN.
    pub fn satellite_series(
        &self,
        family: SatelliteGauge,
    ) -> impl Iterator<Item = (&SatelliteKey, f64)> + '_ {
        self.gauges
            .satellite
            .get(&family)
            .into_iter()
            .flat_map(|series| series.iter().map(|(key, value)| (key, *value)))
    }

    /// Total number of stored series.
    pub fn series_count(&self) -> usize {
        self.gauges.series_count()
    }

    pub fn is_empty(&self) -> bool {
        self.series_count() == 0
    }
}

/// Thread-safe store of gauge series.
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    /// Gauge values.
    gauges: RwLock<Gauges>,
    /// Report counters.
    stats: RwLock<IngestStats>,
}

impl MetricsRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a device-labeled gauge, creating the series if needed.
    pub fn set_device_gauge(&self, family: DeviceGauge, device: &str, value: f64) {
        self.gauges
            .write()
            .set_device(family, device.to_string(), value);
    }

    /// Set a device and PRN labeled gauge, creating the series if needed.
    pub fn set_satellite_gauge(&self, family: SatelliteGauge, device: &str, prn: &str, value: f64) {
        self.gauges
            .write()
            .set_satellite(family, SatelliteKey::new(device, prn), value);
    }

    /// Remove every series of a family.
    pub fn clear_family(&self, family: impl Into<GaugeFamily>) {
        self.gauges.write().clear_family(family.into());
    }

    /// Apply a staged batch under a single write guard.
    pub fn apply(&self, batch: UpdateBatch) {
        let mut gauges = self.gauges.write();
        let staged = batch.updates.len();
        let mut removed = 0;

        for update in batch.updates {
            match update {
                Update::SetDevice {
                    family,
                    device,
                    value,
                } => gauges.set_device(family, device, value),
                Update::SetSatellite { family, key, value } => {
                    gauges.set_satellite(family, key, value)
                }
                Update::ClearSatellites { family, device } => {
                    removed += gauges.clear_satellites(family, &device);
                }
                Update::ClearFamily(family) => gauges.clear_family(family),
            }
        }

        trace!(
            staged,
            removed,
            series = gauges.series_count(),
            "Applied update batch"
        );
    }

    /// Copy the current state.
    pub fn snapshot(&self) -> RegistrySnapshot {
        RegistrySnapshot {
            gauges: self.gauges.read().clone(),
        }
    }

    /// Get the current number of stored series.
    pub fn series_count(&self) -> usize {
        self.gauges.read().series_count()
    }

    /// Count one report handed to the bridge.
    pub fn record_report(&self, kind: ReportKind) {
        let mut stats = self.stats.write();
        stats.reports_received += 1;
        match kind {
            ReportKind::Position => stats.position_reports += 1,
            ReportKind::Sky => stats.sky_reports += 1,
            ReportKind::Unrecognized => stats.unrecognized_reports += 1,
        }
    }

    /// Get report statistics.
    pub fn stats(&self) -> IngestStats {
        self.stats.read().clone()
    }
}

/// Create a shareable registry handle.
pub type SharedRegistry = Arc<MetricsRegistry>;

#[cfg(test)]
mod tests {
    use super::*;

    fn prns(list: &[&str]) -> BTreeSet<String> {
        list.iter().map(|p| p.to_string()).collect()
    }

    #[test]
    fn test_set_device_gauge_creates_and_overwrites() {
        let registry = MetricsRegistry::new();

        registry.set_device_gauge(DeviceGauge::Latitude, "gps0", 12.5);
        registry.set_device_gauge(DeviceGauge::Latitude, "gps0", 13.0);
        registry.set_device_gauge(DeviceGauge::Latitude, "gps1", -1.0);

        let snapshot = registry.snapshot();
        assert_eq!(snapshot.device_value(DeviceGauge::Latitude, "gps0"), Some(13.0));
        assert_eq!(snapshot.device_value(DeviceGauge::Latitude, "gps1"), Some(-1.0));
        assert_eq!(snapshot.device_value(DeviceGauge::Longitude, "gps0"), None);
        assert_eq!(registry.series_count(), 2);
    }

    #[test]
    fn test_set_satellite_gauge() {
        let registry = MetricsRegistry::new();

        registry.set_satellite_gauge(SatelliteGauge::Azimuth, "gps0", "7", 133.0);
        registry.set_satellite_gauge(SatelliteGauge::Azimuth, "gps0", "12", 290.0);

        let snapshot = registry.snapshot();
        assert_eq!(
            snapshot.satellite_value(SatelliteGauge::Azimuth, "gps0", "7"),
            Some(133.0)
        );
        assert_eq!(
            snapshot.prns(SatelliteGauge::Azimuth, "gps0"),
            prns(&["12", "7"])
        );
        assert!(snapshot.prns(SatelliteGauge::Elevation, "gps0").is_empty());
    }

    #[test]
    fn test_clear_family_removes_all_devices() {
        let registry = MetricsRegistry::new();
        registry.set_satellite_gauge(SatelliteGauge::Elevation, "gps0", "7", 42.0);
        registry.set_satellite_gauge(SatelliteGauge::Elevation, "gps1", "9", 11.0);
        registry.set_satellite_gauge(SatelliteGauge::Azimuth, "gps0", "7", 133.0);
        registry.set_device_gauge(DeviceGauge::Speed, "gps0", 1.5);

        registry.clear_family(SatelliteGauge::Elevation);
        registry.clear_family(DeviceGauge::Speed);

        let snapshot = registry.snapshot();
        assert!(snapshot.prns(SatelliteGauge::Elevation, "gps0").is_empty());
        assert!(snapshot.prns(SatelliteGauge::Elevation, "gps1").is_empty());
        assert_eq!(snapshot.device_value(DeviceGauge::Speed, "gps0"), None);
        assert_eq!(snapshot.prns(SatelliteGauge::Azimuth, "gps0"), prns(&["7"]));
        assert_eq!(snapshot.series_count(), 1);
    }

    #[test]
    fn test_batch_clear_satellites_is_per_device() {
        let registry = MetricsRegistry::new();
        registry.set_satellite_gauge(SatelliteGauge::Azimuth, "gps0", "7", 1.0);
        registry.set_satellite_gauge(SatelliteGauge::Azimuth, "gps1", "7", 2.0);

        let mut batch = UpdateBatch::new();
        batch.clear_satellites(SatelliteGauge::Azimuth, "gps0");
        batch.set_satellite_gauge(SatelliteGauge::Azimuth, "gps0", "30", 3.0);
        assert_eq!(batch.len(), 2);
        registry.apply(batch);

        let snapshot = registry.snapshot();
        assert_eq!(snapshot.prns(SatelliteGauge::Azimuth, "gps0"), prns(&["30"]));
        assert_eq!(snapshot.prns(SatelliteGauge::Azimuth, "gps1"), prns(&["7"]));
    }

    #[test]
    fn test_batch_applies_in_order() {
        let registry = MetricsRegistry::new();

        let mut batch = UpdateBatch::new();
        batch.set_device_gauge(DeviceGauge::Climb, "gps0", 1.0);
        batch.clear_family(DeviceGauge::Climb);
        batch.set_device_gauge(DeviceGauge::Climb, "gps0", 2.0);
        registry.apply(batch);

        assert_eq!(
            registry
                .snapshot()
                .device_value(DeviceGauge::Climb, "gps0"),
            Some(2.0)
        );
    }

    #[test]
    fn test_empty_batch_is_noop() {
        let registry = MetricsRegistry::new();
        registry.set_device_gauge(DeviceGauge::FixMode, "gps0", 3.0);
        let before = registry.snapshot();

        let batch = UpdateBatch::new();
        assert!(batch.is_empty());
        registry.apply(batch);

        assert_eq!(registry.snapshot(), before);
    }

    #[test]
    fn test_snapshot_is_detached() {
        let registry = MetricsRegistry::new();
        registry.set_device_gauge(DeviceGauge::Track, "gps0", 90.0);

        let snapshot = registry.snapshot();
        registry.set_device_gauge(DeviceGauge::Track, "gps0", 180.0);

        assert_eq!(snapshot.device_value(DeviceGauge::Track, "gps0"), Some(90.0));
    }

    #[test]
    fn test_series_iteration_order() {
        let registry = MetricsRegistry::new();
        registry.set_device_gauge(DeviceGauge::Altitude, "b", 2.0);
        registry.set_device_gauge(DeviceGauge::Altitude, "a", 1.0);

        let series: Vec<_> = registry
            .snapshot()
            .device_series(DeviceGauge::Altitude)
            .map(|(device, value)| (device.to_string(), value))
            .collect();

        assert_eq!(series, vec![("a".to_string(), 1.0), ("b".to_string(), 2.0)]);
    }

    #[test]
    fn test_record_report() {
        let registry = MetricsRegistry::new();

        registry.record_report(ReportKind::Position);
        registry.record_report(ReportKind::Position);
        registry.record_report(ReportKind::Sky);
        registry.record_report(ReportKind::Unrecognized);

        let stats = registry.stats();
        assert_eq!(stats.reports_received, 4);
        assert_eq!(stats.reports(ReportKind::Position), 2);
        assert_eq!(stats.reports(ReportKind::Sky), 1);
        assert_eq!(stats.reports(ReportKind::Unrecognized), 1);
    }
}
