use crate::config::TierThresholds;
use crate::tier::DeviceTier;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// One frame-rate measurement, produced once per sampling window
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSample {
    pub fps: f64,
    pub timestamp: DateTime<Utc>,
}

impl PerformanceSample {
    pub fn new(fps: f64) -> Self {
        Self {
            fps,
            timestamp: Utc::now(),
        }
    }
}

/// Heap usage snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemorySample {
    pub used_bytes: u64,
    pub total_bytes: u64,
    pub limit_bytes: u64,
    pub timestamp: DateTime<Utc>,
}

impl MemorySample {
    pub fn new(used_bytes: u64, total_bytes: u64, limit_bytes: u64) -> Self {
        Self {
            used_bytes,
            total_bytes,
            limit_bytes,
            timestamp: Utc::now(),
        }
    }

    /// Fraction of the limit in use, if the limit is known
    pub fn utilization(&self) -> Option<f64> {
        if self.limit_bytes == 0 {
            None
        } else {
            Some(self.used_bytes as f64 / self.limit_bytes as f64)
        }
    }
}

/// Read-only view handed to rendering code
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub fps: Option<f64>,
    pub device_tier: DeviceTier,
    pub is_low_performance: bool,
    pub memory: Option<MemorySample>,
    pub last_sample: Option<DateTime<Utc>>,
}

impl Default for PerformanceMetrics {
    fn default() -> Self {
        Self {
            fps: None,
            device_tier: DeviceTier::DEFAULT,
            is_low_performance: false,
            memory: None,
            last_sample: None,
        }
    }
}

/// Tier before and after a frame-rate sample was recorded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierUpdate {
    pub previous: DeviceTier,
    pub current: DeviceTier,
}

impl TierUpdate {
    pub fn changed(&self) -> bool {
        self.previous != self.current
    }
}

#[derive(Debug, Default)]
struct MetricsRecord {
    latest: Option<PerformanceSample>,
    tier: DeviceTier,
    memory: Option<MemorySample>,
}

/// Latest-value metrics record shared between the samplers and the quality
/// provider. Writes are last-write-wins.
#[derive(Debug)]
pub struct MetricsStore {
    thresholds: TierThresholds,
    record: RwLock<MetricsRecord>,
}

impl MetricsStore {
    pub fn new(thresholds: TierThresholds) -> Self {
        Self {
            thresholds,
            record: RwLock::new(MetricsRecord::default()),
        }
    }

    pub fn thresholds(&self) -> &TierThresholds {
        &self.thresholds
    }

    /// Store a frame-rate sample and reclassify the tier
    pub fn record_fps(&self, sample: PerformanceSample) -> TierUpdate {
        let current = self.thresholds.classify(sample.fps);
        let mut record = self.record.write();
        let previous = record.tier;
        record.latest = Some(sample);
        record.tier = current;
        TierUpdate { previous, current }
    }

    pub fn record_memory(&self, sample: MemorySample) {
        self.record.write().memory = Some(sample);
    }

    pub fn tier(&self) -> DeviceTier {
        self.record.read().tier
    }

    pub fn latest_sample(&self) -> Option<PerformanceSample> {
        self.record.read().latest
    }

    /// Low performance follows the tier, so "no sample yet" is never low
    pub fn is_low_performance(&self) -> bool {
        self.tier() == DeviceTier::Low
    }

    pub fn snapshot(&self) -> PerformanceMetrics {
        let record = self.record.read();
        PerformanceMetrics {
            fps: record.latest.map(|s| s.fps),
            device_tier: record.tier,
            is_low_performance: record.tier == DeviceTier::Low,
            memory: record.memory,
            last_sample: record.latest.map(|s| s.timestamp),
        }
    }
}

impl Default for MetricsStore {
    fn default() -> Self {
        Self::new(TierThresholds::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_store_defaults_to_medium() {
        let store = MetricsStore::default();
        let metrics = store.snapshot();

        assert_eq!(metrics, PerformanceMetrics::default());
        assert_eq!(metrics.device_tier, DeviceTier::Medium);
        assert!(!metrics.is_low_performance);
        assert!(metrics.fps.is_none());
    }

    #[test]
    fn test_record_fps_reports_transitions() {
        let store = MetricsStore::default();

        let update = store.record_fps(PerformanceSample::new(58.0));
        assert_eq!(update.previous, DeviceTier::Medium);
        assert_eq!(update.current, DeviceTier::High);
        assert!(update.changed());

        let update = store.record_fps(PerformanceSample::new(55.0));
        assert!(!update.changed());

        let update = store.record_fps(PerformanceSample::new(12.0));
        assert_eq!(update.current, DeviceTier::Low);

        let metrics = store.snapshot();
        assert_eq!(metrics.fps, Some(12.0));
        assert!(metrics.is_low_performance);
        assert!(metrics.last_sample.is_some());
    }

    #[test]
    fn test_memory_is_independent_of_fps() {
        let store = MetricsStore::default();
        store.record_memory(MemorySample::new(10, 20, 40));

        let metrics = store.snapshot();
        assert!(metrics.fps.is_none());
        assert_eq!(metrics.memory.map(|m| m.used_bytes), Some(10));
        assert_eq!(metrics.memory.and_then(|m| m.utilization()), Some(0.25));
    }

    #[test]
    fn test_unknown_limit_has_no_utilization() {
        assert_eq!(MemorySample::new(10, 20, 0).utilization(), None);
    }

    #[test]
    fn test_metrics_serialize_lowercase_tier() {
        let store = MetricsStore::default();
        store.record_fps(PerformanceSample::new(40.0));

        let json = serde_json::to_value(store.snapshot()).unwrap();
        assert_eq!(json["device_tier"], "medium");
        assert_eq!(json["fps"], 40.0);
        assert!(json["memory"].is_null());
    }
}
