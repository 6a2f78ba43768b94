//! Tier-driven scaling for rendering workloads.
//!
//! Every query reads the live tier from the metrics record, so consumers that
//! re-query after a new sample pick up the new tier without subscribing.

use crate::config::QualityScaling;
use crate::error::{PerfwatchError, Result};
use crate::metrics::MetricsStore;
use crate::tier::DeviceTier;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Platform "prefers reduced motion" accessibility preference
pub trait ReducedMotionSource: Send + Sync {
    fn prefers_reduced_motion(&self) -> Result<bool>;
}

/// Source for hosts that expose no accessibility preference
#[derive(Debug, Default, Clone, Copy)]
pub struct NoReducedMotion;

impl ReducedMotionSource for NoReducedMotion {
    fn prefers_reduced_motion(&self) -> Result<bool> {
        Err(PerfwatchError::unavailable("reduced motion preference"))
    }
}

/// Shared flag the host flips when the user preference changes
#[derive(Debug, Default, Clone)]
pub struct ReducedMotionFlag {
    flag: Arc<AtomicBool>,
}

impl ReducedMotionFlag {
    pub fn new(initial: bool) -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(initial)),
        }
    }

    pub fn set(&self, reduce: bool) {
        self.flag.store(reduce, Ordering::Relaxed);
    }

    pub fn get(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

impl ReducedMotionSource for ReducedMotionFlag {
    fn prefers_reduced_motion(&self) -> Result<bool> {
        Ok(self.get())
    }
}

/// Reads the preference from an environment variable on every query.
/// "1", "true", "yes" and "reduce" (any case) mean reduced motion.
#[derive(Debug, Clone)]
pub struct EnvReducedMotion {
    var: String,
}

impl EnvReducedMotion {
    pub const DEFAULT_VAR: &'static str = "PERFWATCH_REDUCED_MOTION";

    pub fn new<S: Into<String>>(var: S) -> Self {
        Self { var: var.into() }
    }
}

impl Default for EnvReducedMotion {
    fn default() -> Self {
        Self::new(Self::DEFAULT_VAR)
    }
}

impl ReducedMotionSource for EnvReducedMotion {
    fn prefers_reduced_motion(&self) -> Result<bool> {
        let value = std::env::var(&self.var)
            .map_err(|_| PerfwatchError::unavailable(format!("{} not set", self.var)))?;
        Ok(matches!(
            value.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "yes" | "reduce"
        ))
    }
}

/// Scaling decisions for one tier
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityDirective {
    pub tier: DeviceTier,
    pub particle_multiplier: f64,
    pub duration_multiplier: f64,
    pub reduce_motion: bool,
}

impl QualityScaling {
    pub fn particle_multiplier(&self, tier: DeviceTier) -> f64 {
        match tier {
            DeviceTier::High => 1.0,
            DeviceTier::Medium => self.medium_particle_multiplier,
            DeviceTier::Low => self.low_particle_multiplier,
        }
    }

    pub fn duration_multiplier(&self, tier: DeviceTier) -> f64 {
        match tier {
            DeviceTier::High => 1.0,
            DeviceTier::Medium => self.medium_duration_multiplier,
            DeviceTier::Low => self.low_duration_multiplier,
        }
    }

    /// Particle budget for `tier`, rounded down
    pub fn particle_count(&self, tier: DeviceTier, base: u32) -> u32 {
        match tier {
            DeviceTier::High => base,
            _ => (base as f64 * self.particle_multiplier(tier)).floor() as u32,
        }
    }

    pub fn animation_duration(&self, tier: DeviceTier, base: f64) -> f64 {
        base * self.duration_multiplier(tier)
    }
}

/// Quality scaling bound to a live metrics record
#[derive(Clone)]
pub struct QualityProvider {
    store: Arc<MetricsStore>,
    scaling: QualityScaling,
    reduced_motion: Arc<dyn ReducedMotionSource>,
}

impl QualityProvider {
    pub fn new(
        store: Arc<MetricsStore>,
        scaling: QualityScaling,
        reduced_motion: Arc<dyn ReducedMotionSource>,
    ) -> Self {
        Self {
            store,
            scaling,
            reduced_motion,
        }
    }

    pub fn tier(&self) -> DeviceTier {
        self.store.tier()
    }

    pub fn particle_count(&self, base: u32) -> u32 {
        self.scaling.particle_count(self.tier(), base)
    }

    /// Scale an animation length; slower tiers get longer animations
    pub fn animation_duration(&self, base: f64) -> f64 {
        self.scaling.animation_duration(self.tier(), base)
    }

    pub fn animation_duration_for(&self, base: Duration) -> Duration {
        base.mul_f64(self.scaling.duration_multiplier(self.tier()))
    }

    /// Reduced motion when the platform asks for it or the device is in the low tier
    pub fn should_reduce_motion(&self) -> bool {
        self.prefers_reduced_motion() || self.store.is_low_performance()
    }

    pub fn directive(&self) -> QualityDirective {
        let tier = self.tier();
        QualityDirective {
            tier,
            particle_multiplier: self.scaling.particle_multiplier(tier),
            duration_multiplier: self.scaling.duration_multiplier(tier),
            reduce_motion: self.prefers_reduced_motion() || tier == DeviceTier::Low,
        }
    }

    fn prefers_reduced_motion(&self) -> bool {
        match self.reduced_motion.prefers_reduced_motion() {
            Ok(reduce) => reduce,
            Err(e) => {
                debug!("Reduced motion preference unreadable, assuming false: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::PerformanceSample;

    fn provider_at(fps: Option<f64>, reduce: bool) -> QualityProvider {
        let store = Arc::new(MetricsStore::default());
        if let Some(fps) = fps {
            store.record_fps(PerformanceSample::new(fps));
        }
        QualityProvider::new(
            store,
            QualityScaling::default(),
            Arc::new(ReducedMotionFlag::new(reduce)),
        )
    }

    #[test]
    fn test_particle_count_per_tier() {
        let scaling = QualityScaling::default();
        assert_eq!(scaling.particle_count(DeviceTier::High, 100), 100);
        assert_eq!(scaling.particle_count(DeviceTier::Medium, 100), 70);
        assert_eq!(scaling.particle_count(DeviceTier::Low, 100), 40);
    }

    #[test]
    fn test_particle_count_rounds_down() {
        let scaling = QualityScaling::default();
        assert_eq!(scaling.particle_count(DeviceTier::Medium, 3), 2);
        assert_eq!(scaling.particle_count(DeviceTier::Low, 3), 1);
        assert_eq!(scaling.particle_count(DeviceTier::Low, 0), 0);
    }

    #[test]
    fn test_animation_duration_per_tier() {
        let scaling = QualityScaling::default();
        assert_eq!(scaling.animation_duration(DeviceTier::High, 10.0), 10.0);
        assert_eq!(scaling.animation_duration(DeviceTier::Medium, 10.0), 12.0);
        assert_eq!(scaling.animation_duration(DeviceTier::Low, 10.0), 15.0);
    }

    #[test]
    fn test_multipliers_are_monotonic() {
        let scaling = QualityScaling::default();
        let tiers = [DeviceTier::Low, DeviceTier::Medium, DeviceTier::High];
        for pair in tiers.windows(2) {
            assert!(scaling.particle_multiplier(pair[0]) <= scaling.particle_multiplier(pair[1]));
            assert!(scaling.duration_multiplier(pair[0]) >= scaling.duration_multiplier(pair[1]));
        }
    }

    #[test]
    fn test_provider_defaults_to_medium_without_samples() {
        let provider = provider_at(None, false);
        assert_eq!(provider.tier(), DeviceTier::Medium);
        assert_eq!(provider.particle_count(100), 70);
        assert_eq!(provider.animation_duration(10.0), 12.0);
        assert!(!provider.should_reduce_motion());
    }

    #[test]
    fn test_provider_follows_live_tier() {
        let store = Arc::new(MetricsStore::default());
        let provider = QualityProvider::new(
            Arc::clone(&store),
            QualityScaling::default(),
            Arc::new(NoReducedMotion),
        );

        store.record_fps(PerformanceSample::new(60.0));
        assert_eq!(provider.particle_count(100), 100);

        store.record_fps(PerformanceSample::new(20.0));
        assert_eq!(provider.particle_count(100), 40);
        assert_eq!(
            provider.animation_duration_for(Duration::from_secs(2)),
            Duration::from_secs(3)
        );
    }

    #[test]
    fn test_should_reduce_motion_truth_table() {
        // Accessibility preference wins regardless of tier
        assert!(provider_at(Some(60.0), true).should_reduce_motion());
        assert!(provider_at(Some(40.0), true).should_reduce_motion());
        assert!(provider_at(Some(10.0), true).should_reduce_motion());

        // Low tier forces it on
        assert!(provider_at(Some(10.0), false).should_reduce_motion());

        // Otherwise off
        assert!(!provider_at(Some(60.0), false).should_reduce_motion());
        assert!(!provider_at(Some(40.0), false).should_reduce_motion());
    }

    #[test]
    fn test_preference_is_reread_each_query() {
        let flag = ReducedMotionFlag::new(false);
        let provider = QualityProvider::new(
            Arc::new(MetricsStore::default()),
            QualityScaling::default(),
            Arc::new(flag.clone()),
        );

        assert!(!provider.should_reduce_motion());
        flag.set(true);
        assert!(provider.should_reduce_motion());
        assert!(provider.directive().reduce_motion);
    }

    #[test]
    fn test_unreadable_preference_is_false() {
        let provider = QualityProvider::new(
            Arc::new(MetricsStore::default()),
            QualityScaling::default(),
            Arc::new(EnvReducedMotion::new("PERFWATCH_TEST_UNSET_REDUCED_MOTION")),
        );
        assert!(!provider.should_reduce_motion());
    }

    #[test]
    fn test_env_reduced_motion_values() {
        let var = "PERFWATCH_TEST_REDUCED_MOTION_VALUES";
        let source = EnvReducedMotion::new(var);

        std::env::set_var(var, "Reduce");
        assert!(source.prefers_reduced_motion().unwrap());
        std::env::set_var(var, "no-preference");
        assert!(!source.prefers_reduced_motion().unwrap());
        std::env::remove_var(var);
        assert!(source.prefers_reduced_motion().is_err());
    }

    #[test]
    fn test_directive_for_low_tier() {
        let directive = provider_at(Some(12.0), false).directive();
        assert_eq!(directive.tier, DeviceTier::Low);
        assert_eq!(directive.particle_multiplier, 0.4);
        assert_eq!(directive.duration_multiplier, 1.5);
        assert!(directive.reduce_motion);
    }
}
