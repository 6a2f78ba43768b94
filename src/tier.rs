//! Device tier classification from measured frame rate.

use crate::config::TierThresholds;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Coarse rendering capability of the running device
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceTier {
    Low,
    Medium,
    High,
}

impl DeviceTier {
    /// Tier assumed before the first frame-rate sample arrives
    pub const DEFAULT: DeviceTier = DeviceTier::Medium;

    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceTier::Low => "low",
            DeviceTier::Medium => "medium",
            DeviceTier::High => "high",
        }
    }
}

impl Default for DeviceTier {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for DeviceTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl TierThresholds {
    /// Map an FPS value onto a tier. NaN and negative values land in `Low`.
    pub fn classify(&self, fps: f64) -> DeviceTier {
        if fps >= self.high_fps {
            DeviceTier::High
        } else if fps >= self.low_fps {
            DeviceTier::Medium
        } else {
            DeviceTier::Low
        }
    }

    pub fn is_low_performance(&self, fps: f64) -> bool {
        fps.is_nan() || fps < self.low_fps
    }
}

/// Classify with the default 50/30 breakpoints
pub fn classify(fps: f64) -> DeviceTier {
    TierThresholds::default().classify(fps)
}

/// True when `fps` is below the default 30 FPS breakpoint
pub fn is_low_performance(fps: f64) -> bool {
    TierThresholds::default().is_low_performance(fps)
}
