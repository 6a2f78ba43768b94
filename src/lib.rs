pub mod config;
pub mod error;
pub mod events;
pub mod metrics;
pub mod monitor;
pub mod quality;
pub mod sampler;
pub mod tier;

pub use config::{PerfwatchConfig, QualityScaling, SamplerConfig, TierThresholds};
pub use error::{PerfwatchError, Result};
pub use events::{EventBus, PerfEvent};
pub use metrics::{MemorySample, MetricsStore, PerformanceMetrics, PerformanceSample, TierUpdate};
pub use monitor::PerformanceMonitor;
pub use quality::{
    EnvReducedMotion, NoReducedMotion, QualityDirective, QualityProvider, ReducedMotionFlag,
    ReducedMotionSource,
};
pub use sampler::{
    default_introspector, frame_channel, FrameClock, FrameRateSampler, FrameSignal,
    HeapIntrospector, IntervalFrameClock, MemorySampler, NoFrameClock, ProcIntrospector,
    SignalFrameClock, UnavailableIntrospector,
};
pub use tier::{classify, is_low_performance, DeviceTier};
