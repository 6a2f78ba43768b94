use crate::config::PerfwatchConfig;
use crate::error::Result;
use crate::events::{EventBus, PerfEvent};
use crate::metrics::{MetricsStore, PerformanceMetrics};
use crate::quality::{QualityProvider, ReducedMotionSource};
use crate::sampler::{FrameClock, FrameRateSampler, HeapIntrospector, MemorySampler};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info};

/// Owns one metrics record and the samplers that feed it.
///
/// Each monitor is independent: starting a second one creates a fresh record,
/// and stopping (or dropping) a monitor ends only its own sampling tasks.
pub struct PerformanceMonitor {
    config: PerfwatchConfig,
    store: Arc<MetricsStore>,
    event_bus: EventBus,
    frame_sampler: FrameRateSampler,
    memory_sampler: MemorySampler,
    reduced_motion: Arc<dyn ReducedMotionSource>,
    running: bool,
}

impl PerformanceMonitor {
    /// Validate `config`, create the metrics record and start both samplers
    pub async fn start<C: FrameClock>(
        config: PerfwatchConfig,
        clock: C,
        introspector: Arc<dyn HeapIntrospector>,
        reduced_motion: Arc<dyn ReducedMotionSource>,
    ) -> Result<Self> {
        config.validate()?;
        info!("Starting performance monitor");
        debug!("Monitor config: {:?}", config);

        let store = Arc::new(MetricsStore::new(config.tiers));
        let event_bus = EventBus::new(config.sampler.event_bus_capacity);

        let mut frame_sampler = FrameRateSampler::new(
            config.sampler.window(),
            Arc::clone(&store),
            event_bus.clone(),
        );
        let mut memory_sampler = MemorySampler::new(
            config.sampler.memory_interval(),
            Arc::clone(&store),
            event_bus.clone(),
        );

        frame_sampler.start(clock).await;
        memory_sampler.start(introspector).await;

        Ok(Self {
            config,
            store,
            event_bus,
            frame_sampler,
            memory_sampler,
            reduced_motion,
            running: true,
        })
    }

    /// Current metrics; the tier is `Medium` until the first window closes
    pub fn metrics(&self) -> PerformanceMetrics {
        self.store.snapshot()
    }

    /// Scaling functions bound to this monitor's live tier
    pub fn quality(&self) -> QualityProvider {
        QualityProvider::new(
            Arc::clone(&self.store),
            self.config.quality,
            Arc::clone(&self.reduced_motion),
        )
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PerfEvent> {
        self.event_bus.subscribe()
    }

    pub fn config(&self) -> &PerfwatchConfig {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// True while frames are still being counted
    pub fn is_sampling_frames(&self) -> bool {
        self.frame_sampler.is_running()
    }

    /// Stop both samplers. No events or metric updates follow once this
    /// returns; calling it again does nothing.
    pub async fn stop(&mut self) {
        if !self.running {
            debug!("Performance monitor already stopped");
            return;
        }

        info!("Stopping performance monitor");
        self.frame_sampler.stop().await;
        self.memory_sampler.stop().await;
        self.running = false;
        info!("Performance monitor stopped");
    }
}
