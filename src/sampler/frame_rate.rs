use super::{clamp_period, FrameClock, SamplerTask};
use crate::events::{EventBus, PerfEvent};
use crate::metrics::{MetricsStore, PerformanceSample};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Counts frames per window and publishes the resulting FPS
pub struct FrameRateSampler {
    window: Duration,
    store: Arc<MetricsStore>,
    event_bus: EventBus,
    task: Option<SamplerTask>,
}

impl FrameRateSampler {
    /// Windows shorter than [`super::MIN_SAMPLE_PERIOD`] are raised to it
    pub fn new(window: Duration, store: Arc<MetricsStore>, event_bus: EventBus) -> Self {
        Self {
            window: clamp_period(window, "Frame-rate window"),
            store,
            event_bus,
            task: None,
        }
    }

    /// Start counting frames from `clock`. A running loop is replaced.
    pub async fn start<C: FrameClock>(&mut self, clock: C) {
        if let Some(previous) = self.task.take() {
            warn!("Frame-rate sampler already running, restarting");
            previous.shutdown("frame-rate sampler").await;
        }

        info!("Starting frame-rate sampler ({:?} window)", self.window);

        let window = self.window;
        let store = Arc::clone(&self.store);
        let event_bus = self.event_bus.clone();
        self.task = Some(SamplerTask::spawn(move |cancel| {
            run(clock, window, store, event_bus, cancel)
        }));
    }

    /// Stop sampling. Calling this when already stopped does nothing.
    pub async fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.shutdown("frame-rate sampler").await;
            info!("Frame-rate sampler stopped");
        }
    }

    /// True while the sampling loop is alive. A loop whose clock went away
    /// counts as not running.
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    pub fn window(&self) -> Duration {
        self.window
    }
}

async fn run<C: FrameClock>(
    mut clock: C,
    window: Duration,
    store: Arc<MetricsStore>,
    event_bus: EventBus,
    cancel: CancellationToken,
) {
    let mut frames: u64 = 0;
    let mut window_start = Instant::now();

    loop {
        let frame = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            frame = clock.next_frame() => frame,
        };

        let Some(now) = frame else {
            debug!("Frame clock unavailable, frame-rate sampler idle");
            break;
        };

        frames += 1;
        let elapsed = now.saturating_duration_since(window_start);
        if elapsed < window {
            continue;
        }

        let fps = (frames as f64 / elapsed.as_secs_f64()).round();
        let sample = PerformanceSample::new(fps);
        let update = store.record_fps(sample);
        debug!("Frame-rate sample: {} frames in {:?} -> {} fps", frames, elapsed, fps);

        event_bus.publish(PerfEvent::FpsSampled {
            sample,
            tier: update.current,
        });
        if update.changed() {
            event_bus.publish(PerfEvent::TierChanged {
                from: update.previous,
                to: update.current,
            });
        }

        frames = 0;
        window_start = now;
    }
}
