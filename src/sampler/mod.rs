mod clock;
mod frame_rate;
mod memory;

pub use clock::{frame_channel, FrameClock, FrameSignal, IntervalFrameClock, NoFrameClock, SignalFrameClock};
pub use frame_rate::FrameRateSampler;
pub use memory::{default_introspector, HeapIntrospector, MemorySampler, ProcIntrospector, UnavailableIntrospector};

use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Shortest window or interval a sampler accepts
pub const MIN_SAMPLE_PERIOD: Duration = Duration::from_millis(1);

/// Raise `period` to [`MIN_SAMPLE_PERIOD`], logging when it had to
pub(crate) fn clamp_period(period: Duration, name: &str) -> Duration {
    if period < MIN_SAMPLE_PERIOD {
        warn!(
            "{} period {:?} is below the minimum, using {:?}",
            name, period, MIN_SAMPLE_PERIOD
        );
        MIN_SAMPLE_PERIOD
    } else {
        period
    }
}

/// A spawned sampling loop and the token that ends it
pub(crate) struct SamplerTask {
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl SamplerTask {
    pub(crate) fn spawn<F, Fut>(body: F) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(body(cancel.clone()));
        Self {
            cancel,
            handle: Some(handle),
        }
    }

    /// Cancel the loop and wait until it has exited
    pub(crate) async fn shutdown(mut self, name: &str) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                if !e.is_cancelled() {
                    warn!("{} task ended abnormally: {}", name, e);
                }
            }
        }
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, |h| h.is_finished())
    }
}

impl Drop for SamplerTask {
    fn drop(&mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}
