use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

/// Source of per-frame notifications from the host render loop
#[async_trait]
pub trait FrameClock: Send + 'static {
    /// Wait for the next rendered frame. `None` means the host has no frame
    /// signal (headless context) or it has gone away.
    async fn next_frame(&mut self) -> Option<Instant>;
}

/// Handle the render loop calls once per presented frame
#[derive(Debug, Clone)]
pub struct FrameSignal {
    sender: mpsc::UnboundedSender<Instant>,
}

impl FrameSignal {
    /// Report a rendered frame. Returns false once the sampler is gone.
    pub fn frame(&self) -> bool {
        self.sender.send(Instant::now()).is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

/// Clock fed by a [`FrameSignal`]
#[derive(Debug)]
pub struct SignalFrameClock {
    receiver: mpsc::UnboundedReceiver<Instant>,
}

/// Create a connected signal/clock pair
pub fn frame_channel() -> (FrameSignal, SignalFrameClock) {
    let (sender, receiver) = mpsc::unbounded_channel();
    (FrameSignal { sender }, SignalFrameClock { receiver })
}

#[async_trait]
impl FrameClock for SignalFrameClock {
    async fn next_frame(&mut self) -> Option<Instant> {
        self.receiver.recv().await
    }
}

/// Synthetic clock ticking at a fixed rate
#[derive(Debug)]
pub struct IntervalFrameClock {
    ticker: Option<Interval>,
}

/// Shortest frame period a synthetic clock will tick at
const MIN_FRAME_PERIOD: Duration = Duration::from_nanos(1);

impl IntervalFrameClock {
    /// A non-positive or non-finite rate, or one so slow its first tick cannot
    /// be represented, yields a clock that never ticks. Rates faster
    /// than one frame per nanosecond tick every nanosecond.
    pub fn new(fps: f64) -> Self {
        let period = (fps.is_finite() && fps > 0.0)
            .then(|| Duration::try_from_secs_f64(1.0 / fps).ok())
            .flatten()
            .map(|period| period.max(MIN_FRAME_PERIOD));

        let ticker = period.and_then(|period| {
            let start = Instant::now().checked_add(period)?;
            let mut ticker = interval_at(start, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            Some(ticker)
        });
        Self { ticker }
    }

    /// Time between ticks, `None` for a clock that never ticks
    pub fn period(&self) -> Option<Duration> {
        self.ticker.as_ref().map(Interval::period)
    }
}

#[async_trait]
impl FrameClock for IntervalFrameClock {
    async fn next_frame(&mut self) -> Option<Instant> {
        match self.ticker.as_mut() {
            Some(ticker) => Some(ticker.tick().await),
            None => None,
        }
    }
}

/// Clock for contexts with no redraw loop at all
#[derive(Debug, Default, Clone, Copy)]
pub struct NoFrameClock;

#[async_trait]
impl FrameClock for NoFrameClock {
    async fn next_frame(&mut self) -> Option<Instant> {
        None
    }
}
