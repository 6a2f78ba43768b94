use crate::metrics::{MemorySample, PerformanceSample};
use crate::tier::DeviceTier;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Events published by the performance monitor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PerfEvent {
    /// A frame-rate window closed
    FpsSampled {
        sample: PerformanceSample,
        tier: DeviceTier,
    },
    /// The device tier moved after a sample
    TierChanged { from: DeviceTier, to: DeviceTier },
    /// Heap counters were read
    MemorySampled { sample: MemorySample },
}

impl PerfEvent {
    /// Get a human-readable description of the event
    pub fn description(&self) -> String {
        match self {
            PerfEvent::FpsSampled { sample, tier } => {
                format!("{:.1} fps ({} tier)", sample.fps, tier)
            }
            PerfEvent::TierChanged { from, to } => {
                format!("Device tier changed from {} to {}", from, to)
            }
            PerfEvent::MemorySampled { sample } => {
                format!(
                    "Heap {} / {} bytes (limit {})",
                    sample.used_bytes, sample.total_bytes, sample.limit_bytes
                )
            }
        }
    }

    /// Get the event type as a string for filtering
    pub fn event_type(&self) -> &'static str {
        match self {
            PerfEvent::FpsSampled { .. } => "fps_sampled",
            PerfEvent::TierChanged { .. } => "tier_changed",
            PerfEvent::MemorySampled { .. } => "memory_sampled",
        }
    }
}

/// Broadcast bus for monitor events
pub struct EventBus {
    sender: broadcast::Sender<PerfEvent>,
}

impl EventBus {
    /// Create a new event bus with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to events and get a receiver
    pub fn subscribe(&self) -> broadcast::Receiver<PerfEvent> {
        self.sender.subscribe()
    }

    /// Publish an event to all subscribers, returning how many received it.
    /// Having no subscribers is not an error.
    pub fn publish(&self, event: PerfEvent) -> usize {
        match &event {
            PerfEvent::TierChanged { to, .. } if *to == DeviceTier::Low => {
                warn!("{}", event.description());
            }
            PerfEvent::TierChanged { .. } => {
                info!("{}", event.description());
            }
            _ => {
                debug!("Event: {}", event.description());
            }
        }

        self.sender.send(event).unwrap_or(0)
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Clone for EventBus {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}
