//! Event fan-out to observers

use crate::SessionEvent;
use tokio::sync::broadcast;
use tracing::trace;

const DEFAULT_CAPACITY: usize = 256;

/// Fire-and-forget fan-out of orchestrator events
///
/// Delivery is best-effort: publishing with no observers connected is not an
/// error, and an observer that falls behind the channel capacity loses the
/// oldest events rather than blocking the orchestrator. There is no replay;
/// an observer that subscribes after an event fired never sees it.
#[derive(Debug, Clone)]
pub struct EventBroadcaster {
    sender: broadcast::Sender<SessionEvent>,
}

impl EventBroadcaster {
    /// Create a broadcaster with the given per-observer buffer capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current observers.
    pub fn publish(&self, event: SessionEvent) {
        // Err means no receivers are subscribed, which is fine.
        if self.sender.send(event).is_err() {
            trace!("Event published with no observers connected");
        }
    }

    /// Subscribe to events published from this point on.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.sender.subscribe()
    }

    /// Number of currently subscribed observers.
    pub fn observer_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
