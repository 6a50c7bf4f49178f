//! Notification bus fanning dashboard events out to subscribers.

use tokio::sync::broadcast;
use tracing::trace;

use aether_core::DashboardEvent;

/// Events buffered per subscriber before it starts lagging.
pub const DEFAULT_CAPACITY: usize = 256;

/// Best-effort, at-most-once broadcast of [`DashboardEvent`]s.
///
/// Late subscribers see only events published after they subscribed; slow
/// subscribers skip the events they lagged behind on.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<DashboardEvent>,
}

impl EventBus {
    /// Create a bus buffering up to `capacity` events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publish an event to every current subscriber.
    ///
    /// Returns the number of subscribers that received it.
    pub fn publish(&self, event: DashboardEvent) -> usize {
        let kind = event.kind();
        match self.tx.send(event) {
            Ok(receivers) => {
                trace!(event = kind, receivers, "Event published");
                receivers
            }
            // No subscribers connected.
            Err(_) => 0,
        }
    }

    /// Subscribe to events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<DashboardEvent> {
        self.tx.subscribe()
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
