//! EventBus — process-wide publish/subscribe for the admin live stream.
//!
//! Constructed once in `main` and injected through `AppState`; there is no
//! module-level global registry. Delivery is at-most-once per subscriber per
//! publish with no persistence or replay: a subscriber that connects after a
//! publish misses it, which is acceptable for advisory admin events.
//!
//! Fan-out is scoped to this server process. Multi-instance deployments would
//! need an external broker to deliver across instances.

use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast;

/// Published when the admin action log changes (exhaustion alerts, audit rows).
pub const ACTIONS_UPDATED: &str = "actions.updated";

const CHANNEL_CAPACITY: usize = 256;

/// A single event on the bus.
#[derive(Debug, Clone, Serialize)]
pub struct BusEvent {
    pub event_type: String,
    pub payload: Value,
}

/// Cloneable handle to the process-wide broadcast channel.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<BusEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Publishes an event to all current subscribers.
    /// Returns the number of subscribers that received it (0 is not an error).
    pub fn publish(&self, event_type: &str, payload: Value) -> usize {
        self.tx
            .send(BusEvent {
                event_type: event_type.to_string(),
                payload,
            })
            .unwrap_or(0)
    }

    /// Registers a new subscriber. Dropping the receiver unsubscribes.
    pub fn subscribe(&self) -> broadcast::Receiver<BusEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
