//! Server-event bus: raw JSON events fanned out to every listener.
//!
//! Dropping a receiver unsubscribes it.

use serde_json::Value;
use tokio::sync::broadcast;

/// Default number of buffered events per listener before it lags.
pub const DEFAULT_BUS_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<Value>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Value> {
        self.tx.subscribe()
    }

    /// Deliver `event` to all listeners. Returns how many received it.
    pub fn publish(&self, event: Value) -> usize {
        self.tx.send(event).unwrap_or(0)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_BUS_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn events_reach_every_listener_in_order() {
        let bus = EventBus::default();
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();

        assert_eq!(bus.publish(json!({ "n": 1 })), 2);
        assert_eq!(bus.publish(json!({ "n": 2 })), 2);

        assert_eq!(a.recv().await.expect("event"), json!({ "n": 1 }));
        assert_eq!(a.recv().await.expect("event"), json!({ "n": 2 }));
        assert_eq!(b.recv().await.expect("event"), json!({ "n": 1 }));
    }

    #[test]
    fn dropping_receiver_unsubscribes() {
        let bus = EventBus::default();
        let rx = bus.subscribe();
        assert_eq!(bus.publish(json!({})), 1);
        drop(rx);
        assert_eq!(bus.publish(json!({})), 0);
    }
}
