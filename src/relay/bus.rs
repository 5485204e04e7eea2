use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketEventKind {
    TicketCreated,
    TicketUpdate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicketEvent {
    #[serde(rename = "type")]
    pub kind: TicketEventKind,
    pub ticket_id: i64,
    pub payload: Value,
}

static EVENTS_PUBLISHED: AtomicU64 = AtomicU64::new(0);

/// Total events handed to any bus since startup.
pub fn events_published() -> u64 {
    EVENTS_PUBLISHED.load(Ordering::Relaxed)
}

/// Fan-out of ticket events to live subscribers. Delivery is best-effort.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<TicketEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Returns the number of subscribers that will see the event.
    pub fn publish(&self, event: TicketEvent) -> usize {
        EVENTS_PUBLISHED.fetch_add(1, Ordering::Relaxed);
        self.sender.send(event).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TicketEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tokio::sync::broadcast::error::RecvError;

    use super::{EventBus, TicketEvent, TicketEventKind, events_published};

    fn event(ticket_id: i64) -> TicketEvent {
        TicketEvent {
            kind: TicketEventKind::TicketUpdate,
            ticket_id,
            payload: json!({}),
        }
    }

    #[test]
    fn serializes_with_type_tag() {
        let value = serde_json::to_value(TicketEvent {
            kind: TicketEventKind::TicketCreated,
            ticket_id: 3,
            payload: json!({ "ticket_number": 42 }),
        })
        .expect("serialize");
        assert_eq!(value["type"], "ticket_created");
        assert_eq!(value["ticket_id"], 3);
        assert_eq!(value["payload"]["ticket_number"], 42);
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_dropped() {
        let bus = EventBus::new(4);
        assert_eq!(bus.publish(event(1)), 0);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn slow_subscriber_sees_lag() {
        let bus = EventBus::new(2);
        let mut rx = bus.subscribe();
        for id in 0..5 {
            bus.publish(event(id));
        }

        assert!(matches!(rx.recv().await, Err(RecvError::Lagged(3))));
        assert_eq!(rx.recv().await.expect("next event").ticket_id, 3);
    }

    #[test]
    fn publishing_counts_even_without_subscribers() {
        let bus = EventBus::new(4);
        let before = events_published();
        assert_eq!(bus.publish(event(1)), 0);
        assert!(events_published() > before);
    }
}
