//! In-process domain event bus.
//!
//! Events are published after commit. Delivery is best effort: a publish with
//! no subscribers is dropped, and a slow subscriber lags rather than blocking
//! the ledger.

use tokio::sync::broadcast;
use z_ledger_core::DomainEvent;

/// Broadcast channel for [`DomainEvent`]s.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<DomainEvent>,
}

impl EventBus {
    /// Create a bus buffering `capacity` events per subscriber.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Receive every event published from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<DomainEvent> {
        self.sender.subscribe()
    }

    /// Publish a committed event.
    pub fn publish(&self, event: DomainEvent) {
        let kind = event.kind.as_str();
        let id = event.id;
        match self.sender.send(event) {
            Ok(receivers) => tracing::debug!(event_id = %id, kind, receivers, "event published"),
            Err(_) => tracing::trace!(event_id = %id, kind, "event dropped: no subscribers"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use z_ledger_core::{LedgerEntry, Reference, ReferenceType, UserId};

    fn purchase_event() -> DomainEvent {
        let tx = LedgerEntry::purchase(
            UserId::generate(),
            100,
            Reference::new(ReferenceType::Purchase, "evt"),
        )
        .unwrap()
        .into_transaction(0, 100, Utc::now());
        DomainEvent::credits_purchased(&tx)
    }

    #[test]
    fn publish_without_subscribers_is_fine() {
        EventBus::new(4).publish(purchase_event());
    }

    #[test]
    fn subscribers_receive_events() {
        let bus = EventBus::new(4);
        let mut rx = bus.subscribe();
        let event = purchase_event();
        bus.publish(event.clone());
        assert_eq!(rx.try_recv().unwrap(), event);
    }
}
