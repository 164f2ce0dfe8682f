//! Domain events emitted after a committed mutation.
//!
//! Events are built from the committed rows, never from the request, so a
//! subscriber only ever hears about credits that actually moved.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::boost::Boost;
use crate::credits::{CreditTransaction, Reference};
use crate::{EventId, UserId};

/// Kind of domain event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DomainEventKind {
    /// A seal was gifted. `user_id` is the recipient.
    SealGifted,
    /// A boost went live.
    BoostStarted,
    /// A payment top-up was credited.
    CreditsPurchased,
}

impl DomainEventKind {
    /// Get the kind name as a string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SealGifted => "seal_gifted",
            Self::BoostStarted => "boost_started",
            Self::CreditsPurchased => "credits_purchased",
        }
    }
}

/// Notification-facing record of a committed mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainEvent {
    /// Unique event ID.
    pub id: EventId,
    /// What happened.
    #[serde(rename = "type")]
    pub kind: DomainEventKind,
    /// The user to notify.
    pub user_id: UserId,
    /// The other party, for gifts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub counterparty_user_id: Option<UserId>,
    /// What the credits were for.
    pub reference: Reference,
    /// Credits moved (always positive).
    pub amount: i64,
    /// Commit time.
    pub occurred_at: DateTime<Utc>,
}

impl DomainEvent {
    /// Event for a committed gift, addressed to the recipient.
    #[must_use]
    pub fn seal_gifted(received: &CreditTransaction) -> Self {
        Self {
            id: EventId::generate(),
            kind: DomainEventKind::SealGifted,
            user_id: received.user_id,
            counterparty_user_id: received.counterparty_user_id,
            reference: received.reference.clone(),
            amount: received.amount,
            occurred_at: received.created_at,
        }
    }

    /// Event for a boost record that now exists.
    #[must_use]
    pub fn boost_started(boost: &Boost) -> Self {
        Self {
            id: EventId::generate(),
            kind: DomainEventKind::BoostStarted,
            user_id: boost.user_id,
            counterparty_user_id: None,
            reference: boost.subject.reference(),
            amount: boost.credits_spent,
            occurred_at: boost.created_at,
        }
    }

    /// Event for a committed purchase.
    #[must_use]
    pub fn credits_purchased(purchase: &CreditTransaction) -> Self {
        Self {
            id: EventId::generate(),
            kind: DomainEventKind::CreditsPurchased,
            user_id: purchase.user_id,
            counterparty_user_id: None,
            reference: purchase.reference.clone(),
            amount: purchase.amount,
            occurred_at: purchase.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credits::{LedgerEntry, ReferenceType};

    #[test]
    fn gift_event_targets_recipient() {
        let sender = UserId::generate();
        let recipient = UserId::generate();
        let reference = Reference::new(ReferenceType::SealGift, "rose");
        let [_, received] = LedgerEntry::gift_pair(sender, recipient, 30, &reference).unwrap();
        let tx = received.into_transaction(0, 30, Utc::now());

        let event = DomainEvent::seal_gifted(&tx);
        assert_eq!(event.kind, DomainEventKind::SealGifted);
        assert_eq!(event.user_id, recipient);
        assert_eq!(event.counterparty_user_id, Some(sender));
        assert_eq!(event.amount, 30);
    }

    #[test]
    fn event_wire_shape() {
        let tx = LedgerEntry::purchase(
            UserId::generate(),
            500,
            Reference::new(ReferenceType::Purchase, "evt_1"),
        )
        .unwrap()
        .into_transaction(0, 500, Utc::now());

        let json = serde_json::to_value(DomainEvent::credits_purchased(&tx)).unwrap();
        assert_eq!(json["type"], "credits_purchased");
        assert_eq!(json["amount"], 500);
        assert!(json.get("counterparty_user_id").is_none());
    }
}
