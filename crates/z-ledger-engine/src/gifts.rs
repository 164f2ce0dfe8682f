//! Seal gifts.

use serde::{Deserialize, Serialize};
use z_ledger_core::{
    CreditTransaction, DomainEvent, LedgerEntry, LedgerError, Reference, ReferenceType, Result,
    UserId,
};

use crate::Engine;

/// Both legs of a committed gift.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GiftReceipt {
    /// Debit against the sender.
    pub sent: CreditTransaction,
    /// Credit to the recipient.
    pub received: CreditTransaction,
}

impl Engine {
    /// Gift a seal costing `cost` credits.
    ///
    /// Both legs commit together or not at all.
    ///
    /// # Errors
    ///
    /// - `LedgerError::SelfGift` if sender and recipient match.
    /// - `LedgerError::InsufficientCredits` if the sender cannot pay.
    pub fn gift_seal(
        &self,
        sender_id: UserId,
        recipient_id: UserId,
        cost: i64,
        seal_id: &str,
    ) -> Result<GiftReceipt> {
        let reference = Reference::new(ReferenceType::SealGift, seal_id);
        let legs = LedgerEntry::gift_pair(sender_id, recipient_id, cost, &reference)?;

        let [sent, received]: [CreditTransaction; 2] = self
            .commit(legs.into(), None)?
            .try_into()
            .map_err(|_| LedgerError::Storage("gift did not commit two rows".into()))?;

        self.events.publish(DomainEvent::seal_gifted(&received));
        Ok(GiftReceipt { sent, received })
    }
}
