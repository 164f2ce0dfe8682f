//! Credit accounts and the ledger.
//!
//! Every balance change goes through [`Engine::commit`], which hands the
//! entries to the store as one atomic unit and logs the outcome.

use z_ledger_core::{
    reconcile, CreditAccount, CreditTransaction, DomainEvent, LedgerEntry, LedgerError,
    LedgerTotals, Reference, ReferenceType, Result, TransactionId, TransactionType, UserId,
};

use crate::Engine;

impl Engine {
    /// Commit entries as one unit and log the result.
    pub(crate) fn commit(
        &self,
        entries: Vec<LedgerEntry>,
        idempotency_key: Option<&str>,
    ) -> Result<Vec<CreditTransaction>> {
        let now = self.clock.now();
        match self.store.commit_entries(entries, idempotency_key, now) {
            Ok(rows) => {
                for tx in &rows {
                    tracing::info!(
                        transaction_id = %tx.id,
                        user_id = %tx.user_id,
                        transaction_type = %tx.transaction_type,
                        amount = tx.amount,
                        balance_after = tx.balance_after,
                        reference = %tx.reference,
                        "ledger row committed"
                    );
                }
                Ok(rows)
            }
            Err(err) => {
                let err = LedgerError::from(err);
                if err.is_system_fault() {
                    tracing::error!(error = %err, "ledger commit failed");
                } else {
                    tracing::warn!(error = %err, "ledger commit rejected");
                }
                Err(err)
            }
        }
    }

    fn commit_one(
        &self,
        entry: LedgerEntry,
        idempotency_key: Option<&str>,
    ) -> Result<CreditTransaction> {
        self.commit(vec![entry], idempotency_key)?
            .into_iter()
            .next()
            .ok_or_else(|| LedgerError::Storage("commit returned no rows".into()))
    }

    /// Fetch the account, creating an empty one on first touch.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails or the row lock times out.
    pub fn ensure_account(&self, user_id: &UserId) -> Result<CreditAccount> {
        Ok(self.store.ensure_account(user_id, self.clock.now())?)
    }

    /// Apply one balance change.
    ///
    /// `amount` is signed: negative for `spend` and `gift_sent`, positive otherwise.
    ///
    /// # Errors
    ///
    /// - `LedgerError::InvalidAmount` if the sign does not match the type, or a
    ///   spend carries a boost reference.
    /// - `LedgerError::InsufficientCredits` if a debit would go below zero.
    /// - `LedgerError::ConcurrencyConflict` if the unit could not be serialized in time.
    pub fn apply_transaction(
        &self,
        user_id: UserId,
        transaction_type: TransactionType,
        amount: i64,
        reference: Reference,
    ) -> Result<CreditTransaction> {
        if transaction_type == TransactionType::Spend {
            reject_boost_reference(&reference)?;
        }
        let entry = LedgerEntry::new(user_id, transaction_type, amount, reference)?;
        self.commit_one(entry, None)
    }

    /// Spend `credits` on a paid action.
    ///
    /// Boosts are paid through [`Engine::boost`] only.
    ///
    /// # Errors
    ///
    /// See [`Engine::apply_transaction`].
    pub fn spend(
        &self,
        user_id: UserId,
        credits: i64,
        reference: Reference,
    ) -> Result<CreditTransaction> {
        reject_boost_reference(&reference)?;
        self.commit_one(LedgerEntry::spend(user_id, credits, reference)?, None)
    }

    /// Credit a payment top-up. Replaying the same `event_id` changes nothing.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::DuplicateEvent` on replay.
    pub fn purchase(
        &self,
        user_id: UserId,
        credits: i64,
        event_id: &str,
    ) -> Result<CreditTransaction> {
        let entry = LedgerEntry::purchase(
            user_id,
            credits,
            Reference::new(ReferenceType::Purchase, event_id),
        )?;
        let tx = self.commit_one(entry, Some(event_id))?;
        self.events.publish(DomainEvent::credits_purchased(&tx));
        Ok(tx)
    }

    /// Grant promotional credits.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::InvalidAmount` if `credits` is not positive.
    pub fn grant_bonus(
        &self,
        user_id: UserId,
        credits: i64,
        reason: &str,
    ) -> Result<CreditTransaction> {
        let entry = LedgerEntry::new(
            user_id,
            TransactionType::Bonus,
            credits,
            Reference::new(ReferenceType::Promotion, reason),
        )?;
        self.commit_one(entry, None)
    }

    /// Give back credits that were spent.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::InvalidAmount` if `credits` is not positive or
    /// exceeds what the user has spent.
    pub fn refund(
        &self,
        user_id: UserId,
        credits: i64,
        reference: Reference,
    ) -> Result<CreditTransaction> {
        let entry = LedgerEntry::new(user_id, TransactionType::Refund, credits, reference)?;
        self.commit_one(entry, None)
    }

    /// Read an account without creating it.
    ///
    /// # Errors
    ///
    /// Returns an error if the store read fails.
    pub fn account(&self, user_id: &UserId) -> Result<Option<CreditAccount>> {
        Ok(self.store.get_account(user_id)?)
    }

    /// A page of the user's ledger, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the store read fails.
    pub fn transactions(
        &self,
        user_id: &UserId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<CreditTransaction>> {
        Ok(self.store.list_transactions_by_user(user_id, limit, offset)?)
    }

    /// Look up one ledger row.
    ///
    /// # Errors
    ///
    /// Returns an error if the store read fails.
    pub fn transaction(&self, transaction_id: &TransactionId) -> Result<Option<CreditTransaction>> {
        Ok(self.store.get_transaction(transaction_id)?)
    }

    /// Reconcile an account against its full ledger.
    ///
    /// A mismatch is logged and returned; nothing is repaired.
    ///
    /// # Errors
    ///
    /// - `LedgerError::NotFound` if the account does not exist.
    /// - `LedgerError::AccountInconsistent` if balance and ledger disagree.
    pub fn verify_account(&self, user_id: &UserId) -> Result<LedgerTotals> {
        let (account, ledger) = self.store.ledger_snapshot(user_id)?.ok_or_else(|| {
            LedgerError::NotFound {
                entity: "account",
                id: user_id.to_string(),
            }
        })?;

        reconcile(&account, &ledger).map_err(|err| {
            tracing::error!(user_id = %user_id, error = %err, "account failed reconciliation");
            err
        })
    }
}

fn reject_boost_reference(reference: &Reference) -> Result<()> {
    if reference.reference_type.is_boost() {
        return Err(LedgerError::InvalidAmount(format!(
            "{} spends go through the boost endpoint",
            reference.reference_type.as_str()
        )));
    }
    Ok(())
}
