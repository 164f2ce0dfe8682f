//! Paid boosts.
//!
//! A boost is "check subject → debit → record". The subject lock is held for
//! the whole sequence so two boosts of one subject cannot both pass the check.
//! The debit and the record are separate commits: if the record fails, the
//! debit stands and the caller retries only the record.

use serde::{Deserialize, Serialize};
use z_ledger_core::{
    Boost, BoostRequest, BoostSubject, CreditTransaction, DomainEvent, LedgerEntry, LedgerError,
    Result, TransactionId, TransactionType,
};
use z_ledger_store::LockKey;

use crate::Engine;

/// A successful boost and the spend that paid for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoostReceipt {
    /// The live boost.
    pub boost: Boost,
    /// The committed spend.
    pub transaction: CreditTransaction,
}

impl Engine {
    fn validate_boost(&self, request: &BoostRequest) -> Result<()> {
        let max_hours = self.config.max_boost_hours;
        if request.duration_hours == 0 || request.duration_hours > max_hours {
            return Err(LedgerError::InvalidDuration {
                hours: request.duration_hours,
                max_hours,
            });
        }

        let minimum = self.config.min_boost_credits;
        if request.credits < minimum {
            return Err(LedgerError::BoostBelowMinimum {
                credits: request.credits,
                minimum,
            });
        }

        Ok(())
    }

    /// Boost a story or profile.
    ///
    /// # Errors
    ///
    /// - `LedgerError::InvalidDuration` / `LedgerError::BoostBelowMinimum` for bad requests.
    /// - `LedgerError::AlreadyBoosted` if the subject has a live boost. No credits move.
    /// - `LedgerError::InsufficientCredits` if the user cannot pay.
    /// - `LedgerError::BoostRecordFailed` if credits were spent but the record
    ///   could not be written; retry with [`Engine::retry_boost_record`].
    pub fn boost(&self, request: BoostRequest) -> Result<BoostReceipt> {
        self.validate_boost(&request)?;

        let _subject = self.subjects.lock(&LockKey::Subject(request.subject))?;

        if let Some(active) = self.store.get_active_boost(&request.subject, self.clock.now())? {
            tracing::warn!(
                subject = %request.subject,
                user_id = %request.user_id,
                expires_at = %active.expires_at,
                "boost rejected: subject already boosted"
            );
            return Err(LedgerError::AlreadyBoosted {
                subject: request.subject.to_string(),
            });
        }

        let entry =
            LedgerEntry::spend(request.user_id, request.credits, request.subject.reference())?;
        let transaction = self
            .commit(vec![entry], None)?
            .into_iter()
            .next()
            .ok_or_else(|| LedgerError::Storage("commit returned no rows".into()))?;

        let recorded = Boost::from_spend(&request, &transaction).and_then(|boost| {
            Ok(self.store.insert_boost(&boost, transaction.created_at)?)
        });
        match recorded {
            Ok(boost) => {
                tracing::info!(
                    boost_id = %boost.id,
                    subject = %boost.subject,
                    transaction_id = %transaction.id,
                    expires_at = %boost.expires_at,
                    "boost started"
                );
                self.events.publish(DomainEvent::boost_started(&boost));
                Ok(BoostReceipt { boost, transaction })
            }
            Err(err) => {
                tracing::error!(
                    subject = %request.subject,
                    transaction_id = %transaction.id,
                    error = %err,
                    "boost record failed after spend"
                );
                Err(LedgerError::BoostRecordFailed {
                    transaction_id: transaction.id,
                    balance_after: transaction.balance_after,
                    message: err.to_string(),
                })
            }
        }
    }

    /// Create the boost record for a spend that already committed.
    ///
    /// Never debits. Returns the existing record if one was already written.
    ///
    /// # Errors
    ///
    /// - `LedgerError::InvalidDuration` / `LedgerError::BoostBelowMinimum` for bad requests.
    /// - `LedgerError::NotFound` if the transaction does not exist.
    /// - `LedgerError::InvalidAmount` if the transaction did not pay for this request.
    /// - `LedgerError::AlreadyBoosted` if another boost went live on the subject meanwhile.
    pub fn retry_boost_record(
        &self,
        transaction_id: &TransactionId,
        request: BoostRequest,
    ) -> Result<Boost> {
        self.validate_boost(&request)?;

        let spend = self
            .store
            .get_transaction(transaction_id)?
            .ok_or_else(|| LedgerError::NotFound {
                entity: "transaction",
                id: transaction_id.to_string(),
            })?;

        let pays_for_request = spend.transaction_type == TransactionType::Spend
            && spend.user_id == request.user_id
            && spend.reference == request.subject.reference()
            && -spend.amount == request.credits;
        if !pays_for_request {
            return Err(LedgerError::InvalidAmount(format!(
                "transaction {transaction_id} did not pay for a boost of {}",
                request.subject
            )));
        }

        let _subject = self.subjects.lock(&LockKey::Subject(request.subject))?;

        if let Some(existing) = self.store.get_boost_by_transaction(transaction_id)? {
            return Ok(existing);
        }

        let boost = self
            .store
            .insert_boost(&Boost::from_spend(&request, &spend)?, self.clock.now())?;
        tracing::info!(
            boost_id = %boost.id,
            subject = %boost.subject,
            transaction_id = %transaction_id,
            "boost record recovered"
        );
        self.events.publish(DomainEvent::boost_started(&boost));
        Ok(boost)
    }

    /// The subject's live boost, if any. Expiry is checked against the clock.
    ///
    /// # Errors
    ///
    /// Returns an error if the store read fails.
    pub fn active_boost(&self, subject: &BoostSubject) -> Result<Option<Boost>> {
        Ok(self.store.get_active_boost(subject, self.clock.now())?)
    }

    /// Mark expired boosts inactive. Reads do not depend on this.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn sweep_expired_boosts(&self) -> Result<usize> {
        let changed = self.store.deactivate_expired_boosts(self.clock.now())?;
        if changed > 0 {
            tracing::info!(changed, "expired boosts deactivated");
        }
        Ok(changed)
    }
}
