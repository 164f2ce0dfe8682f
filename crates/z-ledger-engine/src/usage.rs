//! Usage counters.

use chrono::Duration;
use z_ledger_core::{
    AccountFacts, Feature, IncrementOutcome, LedgerError, Limit, Result, UsageSnapshot,
};

use crate::Engine;

impl Engine {
    /// The account's current limit for `feature`.
    #[must_use]
    pub fn limit_for(&self, facts: &AccountFacts, feature: Feature) -> Limit {
        facts.limits(&self.catalog).limit(feature)
    }

    /// Read the counter without writing. A missing or stale row reads as zero.
    ///
    /// # Errors
    ///
    /// Returns an error if the store read fails.
    pub fn peek(&self, facts: &AccountFacts, feature: Feature) -> Result<UsageSnapshot> {
        let now = self.clock.now();
        let calendar = &self.config.calendar;
        let period = feature.period();

        let row = self.store.get_counter(&facts.user_id, feature)?;
        Ok(UsageSnapshot::from_row(
            row.as_ref(),
            feature,
            self.limit_for(facts, feature),
            calendar.period_start(period, now),
            calendar.resets_at(period, now),
        ))
    }

    /// Count one use if the current limit allows it.
    ///
    /// Returns `allowed = false` without counting when the limit is reached.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::ConcurrencyConflict` if the row could not be
    /// locked in time, or a storage error.
    pub fn increment(&self, facts: &AccountFacts, feature: Feature) -> Result<IncrementOutcome> {
        let now = self.clock.now();
        let period_start = self.config.calendar.period_start(feature.period(), now);
        let limit = self.limit_for(facts, feature);

        let outcome = self
            .store
            .increment_counter(&facts.user_id, feature, period_start, limit, now)?;

        if outcome.allowed {
            tracing::debug!(
                user_id = %facts.user_id,
                feature = %feature,
                count = outcome.count,
                limit = %outcome.limit,
                "usage counted"
            );
        } else {
            tracing::info!(
                user_id = %facts.user_id,
                feature = %feature,
                limit = %outcome.limit,
                "usage rejected at limit"
            );
        }

        Ok(outcome)
    }

    /// Count one use, treating a full quota as an error.
    ///
    /// Call this only after the gated action has succeeded.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::QuotaExceeded` when the limit is reached; nothing
    /// is counted in that case.
    pub fn consume(&self, facts: &AccountFacts, feature: Feature) -> Result<IncrementOutcome> {
        let outcome = self.increment(facts, feature)?;
        if outcome.allowed {
            Ok(outcome)
        } else {
            Err(LedgerError::QuotaExceeded {
                feature,
                limit: outcome.limit,
            })
        }
    }

    /// Delete counter rows older than the configured retention.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn prune_counters(&self) -> Result<usize> {
        let now = self.clock.now();
        let retention = Duration::days(i64::from(self.config.counter_retention_days));
        let cutoff = self.config.calendar.day_of(now - retention);

        let removed = self.store.prune_counters(cutoff)?;
        if removed > 0 {
            tracing::info!(removed, cutoff = %cutoff, "pruned usage counters");
        }
        Ok(removed)
    }
}
