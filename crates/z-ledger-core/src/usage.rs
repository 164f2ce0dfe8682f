//! Usage counter types for z-ledger.
//!
//! One live counter row exists per `(user, feature)`. The row remembers the
//! period it was last written in; a row from an earlier period counts as zero.
//! Stores call [`apply_increment`] while holding the row's lock so the rollover
//! and the increment happen in the same atomic step.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::plan::{Feature, Limit};
use crate::UserId;

/// Persisted counter row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageCounter {
    /// Counted user.
    pub user_id: UserId,
    /// Counted feature.
    pub feature: Feature,
    /// First day of the period `count` belongs to.
    pub period_start: NaiveDate,
    /// Uses recorded in that period.
    pub count: u32,
    /// Limit in force at the last successful increment.
    pub limit_snapshot: Limit,
    /// Last write.
    pub updated_at: DateTime<Utc>,
}

impl UsageCounter {
    /// Effective count for the period starting at `period_start`.
    ///
    /// Rows from earlier periods have rolled over. A row stamped with a later
    /// period than `period_start` (clock skew between writers) keeps its count.
    #[must_use]
    pub fn count_in(&self, period_start: NaiveDate) -> u32 {
        if self.period_start < period_start {
            0
        } else {
            self.count
        }
    }
}

/// Result of an increment attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncrementOutcome {
    /// Count after the attempt.
    pub count: u32,
    /// Limit the attempt was judged against.
    pub limit: Limit,
    /// Whether the use was recorded.
    pub allowed: bool,
}

/// Read-only view of a counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageSnapshot {
    /// Feature.
    pub feature: Feature,
    /// Uses so far in the current period.
    pub count: u32,
    /// Current plan limit.
    pub limit: Limit,
    /// Uses left.
    pub remaining: Limit,
    /// When the current period ends.
    pub resets_at: DateTime<Utc>,
}

impl UsageSnapshot {
    /// Build a snapshot from the stored row, or a virtual zero row if none.
    #[must_use]
    pub fn from_row(
        row: Option<&UsageCounter>,
        feature: Feature,
        limit: Limit,
        period_start: NaiveDate,
        resets_at: DateTime<Utc>,
    ) -> Self {
        let count = row.map_or(0, |r| r.count_in(period_start));
        Self {
            feature,
            count,
            limit,
            remaining: limit.remaining(count),
            resets_at,
        }
    }

    /// Whether one more use fits.
    #[must_use]
    pub const fn has_room(&self) -> bool {
        self.limit.permits(self.count)
    }
}

/// Decide an increment against the stored row.
///
/// Returns the outcome and, when the use is allowed, the row to write back.
/// A rejected attempt writes nothing.
#[must_use]
pub fn apply_increment(
    existing: Option<&UsageCounter>,
    user_id: UserId,
    feature: Feature,
    period_start: NaiveDate,
    limit: Limit,
    now: DateTime<Utc>,
) -> (IncrementOutcome, Option<UsageCounter>) {
    let current = existing.map_or(0, |row| row.count_in(period_start));

    if !limit.permits(current) {
        return (
            IncrementOutcome {
                count: current,
                limit,
                allowed: false,
            },
            None,
        );
    }

    let count = current.saturating_add(1);
    let stamped = existing.map_or(period_start, |row| row.period_start.max(period_start));
    let row = UsageCounter {
        user_id,
        feature,
        period_start: stamped,
        count,
        limit_snapshot: limit,
        updated_at: now,
    };

    (
        IncrementOutcome {
            count,
            limit,
            allowed: true,
        },
        Some(row),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, d).unwrap()
    }

    fn row(period_start: NaiveDate, count: u32, limit: Limit) -> UsageCounter {
        UsageCounter {
            user_id: UserId::generate(),
            feature: Feature::Stories,
            period_start,
            count,
            limit_snapshot: limit,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn first_increment_creates_row() {
        let user = UserId::generate();
        let (outcome, written) =
            apply_increment(None, user, Feature::Stories, day(10), Limit::Finite(3), Utc::now());
        assert!(outcome.allowed);
        assert_eq!(outcome.count, 1);
        let written = written.unwrap();
        assert_eq!(written.period_start, day(10));
        assert_eq!(written.limit_snapshot, Limit::Finite(3));
    }

    #[test]
    fn at_limit_is_rejected_without_write() {
        let existing = row(day(10), 3, Limit::Finite(3));
        let (outcome, written) = apply_increment(
            Some(&existing),
            existing.user_id,
            Feature::Stories,
            day(10),
            Limit::Finite(3),
            Utc::now(),
        );
        assert!(!outcome.allowed);
        assert_eq!(outcome.count, 3);
        assert!(written.is_none());
    }

    #[test]
    fn yesterday_at_limit_rolls_over() {
        let existing = row(day(9), 5, Limit::Finite(5));
        let (outcome, written) = apply_increment(
            Some(&existing),
            existing.user_id,
            Feature::Stories,
            day(10),
            Limit::Finite(5),
            Utc::now(),
        );
        assert!(outcome.allowed);
        assert_eq!(outcome.count, 1);
        assert_eq!(written.unwrap().period_start, day(10));
    }

    #[test]
    fn zero_limit_never_allows() {
        let (outcome, written) = apply_increment(
            None,
            UserId::generate(),
            Feature::Stories,
            day(10),
            Limit::Finite(0),
            Utc::now(),
        );
        assert!(!outcome.allowed);
        assert_eq!(outcome.count, 0);
        assert!(written.is_none());
    }

    #[test]
    fn snapshot_of_missing_row_is_zero() {
        let resets = Utc::now();
        let snap = UsageSnapshot::from_row(None, Feature::Messages, Limit::Finite(20), day(10), resets);
        assert_eq!(snap.count, 0);
        assert_eq!(snap.remaining, Limit::Finite(20));
        assert!(snap.has_room());
    }

    #[test]
    fn snapshot_of_stale_row_is_zero() {
        let stale = row(day(1), 7, Limit::Finite(10));
        let snap = UsageSnapshot::from_row(Some(&stale), Feature::Stories, Limit::Finite(10), day(2), Utc::now());
        assert_eq!(snap.count, 0);
    }

    #[test]
    fn later_stamped_row_keeps_its_count() {
        let ahead = row(day(11), 2, Limit::Finite(3));
        assert_eq!(ahead.count_in(day(10)), 2);
    }
}
