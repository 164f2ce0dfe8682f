//! Canonical time for z-ledger.
//!
//! Every period computation (counter rollover, `resets_at`, pruning) goes through
//! one [`Calendar`] with a single fixed UTC offset. Boost expiry compares UTC
//! instants and does not use calendar days at all.

use chrono::{
    DateTime, Datelike, Duration, FixedOffset, Months, NaiveDate, NaiveTime, Offset, TimeZone, Utc,
};
use parking_lot::Mutex;

use crate::error::{LedgerError, Result};
use crate::plan::Period;

/// Source of the current instant.
pub trait Clock: Send + Sync {
    /// The current instant.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    /// Create a clock frozen at `at`.
    #[must_use]
    pub fn new(at: DateTime<Utc>) -> Self {
        Self { now: Mutex::new(at) }
    }

    /// Jump to `at`.
    pub fn set(&self, at: DateTime<Utc>) {
        *self.now.lock() = at;
    }

    /// Move forward by `by`.
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock();
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

/// The one calendar all day/month boundaries are computed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Calendar {
    offset: FixedOffset,
}

impl Calendar {
    /// Calendar days in UTC.
    #[must_use]
    pub fn utc() -> Self {
        Self {
            offset: Utc.fix(),
        }
    }

    /// Calendar days at a fixed offset from UTC, in minutes (east positive).
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Configuration` if the offset is a day or more.
    pub fn with_offset_minutes(minutes: i32) -> Result<Self> {
        minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .map(|offset| Self { offset })
            .ok_or_else(|| LedgerError::Configuration(format!("invalid day offset: {minutes} minutes")))
    }

    /// The configured offset.
    #[must_use]
    pub const fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// Calendar day containing `at`.
    #[must_use]
    pub fn day_of(&self, at: DateTime<Utc>) -> NaiveDate {
        at.with_timezone(&self.offset).date_naive()
    }

    /// First day of the period containing `at`.
    #[must_use]
    pub fn period_start(&self, period: Period, at: DateTime<Utc>) -> NaiveDate {
        let day = self.day_of(at);
        match period {
            Period::Day => day,
            Period::Month => day - Duration::days(i64::from(day.day0())),
        }
    }

    /// First day of the period after the one starting at `start`.
    #[must_use]
    pub fn next_period_start(&self, period: Period, start: NaiveDate) -> NaiveDate {
        match period {
            Period::Day => start.succ_opt().unwrap_or(NaiveDate::MAX),
            Period::Month => start
                .checked_add_months(Months::new(1))
                .unwrap_or(NaiveDate::MAX),
        }
    }

    /// Instant the period containing `at` ends and counters roll over.
    #[must_use]
    pub fn resets_at(&self, period: Period, at: DateTime<Utc>) -> DateTime<Utc> {
        let next = self.next_period_start(period, self.period_start(period, at));
        self.start_of(next)
    }

    /// Local midnight of `day`, as a UTC instant.
    #[must_use]
    pub fn start_of(&self, day: NaiveDate) -> DateTime<Utc> {
        let local_midnight = day.and_time(NaiveTime::MIN);
        let utc = local_midnight - Duration::seconds(i64::from(self.offset.local_minus_utc()));
        Utc.from_utc_datetime(&utc)
    }
}

impl Default for Calendar {
    fn default() -> Self {
        Self::utc()
    }
}
