//! Engine configuration.

use std::time::Duration;

use z_ledger_core::{Calendar, DEFAULT_MAX_BOOST_HOURS, DEFAULT_MIN_BOOST_CREDITS};

/// Default capacity of the domain event channel.
pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

/// Default retention for usage counter rows.
pub const DEFAULT_COUNTER_RETENTION_DAYS: u32 = 35;

/// Knobs for the engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Smallest credit offer accepted for a boost.
    pub min_boost_credits: i64,

    /// Longest boost, in hours.
    pub max_boost_hours: u32,

    /// Calendar every counter period is computed in.
    pub calendar: Calendar,

    /// How long one subject lock may be waited on.
    pub subject_lock_timeout: Duration,

    /// Buffered events per subscriber before it lags.
    pub event_capacity: usize,

    /// Counter rows older than this many days are pruned.
    pub counter_retention_days: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_boost_credits: DEFAULT_MIN_BOOST_CREDITS,
            max_boost_hours: DEFAULT_MAX_BOOST_HOURS,
            calendar: Calendar::utc(),
            subject_lock_timeout: z_ledger_store::DEFAULT_LOCK_TIMEOUT,
            event_capacity: DEFAULT_EVENT_CAPACITY,
            counter_retention_days: DEFAULT_COUNTER_RETENTION_DAYS,
        }
    }
}
