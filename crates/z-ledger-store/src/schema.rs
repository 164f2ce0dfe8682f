//! Database schema definitions and column families.
//!
//! This module defines the column families used in `RocksDB` storage.

/// Column family names for the `RocksDB` database.
pub mod cf {
    /// Credit accounts, keyed by `user_id`.
    pub const ACCOUNTS: &str = "accounts";

    /// Ledger rows, keyed by `transaction_id` (ULID).
    pub const TRANSACTIONS: &str = "transactions";

    /// Index: a user's ledger in commit order, keyed by `user_id || seq`.
    /// Value is the transaction ID.
    pub const TRANSACTIONS_BY_USER: &str = "transactions_by_user";

    /// Usage counters, keyed by `user_id || feature`.
    pub const COUNTERS: &str = "counters";

    /// Boost records, keyed by `boost_id`.
    pub const BOOSTS: &str = "boosts";

    /// Index: latest boost per subject, keyed by `kind || subject_id`.
    /// Value is the boost ID.
    pub const BOOSTS_BY_SUBJECT: &str = "boosts_by_subject";

    /// Index: boost paid for by a transaction, keyed by `transaction_id`.
    /// Value is the boost ID.
    pub const BOOSTS_BY_TRANSACTION: &str = "boosts_by_transaction";

    /// External event IDs already applied, keyed by `event_id`.
    /// Value is the transaction ID it produced.
    pub const PROCESSED_EVENTS: &str = "processed_events";
}

/// Returns all column family names for database initialization.
#[must_use]
pub fn all_column_families() -> Vec<&'static str> {
    vec![
        cf::ACCOUNTS,
        cf::TRANSACTIONS,
        cf::TRANSACTIONS_BY_USER,
        cf::COUNTERS,
        cf::BOOSTS,
        cf::BOOSTS_BY_SUBJECT,
        cf::BOOSTS_BY_TRANSACTION,
        cf::PROCESSED_EVENTS,
    ]
}
