//! Storage layer for z-ledger.
//!
//! This crate persists credit accounts, the append-only ledger, usage counters
//! and boost records. Every mutating operation is one atomic unit:
//!
//! 1. Lock the affected rows ([`KeyedLocks`], bounded by a timeout).
//! 2. Read current state and compute every write with the `z-ledger-core` rules.
//! 3. Apply all writes in one step (one table write section in memory, one
//!    `WriteBatch` in `RocksDB`).
//!
//! A unit that fails at any step writes nothing.
//!
//! # Backends
//!
//! - [`MemoryStore`]: default backend, also used by tests.
//! - `RocksStore` (feature `rocksdb-backend`): column families holding CBOR values.
//!
//! # Example
//!
//! ```
//! use chrono::Utc;
//! use z_ledger_core::{LedgerEntry, Reference, ReferenceType, UserId};
//! use z_ledger_store::{MemoryStore, Store};
//!
//! let store = MemoryStore::new();
//! let user_id = UserId::generate();
//! let entry = LedgerEntry::purchase(
//!     user_id,
//!     500,
//!     Reference::new(ReferenceType::Purchase, "evt_1"),
//! )
//! .unwrap();
//!
//! let rows = store.commit_entries(vec![entry], None, Utc::now()).unwrap();
//! assert_eq!(rows[0].balance_after, 500);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod keys;
pub mod locks;
pub mod memory;
#[cfg(feature = "rocksdb-backend")]
pub mod rocks;
pub mod schema;

pub use error::{Result, StoreError};
pub use locks::{KeyGuard, KeyedLocks, LockKey, DEFAULT_LOCK_TIMEOUT, DEFAULT_STRIPES};
pub use memory::MemoryStore;
#[cfg(feature = "rocksdb-backend")]
pub use rocks::RocksStore;

use chrono::{DateTime, NaiveDate, Utc};
use z_ledger_core::{
    Boost, BoostSubject, CreditAccount, CreditTransaction, Feature, IncrementOutcome, LedgerEntry,
    Limit, TransactionId, UsageCounter, UserId,
};

/// The storage trait defining all database operations.
///
/// This trait abstracts the storage layer, allowing for different implementations
/// (e.g., `RocksDB`, in-memory for testing).
pub trait Store: Send + Sync {
    // =========================================================================
    // Account Operations
    // =========================================================================

    /// Fetch the account, creating a zero-balance one if absent.
    ///
    /// Concurrent first calls for one user create exactly one row and all
    /// observe it.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails or the row lock times out.
    fn ensure_account(&self, user_id: &UserId, now: DateTime<Utc>) -> Result<CreditAccount>;

    /// Get an account by user ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_account(&self, user_id: &UserId) -> Result<Option<CreditAccount>>;

    // =========================================================================
    // Ledger Operations
    // =========================================================================

    /// Apply ledger entries as one atomic unit, creating accounts on first touch.
    ///
    /// Entries are priced in order against the live balances. If `idempotency_key`
    /// is given it is recorded in the same unit. Returns the committed rows in
    /// entry order.
    ///
    /// # Errors
    ///
    /// - `StoreError::InsufficientCredits` if any debit would go below zero.
    /// - `StoreError::DuplicateEvent` if `idempotency_key` was already used.
    /// - `StoreError::InvalidEntry` if an entry breaks a ledger rule.
    /// - `StoreError::LockTimeout` if the rows could not be locked in time.
    fn commit_entries(
        &self,
        entries: Vec<LedgerEntry>,
        idempotency_key: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Vec<CreditTransaction>>;

    /// Get a transaction by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_transaction(&self, transaction_id: &TransactionId) -> Result<Option<CreditTransaction>>;

    /// List transactions for a user, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_transactions_by_user(
        &self,
        user_id: &UserId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<CreditTransaction>>;

    /// The account and its full ledger (oldest first), read from one
    /// consistent view. `None` if the account does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn ledger_snapshot(
        &self,
        user_id: &UserId,
    ) -> Result<Option<(CreditAccount, Vec<CreditTransaction>)>>;

    /// Check if an external event has already been applied.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn has_processed_event(&self, event_id: &str) -> Result<bool>;

    // =========================================================================
    // Usage Counter Operations
    // =========================================================================

    /// Get the stored counter row, whatever period it belongs to.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_counter(&self, user_id: &UserId, feature: Feature) -> Result<Option<UsageCounter>>;

    /// Count one use in the period starting at `period_start` if `limit` allows.
    ///
    /// A row from an earlier period is treated as zero in the same step. A
    /// rejected attempt writes nothing.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails or the row lock times out.
    fn increment_counter(
        &self,
        user_id: &UserId,
        feature: Feature,
        period_start: NaiveDate,
        limit: Limit,
        now: DateTime<Utc>,
    ) -> Result<IncrementOutcome>;

    /// Delete counter rows whose period started before `before`.
    ///
    /// Returns the number of rows removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn prune_counters(&self, before: NaiveDate) -> Result<usize>;

    // =========================================================================
    // Boost Operations
    // =========================================================================

    /// The subject's boost if it is live at `now`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_active_boost(&self, subject: &BoostSubject, now: DateTime<Utc>)
        -> Result<Option<Boost>>;

    /// Record a boost.
    ///
    /// If a boost already references the same transaction, that record is
    /// returned unchanged.
    ///
    /// # Errors
    ///
    /// - `StoreError::AlreadyBoosted` if another boost on the subject is live at `now`.
    /// - `StoreError::LockTimeout` if the subject could not be locked in time.
    fn insert_boost(&self, boost: &Boost, now: DateTime<Utc>) -> Result<Boost>;

    /// Find the boost paid for by a transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_boost_by_transaction(&self, transaction_id: &TransactionId) -> Result<Option<Boost>>;

    /// Clear `is_active` on every boost that expired before `now`.
    ///
    /// Returns the number of records changed.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn deactivate_expired_boosts(&self, now: DateTime<Utc>) -> Result<usize>;
}
