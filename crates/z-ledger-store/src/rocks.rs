//! `RocksDB` storage implementation.
//!
//! This module provides the `RocksStore` implementation of the `Store` trait.
//! Row locks come from [`KeyedLocks`]; each unit's writes go out in one
//! `WriteBatch`. Reconciliation reads from a `RocksDB` snapshot.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, DBWithThreadMode, Direction, IteratorMode,
    MultiThreaded, Options, WriteBatch,
};
use z_ledger_core::{
    apply_increment, Boost, BoostId, BoostSubject, CreditAccount, CreditTransaction, Feature,
    IncrementOutcome, LedgerEntry, Limit, TransactionId, UsageCounter, UserId,
};

use crate::error::{Result, StoreError};
use crate::keys;
use crate::locks::{KeyedLocks, LockKey, DEFAULT_LOCK_TIMEOUT, DEFAULT_STRIPES};
use crate::schema::{all_column_families, cf};
use crate::Store;

/// RocksDB-backed storage implementation.
pub struct RocksStore {
    db: Arc<DBWithThreadMode<MultiThreaded>>,
    locks: KeyedLocks,
}

impl RocksStore {
    /// Open or create a `RocksDB` database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or created.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_lock_timeout(path, DEFAULT_LOCK_TIMEOUT)
    }

    /// Open or create a database whose units give up after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or created.
    pub fn open_with_lock_timeout<P: AsRef<Path>>(path: P, timeout: Duration) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_descriptors: Vec<_> = all_column_families()
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect();

        let db = DBWithThreadMode::open_cf_descriptors(&opts, path, cf_descriptors)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(Self {
            db: Arc::new(db),
            locks: KeyedLocks::new(DEFAULT_STRIPES, timeout),
        })
    }

    /// Get a column family handle.
    fn cf(&self, name: &str) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StoreError::Database(format!("column family not found: {name}")))
    }

    /// Serialize a value using CBOR.
    fn serialize<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(value, &mut buf)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(buf)
    }

    /// Deserialize a value from CBOR.
    fn deserialize<T: serde::de::DeserializeOwned>(data: &[u8]) -> Result<T> {
        ciborium::from_reader(data).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    /// Read and decode one value.
    fn get_value<T: serde::de::DeserializeOwned>(&self, name: &str, key: &[u8]) -> Result<Option<T>> {
        let cf = self.cf(name)?;
        self.db
            .get_cf(&cf, key)
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    /// Follow an index value (16-byte ULID) to its record.
    fn get_boost_via(&self, index: &str, key: &[u8]) -> Result<Option<Boost>> {
        let cf_index = self.cf(index)?;
        let Some(value) = self
            .db
            .get_cf(&cf_index, key)
            .map_err(|e| StoreError::Database(e.to_string()))?
        else {
            return Ok(None);
        };
        let bytes = keys::decode_ulid_bytes(&value)
            .ok_or_else(|| StoreError::Serialization(format!("bad boost id in {index}")))?;
        self.get_value(cf::BOOSTS, &keys::boost_key(&BoostId::from_bytes(bytes)))
    }

    fn write(&self, batch: WriteBatch) -> Result<()> {
        self.db
            .write(batch)
            .map_err(|e| StoreError::Database(e.to_string()))
    }
}

impl Store for RocksStore {
    // =========================================================================
    // Account Operations
    // =========================================================================

    fn ensure_account(&self, user_id: &UserId, now: DateTime<Utc>) -> Result<CreditAccount> {
        let _guard = self.locks.lock(&LockKey::Account(*user_id))?;

        if let Some(account) = self.get_account(user_id)? {
            return Ok(account);
        }

        let account = CreditAccount::new(*user_id, now);
        let cf = self.cf(cf::ACCOUNTS)?;
        self.db
            .put_cf(&cf, keys::account_key(user_id), Self::serialize(&account)?)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        tracing::debug!(user_id = %user_id, "created credit account");
        Ok(account)
    }

    fn get_account(&self, user_id: &UserId) -> Result<Option<CreditAccount>> {
        self.get_value(cf::ACCOUNTS, &keys::account_key(user_id))
    }

    // =========================================================================
    // Ledger Operations
    // =========================================================================

    fn commit_entries(
        &self,
        entries: Vec<LedgerEntry>,
        idempotency_key: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Vec<CreditTransaction>> {
        if entries.is_empty() {
            return Ok(Vec::new());
        }

        let mut lock_keys: Vec<LockKey> =
            entries.iter().map(|e| LockKey::Account(e.user_id)).collect();
        if let Some(key) = idempotency_key {
            lock_keys.push(LockKey::Event(key.to_string()));
        }
        let _guard = self.locks.lock_all(&lock_keys)?;

        if let Some(key) = idempotency_key {
            if self.has_processed_event(key)? {
                return Err(StoreError::DuplicateEvent {
                    event_id: key.to_string(),
                });
            }
        }

        // Price every entry before writing anything.
        let mut accounts: HashMap<UserId, CreditAccount> = HashMap::new();
        let mut committed: Vec<(u64, CreditTransaction)> = Vec::with_capacity(entries.len());
        for entry in entries {
            let account = match accounts.entry(entry.user_id) {
                Entry::Occupied(slot) => slot.into_mut(),
                Entry::Vacant(slot) => {
                    let loaded = self
                        .get_account(&entry.user_id)?
                        .unwrap_or_else(|| CreditAccount::new(entry.user_id, now));
                    slot.insert(loaded)
                }
            };
            let seq = account.transaction_count;
            let tx = account.apply(entry, now).map_err(StoreError::from_rule)?;
            committed.push((seq, tx));
        }

        let cf_accounts = self.cf(cf::ACCOUNTS)?;
        let cf_tx = self.cf(cf::TRANSACTIONS)?;
        let cf_tx_by_user = self.cf(cf::TRANSACTIONS_BY_USER)?;
        let cf_events = self.cf(cf::PROCESSED_EVENTS)?;

        let mut batch = WriteBatch::default();
        for (user_id, account) in &accounts {
            batch.put_cf(&cf_accounts, keys::account_key(user_id), Self::serialize(account)?);
        }
        for (seq, tx) in &committed {
            batch.put_cf(&cf_tx, keys::transaction_key(&tx.id), Self::serialize(tx)?);
            batch.put_cf(
                &cf_tx_by_user,
                keys::user_transaction_key(&tx.user_id, *seq),
                tx.id.to_bytes(),
            );
        }
        if let (Some(key), Some((_, first))) = (idempotency_key, committed.first()) {
            batch.put_cf(&cf_events, keys::event_key(key), first.id.to_bytes());
        }
        self.write(batch)?;

        Ok(committed.into_iter().map(|(_, tx)| tx).collect())
    }

    fn get_transaction(&self, transaction_id: &TransactionId) -> Result<Option<CreditTransaction>> {
        self.get_value(cf::TRANSACTIONS, &keys::transaction_key(transaction_id))
    }

    fn list_transactions_by_user(
        &self,
        user_id: &UserId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<CreditTransaction>> {
        let cf_by_user = self.cf(cf::TRANSACTIONS_BY_USER)?;
        let prefix = keys::user_transactions_prefix(user_id);
        let upper = keys::user_transaction_key(user_id, u64::MAX);

        let mut transactions = Vec::new();
        let mut skipped = 0;

        // Walk backwards from the highest sequence: newest first.
        let iter = self
            .db
            .iterator_cf(&cf_by_user, IteratorMode::From(&upper, Direction::Reverse));

        for item in iter {
            let (key, value) = item.map_err(|e| StoreError::Database(e.to_string()))?;

            if !key.starts_with(&prefix) || transactions.len() >= limit {
                break;
            }

            if skipped < offset {
                skipped += 1;
                continue;
            }

            let bytes = keys::decode_ulid_bytes(&value)
                .ok_or_else(|| StoreError::Serialization("bad transaction id in index".into()))?;
            if let Some(tx) = self.get_transaction(&TransactionId::from_bytes(bytes))? {
                transactions.push(tx);
            }
        }

        Ok(transactions)
    }

    fn ledger_snapshot(
        &self,
        user_id: &UserId,
    ) -> Result<Option<(CreditAccount, Vec<CreditTransaction>)>> {
        let cf_accounts = self.cf(cf::ACCOUNTS)?;
        let cf_tx = self.cf(cf::TRANSACTIONS)?;
        let cf_by_user = self.cf(cf::TRANSACTIONS_BY_USER)?;

        let snapshot = self.db.snapshot();

        let Some(raw) = snapshot
            .get_cf(&cf_accounts, keys::account_key(user_id))
            .map_err(|e| StoreError::Database(e.to_string()))?
        else {
            return Ok(None);
        };
        let account: CreditAccount = Self::deserialize(&raw)?;

        let prefix = keys::user_transactions_prefix(user_id);
        let mut ledger = Vec::new();
        for item in snapshot.iterator_cf(&cf_by_user, IteratorMode::From(&prefix, Direction::Forward)) {
            let (key, value) = item.map_err(|e| StoreError::Database(e.to_string()))?;
            if !key.starts_with(&prefix) {
                break;
            }

            let raw = snapshot
                .get_cf(&cf_tx, &value)
                .map_err(|e| StoreError::Database(e.to_string()))?
                .ok_or_else(|| StoreError::NotFound {
                    entity: "transaction",
                    id: keys::decode_ulid_bytes(&value)
                        .map(|b| TransactionId::from_bytes(b).to_string())
                        .unwrap_or_default(),
                })?;
            ledger.push(Self::deserialize(&raw)?);
        }

        Ok(Some((account, ledger)))
    }

    fn has_processed_event(&self, event_id: &str) -> Result<bool> {
        let cf = self.cf(cf::PROCESSED_EVENTS)?;
        let exists = self
            .db
            .get_cf(&cf, keys::event_key(event_id))
            .map_err(|e| StoreError::Database(e.to_string()))?
            .is_some();
        Ok(exists)
    }

    // =========================================================================
    // Usage Counter Operations
    // =========================================================================

    fn get_counter(&self, user_id: &UserId, feature: Feature) -> Result<Option<UsageCounter>> {
        self.get_value(cf::COUNTERS, &keys::counter_key(user_id, feature))
    }

    fn increment_counter(
        &self,
        user_id: &UserId,
        feature: Feature,
        period_start: NaiveDate,
        limit: Limit,
        now: DateTime<Utc>,
    ) -> Result<IncrementOutcome> {
        let _guard = self.locks.lock(&LockKey::Counter(*user_id, feature))?;

        let existing = self.get_counter(user_id, feature)?;
        let (outcome, row) =
            apply_increment(existing.as_ref(), *user_id, feature, period_start, limit, now);

        if let Some(row) = row {
            let cf = self.cf(cf::COUNTERS)?;
            self.db
                .put_cf(&cf, keys::counter_key(user_id, feature), Self::serialize(&row)?)
                .map_err(|e| StoreError::Database(e.to_string()))?;
        }

        Ok(outcome)
    }

    fn prune_counters(&self, before: NaiveDate) -> Result<usize> {
        let cf = self.cf(cf::COUNTERS)?;

        let mut stale = Vec::new();
        for item in self.db.iterator_cf(&cf, IteratorMode::Start) {
            let (_, value) = item.map_err(|e| StoreError::Database(e.to_string()))?;
            let row: UsageCounter = Self::deserialize(&value)?;
            if row.period_start < before {
                stale.push((row.user_id, row.feature));
            }
        }

        let mut removed = 0;
        for (user_id, feature) in stale {
            let _guard = self.locks.lock(&LockKey::Counter(user_id, feature))?;
            // An increment may have landed since the scan.
            let still_stale = self
                .get_counter(&user_id, feature)?
                .is_some_and(|row| row.period_start < before);
            if still_stale {
                self.db
                    .delete_cf(&cf, keys::counter_key(&user_id, feature))
                    .map_err(|e| StoreError::Database(e.to_string()))?;
                removed += 1;
            }
        }

        Ok(removed)
    }

    // =========================================================================
    // Boost Operations
    // =========================================================================

    fn get_active_boost(
        &self,
        subject: &BoostSubject,
        now: DateTime<Utc>,
    ) -> Result<Option<Boost>> {
        Ok(self
            .get_boost_via(cf::BOOSTS_BY_SUBJECT, &keys::subject_key(subject))?
            .filter(|boost| boost.is_live(now)))
    }

    fn insert_boost(&self, boost: &Boost, now: DateTime<Utc>) -> Result<Boost> {
        let _guard = self.locks.lock(&LockKey::Subject(boost.subject))?;

        let tx_key = keys::transaction_key(&boost.transaction_id);
        if let Some(existing) = self.get_boost_via(cf::BOOSTS_BY_TRANSACTION, &tx_key)? {
            return Ok(existing);
        }

        if self.get_active_boost(&boost.subject, now)?.is_some() {
            return Err(StoreError::AlreadyBoosted {
                subject: boost.subject.to_string(),
            });
        }

        let cf_boosts = self.cf(cf::BOOSTS)?;
        let cf_by_subject = self.cf(cf::BOOSTS_BY_SUBJECT)?;
        let cf_by_tx = self.cf(cf::BOOSTS_BY_TRANSACTION)?;

        let mut batch = WriteBatch::default();
        batch.put_cf(&cf_boosts, keys::boost_key(&boost.id), Self::serialize(boost)?);
        batch.put_cf(&cf_by_subject, keys::subject_key(&boost.subject), boost.id.to_bytes());
        batch.put_cf(&cf_by_tx, tx_key, boost.id.to_bytes());
        self.write(batch)?;

        Ok(boost.clone())
    }

    fn get_boost_by_transaction(&self, transaction_id: &TransactionId) -> Result<Option<Boost>> {
        self.get_boost_via(
            cf::BOOSTS_BY_TRANSACTION,
            &keys::transaction_key(transaction_id),
        )
    }

    fn deactivate_expired_boosts(&self, now: DateTime<Utc>) -> Result<usize> {
        let cf = self.cf(cf::BOOSTS)?;

        let mut expired = Vec::new();
        for item in self.db.iterator_cf(&cf, IteratorMode::Start) {
            let (_, value) = item.map_err(|e| StoreError::Database(e.to_string()))?;
            let boost: Boost = Self::deserialize(&value)?;
            if boost.is_active && now > boost.expires_at {
                expired.push(boost);
            }
        }

        let mut changed = 0;
        for mut boost in expired {
            let _guard = self.locks.lock(&LockKey::Subject(boost.subject))?;
            boost.is_active = false;
            self.db
                .put_cf(&cf, keys::boost_key(&boost.id), Self::serialize(&boost)?)
                .map_err(|e| StoreError::Database(e.to_string()))?;
            changed += 1;
        }

        Ok(changed)
    }
}
