//! In-memory storage implementation.
//!
//! Tables live behind one `RwLock`. Units lock their rows through
//! [`KeyedLocks`], price everything under a read section, then apply all
//! writes in a single write section, so readers never see a ledger row
//! without its balance.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::RwLock;
use z_ledger_core::{
    apply_increment, Boost, BoostId, BoostSubject, CreditAccount, CreditTransaction, Feature,
    IncrementOutcome, LedgerEntry, Limit, TransactionId, UsageCounter, UserId,
};

use crate::error::{Result, StoreError};
use crate::locks::{KeyedLocks, LockKey, DEFAULT_LOCK_TIMEOUT, DEFAULT_STRIPES};
use crate::Store;

#[derive(Default)]
struct Tables {
    accounts: HashMap<UserId, CreditAccount>,
    transactions: HashMap<TransactionId, CreditTransaction>,
    // Commit order per user.
    transactions_by_user: HashMap<UserId, Vec<TransactionId>>,
    counters: HashMap<(UserId, Feature), UsageCounter>,
    boosts: HashMap<BoostId, Boost>,
    boosts_by_subject: HashMap<BoostSubject, BoostId>,
    boosts_by_transaction: HashMap<TransactionId, BoostId>,
    processed_events: HashMap<String, TransactionId>,
}

/// In-memory storage. Contents are lost when dropped.
pub struct MemoryStore {
    tables: RwLock<Tables>,
    locks: KeyedLocks,
}

impl MemoryStore {
    /// Create an empty store with the default lock timeout.
    #[must_use]
    pub fn new() -> Self {
        Self::with_lock_timeout(DEFAULT_LOCK_TIMEOUT)
    }

    /// Create an empty store whose units give up after `timeout`.
    #[must_use]
    pub fn with_lock_timeout(timeout: Duration) -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            locks: KeyedLocks::new(DEFAULT_STRIPES, timeout),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Store for MemoryStore {
    // =========================================================================
    // Account Operations
    // =========================================================================

    fn ensure_account(&self, user_id: &UserId, now: DateTime<Utc>) -> Result<CreditAccount> {
        let _guard = self.locks.lock(&LockKey::Account(*user_id))?;
        let mut tables = self.tables.write();
        let account = tables
            .accounts
            .entry(*user_id)
            .or_insert_with(|| {
                tracing::debug!(user_id = %user_id, "creating credit account");
                CreditAccount::new(*user_id, now)
            })
            .clone();
        Ok(account)
    }

    fn get_account(&self, user_id: &UserId) -> Result<Option<CreditAccount>> {
        Ok(self.tables.read().accounts.get(user_id).cloned())
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

        let mut keys: Vec<LockKey> = entries.iter().map(|e| LockKey::Account(e.user_id)).collect();
        if let Some(key) = idempotency_key {
            keys.push(LockKey::Event(key.to_string()));
        }
        let _guard = self.locks.lock_all(&keys)?;

        let (accounts, committed) = {
            let tables = self.tables.read();

            if let Some(key) = idempotency_key {
                if tables.processed_events.contains_key(key) {
                    return Err(StoreError::DuplicateEvent {
                        event_id: key.to_string(),
                    });
                }
            }

            let mut accounts: HashMap<UserId, CreditAccount> = HashMap::new();
            let mut committed = Vec::with_capacity(entries.len());
            for entry in entries {
                let account = accounts.entry(entry.user_id).or_insert_with(|| {
                    tables
                        .accounts
                        .get(&entry.user_id)
                        .cloned()
                        .unwrap_or_else(|| CreditAccount::new(entry.user_id, now))
                });
                committed.push(account.apply(entry, now).map_err(StoreError::from_rule)?);
            }
            (accounts, committed)
        };

        let mut tables = self.tables.write();
        tables.accounts.extend(accounts);
        for tx in &committed {
            tables
                .transactions_by_user
                .entry(tx.user_id)
                .or_default()
                .push(tx.id);
            tables.transactions.insert(tx.id, tx.clone());
        }
        if let (Some(key), Some(first)) = (idempotency_key, committed.first()) {
            tables.processed_events.insert(key.to_string(), first.id);
        }

        Ok(committed)
    }

    fn get_transaction(&self, transaction_id: &TransactionId) -> Result<Option<CreditTransaction>> {
        Ok(self.tables.read().transactions.get(transaction_id).cloned())
    }

    fn list_transactions_by_user(
        &self,
        user_id: &UserId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<CreditTransaction>> {
        let tables = self.tables.read();
        let Some(ids) = tables.transactions_by_user.get(user_id) else {
            return Ok(Vec::new());
        };

        Ok(ids
            .iter()
            .rev()
            .skip(offset)
            .take(limit)
            .filter_map(|id| tables.transactions.get(id).cloned())
            .collect())
    }

    fn ledger_snapshot(
        &self,
        user_id: &UserId,
    ) -> Result<Option<(CreditAccount, Vec<CreditTransaction>)>> {
        let tables = self.tables.read();
        let Some(account) = tables.accounts.get(user_id).cloned() else {
            return Ok(None);
        };

        let ledger: Vec<CreditTransaction> = tables
            .transactions_by_user
            .get(user_id)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| tables.transactions.get(id).cloned())
                    .collect()
            })
            .unwrap_or_default();

        Ok(Some((account, ledger)))
    }

    fn has_processed_event(&self, event_id: &str) -> Result<bool> {
        Ok(self.tables.read().processed_events.contains_key(event_id))
    }

    // =========================================================================
    // Usage Counter Operations
    // =========================================================================

    fn get_counter(&self, user_id: &UserId, feature: Feature) -> Result<Option<UsageCounter>> {
        Ok(self.tables.read().counters.get(&(*user_id, feature)).cloned())
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

        let existing = self.tables.read().counters.get(&(*user_id, feature)).cloned();
        let (outcome, row) =
            apply_increment(existing.as_ref(), *user_id, feature, period_start, limit, now);

        if let Some(row) = row {
            self.tables.write().counters.insert((*user_id, feature), row);
        }

        Ok(outcome)
    }

    fn prune_counters(&self, before: NaiveDate) -> Result<usize> {
        let mut tables = self.tables.write();
        let len = tables.counters.len();
        tables.counters.retain(|_, row| row.period_start >= before);
        Ok(len - tables.counters.len())
    }

    // =========================================================================
    // Boost Operations
    // =========================================================================

    fn get_active_boost(
        &self,
        subject: &BoostSubject,
        now: DateTime<Utc>,
    ) -> Result<Option<Boost>> {
        let tables = self.tables.read();
        Ok(tables
            .boosts_by_subject
            .get(subject)
            .and_then(|id| tables.boosts.get(id))
            .filter(|boost| boost.is_live(now))
            .cloned())
    }

    fn insert_boost(&self, boost: &Boost, now: DateTime<Utc>) -> Result<Boost> {
        let mut guard = self.tables.write();
        let tables = &mut *guard;

        if let Some(existing) = tables
            .boosts_by_transaction
            .get(&boost.transaction_id)
            .and_then(|id| tables.boosts.get(id))
        {
            return Ok(existing.clone());
        }

        let live = tables
            .boosts_by_subject
            .get(&boost.subject)
            .and_then(|id| tables.boosts.get(id))
            .is_some_and(|current| current.is_live(now));
        if live {
            return Err(StoreError::AlreadyBoosted {
                subject: boost.subject.to_string(),
            });
        }

        tables.boosts.insert(boost.id, boost.clone());
        tables.boosts_by_subject.insert(boost.subject, boost.id);
        tables
            .boosts_by_transaction
            .insert(boost.transaction_id, boost.id);

        Ok(boost.clone())
    }

    fn get_boost_by_transaction(&self, transaction_id: &TransactionId) -> Result<Option<Boost>> {
        let tables = self.tables.read();
        Ok(tables
            .boosts_by_transaction
            .get(transaction_id)
            .and_then(|id| tables.boosts.get(id))
            .cloned())
    }

    fn deactivate_expired_boosts(&self, now: DateTime<Utc>) -> Result<usize> {
        let mut tables = self.tables.write();
        let mut changed = 0;
        for boost in tables.boosts.values_mut() {
            if boost.is_active && now > boost.expires_at {
                boost.is_active = false;
                changed += 1;
            }
        }
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use z_ledger_core::{
        reconcile, BoostRequest, Reference, ReferenceType, StoryId, TransactionType,
    };

    fn purchase(user_id: UserId, credits: i64) -> LedgerEntry {
        LedgerEntry::purchase(user_id, credits, Reference::new(ReferenceType::Purchase, "test")).unwrap()
    }

    fn spend(user_id: UserId, credits: i64) -> LedgerEntry {
        LedgerEntry::spend(
            user_id,
            credits,
            Reference::new(ReferenceType::Custom("unlock".into()), "x"),
        )
        .unwrap()
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, d).unwrap()
    }

    #[test]
    fn ensure_account_is_idempotent() {
        let store = MemoryStore::new();
        let user_id = UserId::generate();
        let first = store.ensure_account(&user_id, Utc::now()).unwrap();
        let second = store.ensure_account(&user_id, Utc::now()).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.balance, 0);
    }

    #[test]
    fn commit_creates_account_on_first_touch() {
        let store = MemoryStore::new();
        let user_id = UserId::generate();
        let rows = store
            .commit_entries(vec![purchase(user_id, 100)], None, Utc::now())
            .unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].balance_before, 0);
        assert_eq!(rows[0].balance_after, 100);
        assert_eq!(store.get_account(&user_id).unwrap().unwrap().balance, 100);
    }

    #[test]
    fn overdraft_writes_nothing() {
        let store = MemoryStore::new();
        let user_id = UserId::generate();
        store
            .commit_entries(vec![purchase(user_id, 10)], None, Utc::now())
            .unwrap();

        let result = store.commit_entries(vec![spend(user_id, 50)], None, Utc::now());
        assert!(matches!(
            result,
            Err(StoreError::InsufficientCredits {
                balance: 10,
                required: 50
            })
        ));
        assert_eq!(store.get_account(&user_id).unwrap().unwrap().balance, 10);
        assert_eq!(store.list_transactions_by_user(&user_id, 10, 0).unwrap().len(), 1);
    }

    #[test]
    fn failing_second_leg_rolls_back_first() {
        let store = MemoryStore::new();
        let sender = UserId::generate();
        let recipient = UserId::generate();
        store
            .commit_entries(vec![purchase(sender, 100)], None, Utc::now())
            .unwrap();

        // Credit the recipient, then overdraw the sender in the same unit.
        let result = store.commit_entries(
            vec![purchase(recipient, 5), spend(sender, 500)],
            None,
            Utc::now(),
        );
        assert!(result.is_err());
        assert!(store.get_account(&recipient).unwrap().is_none());
        assert_eq!(store.get_account(&sender).unwrap().unwrap().balance, 100);
    }

    #[test]
    fn idempotency_key_blocks_replay() {
        let store = MemoryStore::new();
        let user_id = UserId::generate();
        store
            .commit_entries(vec![purchase(user_id, 100)], Some("evt_1"), Utc::now())
            .unwrap();

        let replay = store.commit_entries(vec![purchase(user_id, 100)], Some("evt_1"), Utc::now());
        assert!(matches!(replay, Err(StoreError::DuplicateEvent { .. })));
        assert!(store.has_processed_event("evt_1").unwrap());
        assert_eq!(store.get_account(&user_id).unwrap().unwrap().balance, 100);
    }

    #[test]
    fn transactions_list_newest_first() {
        let store = MemoryStore::new();
        let user_id = UserId::generate();
        store
            .commit_entries(vec![purchase(user_id, 100)], None, Utc::now())
            .unwrap();
        store
            .commit_entries(vec![spend(user_id, 30)], None, Utc::now())
            .unwrap();
        store
            .commit_entries(vec![spend(user_id, 20)], None, Utc::now())
            .unwrap();

        let all = store.list_transactions_by_user(&user_id, 10, 0).unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].balance_after, 50);
        assert_eq!(all[2].transaction_type, TransactionType::Purchase);

        let page = store.list_transactions_by_user(&user_id, 1, 1).unwrap();
        assert_eq!(page[0].balance_after, 70);
    }

    #[test]
    fn snapshot_reconciles() {
        let store = MemoryStore::new();
        let user_id = UserId::generate();
        for entry in [purchase(user_id, 100), spend(user_id, 40), spend(user_id, 10)] {
            store.commit_entries(vec![entry], None, Utc::now()).unwrap();
        }

        let (account, ledger) = store.ledger_snapshot(&user_id).unwrap().unwrap();
        let totals = reconcile(&account, &ledger).unwrap();
        assert_eq!(totals.closing_balance, 50);
        assert!(store.ledger_snapshot(&UserId::generate()).unwrap().is_none());
    }

    #[test]
    fn counter_rolls_over_and_caps() {
        let store = MemoryStore::new();
        let user_id = UserId::generate();
        let limit = Limit::Finite(2);

        for expected in [true, true, false] {
            let outcome = store
                .increment_counter(&user_id, Feature::Stories, day(9), limit, Utc::now())
                .unwrap();
            assert_eq!(outcome.allowed, expected);
        }
        assert_eq!(
            store.get_counter(&user_id, Feature::Stories).unwrap().unwrap().count,
            2
        );

        let next_day = store
            .increment_counter(&user_id, Feature::Stories, day(10), limit, Utc::now())
            .unwrap();
        assert!(next_day.allowed);
        assert_eq!(next_day.count, 1);
    }

    #[test]
    fn prune_drops_old_periods_only() {
        let store = MemoryStore::new();
        let old = UserId::generate();
        let fresh = UserId::generate();
        store
            .increment_counter(&old, Feature::Messages, day(1), Limit::Unlimited, Utc::now())
            .unwrap();
        store
            .increment_counter(&fresh, Feature::Messages, day(20), Limit::Unlimited, Utc::now())
            .unwrap();

        assert_eq!(store.prune_counters(day(10)).unwrap(), 1);
        assert!(store.get_counter(&old, Feature::Messages).unwrap().is_none());
        assert!(store.get_counter(&fresh, Feature::Messages).unwrap().is_some());
    }

    fn boost_for(user_id: UserId, subject: BoostSubject, hours: u32) -> Boost {
        let request = BoostRequest {
            subject,
            user_id,
            credits: 20,
            duration_hours: hours,
        };
        let spend = spend(user_id, 20).into_transaction(100, 80, Utc::now());
        Boost::from_spend(&request, &spend).unwrap()
    }

    #[test]
    fn one_live_boost_per_subject() {
        let store = MemoryStore::new();
        let user_id = UserId::generate();
        let subject = BoostSubject::Story(StoryId::generate());
        let first = boost_for(user_id, subject, 1);
        let now = first.created_at;

        store.insert_boost(&first, now).unwrap();
        let second = boost_for(user_id, subject, 1);
        assert!(matches!(
            store.insert_boost(&second, now),
            Err(StoreError::AlreadyBoosted { .. })
        ));

        // Same transaction again is a no-op returning the original.
        assert_eq!(store.insert_boost(&first, now).unwrap().id, first.id);

        // Once expired, a new boost is accepted.
        let later = first.expires_at + ChronoDuration::seconds(1);
        assert!(store.get_active_boost(&subject, later).unwrap().is_none());
        store.insert_boost(&second, later).unwrap();
        assert_eq!(
            store.get_active_boost(&subject, later).unwrap().map(|b| b.id),
            Some(second.id)
        );
    }

    #[test]
    fn sweeper_flips_expired_boosts() {
        let store = MemoryStore::new();
        let boost = boost_for(UserId::generate(), BoostSubject::Profile(UserId::generate()), 2);
        store.insert_boost(&boost, boost.created_at).unwrap();

        assert_eq!(store.deactivate_expired_boosts(boost.created_at).unwrap(), 0);
        let after = boost.expires_at + ChronoDuration::minutes(1);
        assert_eq!(store.deactivate_expired_boosts(after).unwrap(), 1);
        assert!(!store
            .get_boost_by_transaction(&boost.transaction_id)
            .unwrap()
            .unwrap()
            .is_active);
    }

    #[test]
    fn concurrent_spends_never_overdraw() {
        let store = MemoryStore::new();
        let user_id = UserId::generate();
        store
            .commit_entries(vec![purchase(user_id, 100)], None, Utc::now())
            .unwrap();

        let successes = std::thread::scope(|s| {
            let handles: Vec<_> = (0..10)
                .map(|_| s.spawn(|| store.commit_entries(vec![spend(user_id, 30)], None, Utc::now())))
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap())
                .filter(|r| r.is_ok())
                .count()
        });

        assert_eq!(successes, 3);
        let (account, ledger) = store.ledger_snapshot(&user_id).unwrap().unwrap();
        assert_eq!(account.balance, 10);
        reconcile(&account, &ledger).unwrap();
    }
}
