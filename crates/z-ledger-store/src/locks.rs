//! Striped row locks.
//!
//! A key hashes onto one of a fixed number of mutex stripes. Units that touch
//! several keys lock their stripes in ascending index order with duplicates
//! removed, so two units can never wait on each other in a cycle. Every
//! acquisition is bounded by the lock timeout; a unit that cannot get all of
//! its stripes in time gets `StoreError::LockTimeout` and writes nothing.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::time::{Duration, Instant};

use parking_lot::{Mutex, MutexGuard};
use z_ledger_core::{BoostSubject, Feature, UserId};

use crate::error::{Result, StoreError};

/// Default number of stripes.
pub const DEFAULT_STRIPES: usize = 256;

/// Default time to wait for a unit's locks.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(2);

/// A lockable row.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LockKey {
    /// A credit account and its ledger.
    Account(UserId),
    /// One usage counter row.
    Counter(UserId, Feature),
    /// An external event ID used for idempotency.
    Event(String),
    /// A boost subject.
    Subject(BoostSubject),
}

/// Fixed set of mutex stripes addressed by [`LockKey`].
pub struct KeyedLocks {
    stripes: Box<[Mutex<()>]>,
    timeout: Duration,
}

/// Holds every stripe of one unit until dropped.
#[must_use = "locks are released when the guard is dropped"]
pub struct KeyGuard<'a> {
    _guards: Vec<MutexGuard<'a, ()>>,
}

impl KeyedLocks {
    /// Create `stripes` locks that wait at most `timeout`.
    #[must_use]
    pub fn new(stripes: usize, timeout: Duration) -> Self {
        let stripes = (0..stripes.max(1)).map(|_| Mutex::new(())).collect();
        Self { stripes, timeout }
    }

    /// The configured wait bound.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    fn stripe_of(&self, key: &LockKey) -> usize {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        // Truncation is fine: only the stripe index matters.
        #[allow(clippy::cast_possible_truncation)]
        let hash = hasher.finish() as usize;
        hash % self.stripes.len()
    }

    /// Lock a single key.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::LockTimeout` if the stripe stays busy past the timeout.
    pub fn lock(&self, key: &LockKey) -> Result<KeyGuard<'_>> {
        self.lock_all(std::slice::from_ref(key))
    }

    /// Lock every key of a unit.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::LockTimeout` if any stripe stays busy past the
    /// timeout. Stripes already taken are released.
    pub fn lock_all(&self, keys: &[LockKey]) -> Result<KeyGuard<'_>> {
        let mut indices: Vec<usize> = keys.iter().map(|k| self.stripe_of(k)).collect();
        indices.sort_unstable();
        indices.dedup();

        let started = Instant::now();
        let deadline = started + self.timeout;
        let mut guards = Vec::with_capacity(indices.len());

        for index in indices {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.stripes[index].try_lock_for(remaining) {
                Some(guard) => guards.push(guard),
                None => {
                    let waited_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
                    tracing::warn!(stripe = index, waited_ms, "row lock timed out");
                    return Err(StoreError::LockTimeout { waited_ms });
                }
            }
        }

        Ok(KeyGuard { _guards: guards })
    }
}

impl Default for KeyedLocks {
    fn default() -> Self {
        Self::new(DEFAULT_STRIPES, DEFAULT_LOCK_TIMEOUT)
    }
}

impl std::fmt::Debug for KeyedLocks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyedLocks")
            .field("stripes", &self.stripes.len())
            .field("timeout", &self.timeout)
            .finish()
    }
}
