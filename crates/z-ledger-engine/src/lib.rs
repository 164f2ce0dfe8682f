//! Entitlement and credit engine for z-ledger.
//!
//! [`Engine`] is the only component that mutates credit accounts and usage
//! counters. It wraps an injected [`Store`] handle and exposes:
//!
//! - **Usage**: `peek`, `increment`, `consume`, `prune_counters`
//! - **Entitlements**: `can_use`, `can_message`, `capability`
//! - **Ledger**: `ensure_account`, `apply_transaction`, `spend`, `purchase`,
//!   `grant_bonus`, `refund`, `verify_account`
//! - **Paid actions**: `boost`, `retry_boost_record`, `gift_seal`
//!
//! Committed mutations publish [`DomainEvent`](z_ledger_core::DomainEvent)s on
//! the [`EventBus`]. Nothing downstream of the bus can roll back a commit.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use z_ledger_core::{AccountFacts, Feature, PlanCatalog, PlanTier, UserId};
//! use z_ledger_engine::{Engine, EngineConfig};
//! use z_ledger_store::MemoryStore;
//!
//! let engine = Engine::new(
//!     Arc::new(MemoryStore::new()),
//!     PlanCatalog::default(),
//!     EngineConfig::default(),
//! );
//!
//! let facts = AccountFacts {
//!     user_id: UserId::generate(),
//!     tier: PlanTier::Gold,
//!     verified: false,
//! };
//! assert!(engine.can_use(&facts, Feature::Stories).unwrap().allowed);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod boosts;
pub mod config;
pub mod entitlements;
pub mod events;
pub mod gifts;
pub mod ledger;
pub mod usage;

pub use boosts::BoostReceipt;
pub use config::{EngineConfig, DEFAULT_COUNTER_RETENTION_DAYS, DEFAULT_EVENT_CAPACITY};
pub use events::EventBus;
pub use gifts::GiftReceipt;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use z_ledger_core::{Clock, PlanCatalog, SystemClock};
use z_ledger_store::{KeyedLocks, Store, DEFAULT_STRIPES};

/// The entitlement and credit engine.
pub struct Engine {
    store: Arc<dyn Store>,
    catalog: Arc<PlanCatalog>,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
    subjects: KeyedLocks,
    events: EventBus,
}

impl Engine {
    /// Create an engine over `store` using wall-clock time.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, catalog: PlanCatalog, config: EngineConfig) -> Self {
        Self::with_clock(store, catalog, config, Arc::new(SystemClock))
    }

    /// Create an engine with an explicit clock.
    #[must_use]
    pub fn with_clock(
        store: Arc<dyn Store>,
        catalog: PlanCatalog,
        config: EngineConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let subjects = KeyedLocks::new(DEFAULT_STRIPES, config.subject_lock_timeout);
        let events = EventBus::new(config.event_capacity);
        Self {
            store,
            catalog: Arc::new(catalog),
            clock,
            config,
            subjects,
            events,
        }
    }

    /// The plan catalog in force.
    #[must_use]
    pub fn catalog(&self) -> &PlanCatalog {
        &self.catalog
    }

    /// Engine configuration.
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Domain event bus.
    #[must_use]
    pub const fn events(&self) -> &EventBus {
        &self.events
    }

    /// Current instant according to the engine's clock.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }
}
