//! Shared helpers for engine integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use z_ledger_core::{AccountFacts, ManualClock, PlanCatalog, PlanTier, UserId};
use z_ledger_engine::{Engine, EngineConfig};
use z_ledger_store::{MemoryStore, Store};

/// An engine over a fresh in-memory store with a hand-driven clock.
pub struct TestEngine {
    pub engine: Engine,
    pub store: Arc<MemoryStore>,
    pub clock: Arc<ManualClock>,
}

impl TestEngine {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(noon(2026, 3, 9)));
        let engine = Engine::with_clock(
            store.clone() as Arc<dyn Store>,
            PlanCatalog::default(),
            config,
            clock.clone(),
        );
        Self {
            engine,
            store,
            clock,
        }
    }

    /// A user with `credits` already purchased.
    pub fn funded_user(&self, credits: i64) -> UserId {
        let user_id = UserId::generate();
        if credits > 0 {
            self.engine
                .purchase(user_id, credits, &format!("fund-{user_id}"))
                .unwrap();
        } else {
            self.engine.ensure_account(&user_id).unwrap();
        }
        user_id
    }
}

pub fn noon(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 12, 0, 0).unwrap()
}

pub fn facts(tier: PlanTier, verified: bool) -> AccountFacts {
    AccountFacts {
        user_id: UserId::generate(),
        tier,
        verified,
    }
}
