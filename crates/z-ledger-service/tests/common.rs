//! Common test utilities for z-ledger service integration tests.

#![allow(dead_code)] // Some utilities are used by different test files

use std::sync::Arc;

use axum::Router;
use axum_test::TestServer;
use chrono::{TimeZone, Utc};

use z_ledger_core::{ManualClock, PlanCatalog, UserId};
use z_ledger_engine::{Engine, EngineConfig};
use z_ledger_service::crypto::hmac_sha256_hex;
use z_ledger_service::{create_router, AppState, ServiceConfig};
use z_ledger_store::MemoryStore;

pub const SERVICE_KEY: &str = "test-service-key";
pub const ADMIN_KEY: &str = "test-admin-key";
pub const WEBHOOK_SECRET: &str = "whsec_test";

/// Test harness containing everything needed for integration tests.
pub struct TestHarness {
    /// The test server for making HTTP requests.
    pub server: TestServer,
    /// The engine behind the server.
    pub engine: Arc<Engine>,
    /// Clock driving the engine.
    pub clock: Arc<ManualClock>,
    /// A test user ID.
    pub test_user_id: UserId,
}

impl TestHarness {
    /// Create a new test harness with a fresh in-memory store.
    pub fn new() -> Self {
        let config = ServiceConfig {
            listen_addr: "127.0.0.1:0".into(),
            service_api_key: Some(SERVICE_KEY.into()),
            admin_api_key: Some(ADMIN_KEY.into()),
            payment_webhook_secret: Some(WEBHOOK_SECRET.into()),
            ..ServiceConfig::default()
        };

        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 3, 9, 12, 0, 0).unwrap(),
        ));
        let engine = Arc::new(Engine::with_clock(
            Arc::new(MemoryStore::new()),
            PlanCatalog::default(),
            EngineConfig::default(),
            clock.clone(),
        ));

        let state = AppState::new(engine.clone(), config);
        let router: Router = create_router(state);

        let server = TestServer::new(router).expect("Failed to create test server");

        Self {
            server,
            engine,
            clock,
            test_user_id: UserId::generate(),
        }
    }

    /// Service API key header value.
    pub fn service_key() -> String {
        SERVICE_KEY.to_string()
    }

    /// Admin API key header value.
    pub fn admin_key() -> String {
        ADMIN_KEY.to_string()
    }

    /// Signature header value for a webhook body.
    pub fn sign(body: &str) -> String {
        hmac_sha256_hex(WEBHOOK_SECRET, body.as_bytes())
    }

    /// Give `user_id` credits through the engine directly.
    pub fn fund(&self, user_id: UserId, credits: i64) {
        self.engine
            .purchase(user_id, credits, &format!("fund-{user_id}-{credits}"))
            .expect("funding purchase");
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
