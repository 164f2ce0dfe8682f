//! Z-Ledger HTTP API Service.
//!
//! Internal service exposing the ledger engine to collaborating systems:
//!
//! - Entitlement checks and usage metering
//! - Credit accounts, spends, boosts and seal gifts
//! - Payment top-up webhooks
//! - Domain event relay to the notification collaborator
//!
//! # Authentication
//!
//! Service endpoints require `x-api-key`; operator endpoints require
//! `x-admin-key`. Payment webhooks are verified by HMAC signature.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
// Allow some pedantic lints that are noisy for Axum handler functions
#![allow(clippy::missing_errors_doc)] // Axum handlers all return Result
#![allow(clippy::unused_async)] // Handlers are async for the router

pub mod auth;
pub mod config;
pub mod crypto;
pub mod error;
pub mod handlers;
pub mod maintenance;
pub mod notifier;
pub mod routes;
pub mod state;

use std::sync::Arc;

use z_ledger_core::LedgerError;
use z_ledger_engine::Engine;

pub use config::{ServiceConfig, StoreBackend};
pub use error::ApiError;
pub use notifier::{NotificationRelay, RelayError};
pub use routes::create_router;
pub use state::AppState;

/// Build the engine described by `config`: store, plan catalog and knobs.
///
/// # Errors
///
/// Returns an error if the configuration is invalid or the store cannot be opened.
pub fn build_engine(config: &ServiceConfig) -> Result<Engine, LedgerError> {
    let store = config.open_store()?;
    let catalog = config.plan_catalog()?;
    Ok(Engine::new(store, catalog, config.engine_config()?))
}

/// Start the notification relay and housekeeping tasks for `state`.
///
/// Must be called inside a Tokio runtime.
pub fn spawn_background_tasks(state: &AppState) {
    if let Some(url) = &state.config.notification_webhook_url {
        match NotificationRelay::new(url.clone()) {
            Ok(relay) => {
                let _relay = relay.spawn(state.engine.events().subscribe());
            }
            Err(e) => tracing::error!(error = %e, "Failed to create notification relay"),
        }
    } else {
        tracing::warn!("NOTIFICATION_WEBHOOK_URL not configured - domain events are not relayed");
    }

    let _housekeeping = maintenance::spawn(
        Arc::clone(&state.engine),
        std::time::Duration::from_secs(state.config.boost_sweep_interval_seconds),
    );
}
