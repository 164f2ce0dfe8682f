//! Router configuration.
//!
//! This module sets up the Axum router with all routes and middleware.

use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{
    accounts, admin, boosts, credits, entitlements, gifts, health, usage, webhooks,
};
use crate::state::AppState;

// ============================================================================
// Concurrency Limiting Constants
// ============================================================================

/// Maximum concurrent requests for entitlement and usage endpoints.
/// These are on the hot path of every gated action.
const METERING_MAX_CONCURRENT_REQUESTS: usize = 200;

/// Maximum concurrent requests for general API endpoints.
const API_MAX_CONCURRENT_REQUESTS: usize = 50;

/// Create the service router with all routes and middleware.
///
/// # Routes
///
/// ## Public
/// - `GET /health` - Health check
///
/// ## Metering (Service API key)
/// - `POST /v1/entitlements/check` - Can the account use a feature
/// - `POST /v1/entitlements/message` - Can the account send a message
/// - `POST /v1/entitlements/capability` - Does the plan grant a capability
/// - `POST /v1/usage/peek` - Read a usage counter
/// - `POST /v1/usage/consume` - Count one use
///
/// ## Ledger (Service API key)
/// - `PUT /v1/accounts/:user_id` - Ensure account
/// - `GET /v1/accounts/:user_id` - Get account
/// - `GET /v1/accounts/:user_id/transactions` - Transaction history
/// - `POST /v1/credits/spend` - Spend credits
/// - `POST /v1/boosts` - Boost a story or profile
/// - `POST /v1/boosts/retry` - Recover a boost record after a committed spend
/// - `GET /v1/boosts/:kind/:subject_id` - Active boost
/// - `POST /v1/gifts/seals` - Gift a seal
///
/// ## Admin (Admin key)
/// - `POST /v1/admin/credits` - Bonus or refund
/// - `GET /v1/admin/accounts/:user_id/verify` - Reconcile an account
///
/// ## Webhooks (Signature verification)
/// - `POST /webhooks/payments` - Payment top-ups
pub fn create_router(state: AppState) -> Router {
    // Extract config values before moving state
    let cors_origins = state.config.cors_origins.clone();
    let max_body_bytes = state.config.max_body_bytes;
    let request_timeout_seconds = state.config.request_timeout_seconds;

    let cors = build_cors_layer(&cors_origins);

    let state = Arc::new(state);

    let metering_routes = Router::new()
        .route("/entitlements/check", post(entitlements::check_feature))
        .route("/entitlements/message", post(entitlements::check_message))
        .route("/entitlements/capability", post(entitlements::check_capability))
        .route("/usage/peek", post(usage::peek))
        .route("/usage/consume", post(usage::consume))
        .layer(ConcurrencyLimitLayer::new(METERING_MAX_CONCURRENT_REQUESTS));

    let api_routes = Router::new()
        // Accounts
        .route(
            "/accounts/:user_id",
            get(accounts::get_account).put(accounts::ensure_account),
        )
        .route(
            "/accounts/:user_id/transactions",
            get(accounts::list_transactions),
        )
        // Credits
        .route("/credits/spend", post(credits::spend))
        // Boosts
        .route("/boosts", post(boosts::create_boost))
        .route("/boosts/retry", post(boosts::retry_boost))
        .route("/boosts/:kind/:subject_id", get(boosts::get_active_boost))
        // Gifts
        .route("/gifts/seals", post(gifts::gift_seal))
        // Admin
        .route("/admin/credits", post(admin::add_credits))
        .route(
            "/admin/accounts/:user_id/verify",
            get(admin::verify_account),
        )
        .layer(ConcurrencyLimitLayer::new(API_MAX_CONCURRENT_REQUESTS));

    Router::new()
        // Health (public, no rate limit)
        .route("/health", get(health::health))
        .nest("/v1", metering_routes.merge(api_routes))
        // Webhooks (no rate limit - controlled by the payment collaborator)
        .route("/webhooks/payments", post(webhooks::payment_webhook))
        // Global middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(TimeoutLayer::new(Duration::from_secs(
            request_timeout_seconds,
        )))
        .with_state(state)
}

/// Build the CORS layer from configured origins.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}
