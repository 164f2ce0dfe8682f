//! Usage counter handlers.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;

use z_ledger_core::{IncrementOutcome, UsageSnapshot};

use crate::auth::ServiceAuth;
use crate::error::ApiError;
use crate::handlers::entitlements::FeatureCheckRequest;
use crate::state::AppState;

/// Current count, limit and reset instant. Writes nothing.
pub async fn peek(
    State(state): State<Arc<AppState>>,
    _auth: ServiceAuth,
    Json(body): Json<FeatureCheckRequest>,
) -> Result<Json<UsageSnapshot>, ApiError> {
    let FeatureCheckRequest { account, feature } = body;
    let snapshot = state.run(move |engine| engine.peek(&account, feature)).await?;
    Ok(Json(snapshot))
}

/// Count one use. Responds 429 `quota_exceeded` at the limit.
pub async fn consume(
    State(state): State<Arc<AppState>>,
    auth: ServiceAuth,
    Json(body): Json<FeatureCheckRequest>,
) -> Result<Json<IncrementOutcome>, ApiError> {
    let FeatureCheckRequest { account, feature } = body;

    tracing::debug!(
        service = %auth.service_name,
        user_id = %account.user_id,
        feature = %feature,
        "Consuming usage"
    );

    let outcome = state.run(move |engine| engine.consume(&account, feature)).await?;
    Ok(Json(outcome))
}
