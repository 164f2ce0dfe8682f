//! Credit spend handler.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Deserialize;

use z_ledger_core::{CreditTransaction, Reference, ReferenceType, UserId};

use crate::auth::ServiceAuth;
use crate::error::ApiError;
use crate::state::AppState;

/// Spend request.
#[derive(Debug, Deserialize)]
pub struct SpendRequest {
    /// Who pays.
    pub user_id: UserId,
    /// Credits to spend (positive).
    pub credits: i64,
    /// What the credits pay for, e.g. `"profile_unlock"`.
    pub reference_type: String,
    /// ID of the thing paid for.
    pub reference_id: String,
}

/// Spend credits on a paid action.
pub async fn spend(
    State(state): State<Arc<AppState>>,
    auth: ServiceAuth,
    Json(body): Json<SpendRequest>,
) -> Result<Json<CreditTransaction>, ApiError> {
    if body.reference_id.is_empty() {
        return Err(ApiError::BadRequest("reference_id is required".into()));
    }

    let user_id = body.user_id;
    let credits = body.credits;
    let reference = Reference::new(ReferenceType::parse(&body.reference_type), body.reference_id);

    let tx = state
        .run(move |engine| engine.spend(user_id, credits, reference))
        .await?;

    tracing::info!(
        service = %auth.service_name,
        user_id = %user_id,
        transaction_id = %tx.id,
        credits,
        balance_after = tx.balance_after,
        "Credits spent"
    );

    Ok(Json(tx))
}
