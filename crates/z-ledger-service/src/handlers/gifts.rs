//! Seal gift handler.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Deserialize;

use z_ledger_core::UserId;
use z_ledger_engine::GiftReceipt;

use crate::auth::ServiceAuth;
use crate::error::ApiError;
use crate::state::AppState;

/// Gift request.
#[derive(Debug, Deserialize)]
pub struct GiftSealRequest {
    /// Who pays.
    pub sender_id: UserId,
    /// Who receives the credits.
    pub recipient_id: UserId,
    /// Price of the seal.
    pub cost: i64,
    /// Which seal.
    pub seal_id: String,
}

/// Gift a seal. Both ledger legs commit together.
pub async fn gift_seal(
    State(state): State<Arc<AppState>>,
    _auth: ServiceAuth,
    Json(body): Json<GiftSealRequest>,
) -> Result<Json<GiftReceipt>, ApiError> {
    let GiftSealRequest {
        sender_id,
        recipient_id,
        cost,
        seal_id,
    } = body;

    let receipt = state
        .run(move |engine| engine.gift_seal(sender_id, recipient_id, cost, &seal_id))
        .await?;
    Ok(Json(receipt))
}
