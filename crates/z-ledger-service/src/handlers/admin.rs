//! Operator endpoints.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;

use z_ledger_core::{CreditTransaction, LedgerTotals, Reference, ReferenceType, UserId};

use crate::auth::AdminAuth;
use crate::error::ApiError;
use crate::handlers::parse_id;
use crate::state::AppState;

/// Kind of manual credit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdminCreditKind {
    /// Promotional credits.
    Bonus,
    /// Give back spent credits.
    Refund,
}

/// Manual credit request.
#[derive(Debug, Deserialize)]
pub struct AdminCreditRequest {
    /// Account to credit.
    pub user_id: UserId,
    /// Bonus or refund.
    pub kind: AdminCreditKind,
    /// Credits to add (positive).
    pub credits: i64,
    /// Why, recorded as the ledger reference.
    pub reason: String,
}

/// Grant bonus credits or refund spent ones.
pub async fn add_credits(
    State(state): State<Arc<AppState>>,
    admin: AdminAuth,
    Json(body): Json<AdminCreditRequest>,
) -> Result<Json<CreditTransaction>, ApiError> {
    if body.reason.trim().is_empty() {
        return Err(ApiError::BadRequest("reason is required".into()));
    }

    let AdminCreditRequest {
        user_id,
        kind,
        credits,
        reason,
    } = body;

    let tx = state
        .run(move |engine| match kind {
            AdminCreditKind::Bonus => engine.grant_bonus(user_id, credits, &reason),
            AdminCreditKind::Refund => {
                engine.refund(user_id, credits, Reference::new(ReferenceType::Refund, reason))
            }
        })
        .await?;

    tracing::info!(
        admin_id = %admin.admin_id,
        user_id = %user_id,
        kind = ?kind,
        credits,
        transaction_id = %tx.id,
        "Admin credited account"
    );

    Ok(Json(tx))
}

/// Reconcile an account against its ledger.
pub async fn verify_account(
    State(state): State<Arc<AppState>>,
    admin: AdminAuth,
    Path(user_id): Path<String>,
) -> Result<Json<LedgerTotals>, ApiError> {
    let user_id: UserId = parse_id(&user_id, "user ID")?;
    let totals = state.run(move |engine| engine.verify_account(&user_id)).await?;

    tracing::info!(admin_id = %admin.admin_id, user_id = %user_id, "Account verified");

    Ok(Json(totals))
}
