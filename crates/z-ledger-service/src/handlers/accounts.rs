//! Account handlers.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use z_ledger_core::{CreditAccount, CreditTransaction, UserId};

use crate::auth::ServiceAuth;
use crate::error::ApiError;
use crate::handlers::parse_id;
use crate::state::AppState;

/// Largest page a caller may request.
const MAX_PAGE: usize = 100;

/// Pagination query for transaction history.
#[derive(Debug, Deserialize)]
pub struct ListTransactionsQuery {
    /// Maximum number of transactions to return.
    #[serde(default = "default_limit")]
    pub limit: usize,
    /// Number of transactions to skip.
    #[serde(default)]
    pub offset: usize,
}

fn default_limit() -> usize {
    50
}

/// A page of transactions, newest first.
#[derive(Debug, Serialize)]
pub struct ListTransactionsResponse {
    /// The page.
    pub transactions: Vec<CreditTransaction>,
    /// Whether older transactions remain.
    pub has_more: bool,
}

/// Create the account if needed and return it.
pub async fn ensure_account(
    State(state): State<Arc<AppState>>,
    auth: ServiceAuth,
    Path(user_id): Path<String>,
) -> Result<Json<CreditAccount>, ApiError> {
    let user_id: UserId = parse_id(&user_id, "user ID")?;
    let account = state.run(move |engine| engine.ensure_account(&user_id)).await?;

    tracing::debug!(service = %auth.service_name, user_id = %user_id, "Account ensured");

    Ok(Json(account))
}

/// Get an account without creating it.
pub async fn get_account(
    State(state): State<Arc<AppState>>,
    _auth: ServiceAuth,
    Path(user_id): Path<String>,
) -> Result<Json<CreditAccount>, ApiError> {
    let user_id: UserId = parse_id(&user_id, "user ID")?;
    state
        .run(move |engine| engine.account(&user_id))
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("account not found: {user_id}")))
}

/// List an account's transactions, newest first.
pub async fn list_transactions(
    State(state): State<Arc<AppState>>,
    _auth: ServiceAuth,
    Path(user_id): Path<String>,
    Query(query): Query<ListTransactionsQuery>,
) -> Result<Json<ListTransactionsResponse>, ApiError> {
    let user_id: UserId = parse_id(&user_id, "user ID")?;

    // Fetch one more than requested to determine has_more
    let limit = query.limit.min(MAX_PAGE);
    let offset = query.offset;
    let mut transactions = state
        .run(move |engine| engine.transactions(&user_id, limit + 1, offset))
        .await?;

    let has_more = transactions.len() > limit;
    transactions.truncate(limit);

    Ok(Json(ListTransactionsResponse {
        transactions,
        has_more,
    }))
}
