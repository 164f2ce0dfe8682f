//! Payment collaborator webhook.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};

use z_ledger_core::{LedgerError, TransactionId, UserId};

use crate::crypto::verify_signature;
use crate::error::ApiError;
use crate::state::AppState;

/// Top-up notification from the payment collaborator.
#[derive(Debug, Deserialize)]
pub struct PaymentWebhook {
    /// Payment event ID; replays are ignored.
    pub event_id: String,
    /// Who paid.
    pub user_id: UserId,
    /// Credits bought.
    pub credits: i64,
}

/// Webhook response.
#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    /// Whether the webhook was accepted.
    pub received: bool,
    /// The event had already been applied.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub duplicate: bool,
    /// The purchase row, when one was written.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<TransactionId>,
    /// Balance after the purchase.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub balance_after: Option<i64>,
}

/// Handle a payment top-up.
pub async fn payment_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookResponse>, ApiError> {
    if let Some(secret) = &state.config.payment_webhook_secret {
        let signature = headers
            .get("x-signature")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::BadRequest("Missing payment signature".into()))?;

        if !verify_signature(secret, &body, signature) {
            tracing::warn!("Invalid payment webhook signature");
            return Err(ApiError::BadRequest("Invalid webhook signature".into()));
        }
    } else {
        tracing::warn!("PAYMENT_WEBHOOK_SECRET not configured - skipping signature verification");
    }

    let webhook: PaymentWebhook =
        serde_json::from_slice(&body).map_err(|e| ApiError::BadRequest(e.to_string()))?;

    tracing::info!(
        event_id = %webhook.event_id,
        user_id = %webhook.user_id,
        credits = webhook.credits,
        "Received payment webhook"
    );

    let PaymentWebhook {
        event_id,
        user_id,
        credits,
    } = webhook;
    let replay_id = event_id.clone();

    let result = state
        .run(move |engine| match engine.purchase(user_id, credits, &event_id) {
            Err(LedgerError::DuplicateEvent { .. }) => Ok(None),
            other => other.map(Some),
        })
        .await?;

    match result {
        Some(tx) => Ok(Json(WebhookResponse {
            received: true,
            duplicate: false,
            transaction_id: Some(tx.id),
            balance_after: Some(tx.balance_after),
        })),
        None => {
            tracing::info!(event_id = %replay_id, "Payment event already processed");
            Ok(Json(WebhookResponse {
                received: true,
                duplicate: true,
                transaction_id: None,
                balance_after: None,
            }))
        }
    }
}
