//! Entitlement checks. Read-only: nothing here consumes quota.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Deserialize;

use z_ledger_core::{AccountFacts, Capability, Entitlement, Feature, MessageContext};

use crate::auth::ServiceAuth;
use crate::error::ApiError;
use crate::state::AppState;

/// Metered feature check.
#[derive(Debug, Deserialize)]
pub struct FeatureCheckRequest {
    /// Who is asking.
    pub account: AccountFacts,
    /// What they want to use.
    pub feature: Feature,
}

/// Message send check.
#[derive(Debug, Deserialize)]
pub struct MessageCheckRequest {
    /// The sender.
    pub account: AccountFacts,
    /// Who started the conversation.
    pub context: MessageContext,
}

/// Capability check.
#[derive(Debug, Deserialize)]
pub struct CapabilityCheckRequest {
    /// Who is asking.
    pub account: AccountFacts,
    /// The capability.
    pub capability: Capability,
}

/// Can the account use a metered feature now.
pub async fn check_feature(
    State(state): State<Arc<AppState>>,
    auth: ServiceAuth,
    Json(body): Json<FeatureCheckRequest>,
) -> Result<Json<Entitlement>, ApiError> {
    let FeatureCheckRequest { account, feature } = body;
    let entitlement = state.run(move |engine| engine.can_use(&account, feature)).await?;

    tracing::debug!(
        service = %auth.service_name,
        user_id = %account.user_id,
        feature = %feature,
        allowed = entitlement.allowed,
        "Entitlement checked"
    );

    Ok(Json(entitlement))
}

/// Can the account send a message in this conversation.
pub async fn check_message(
    State(state): State<Arc<AppState>>,
    _auth: ServiceAuth,
    Json(body): Json<MessageCheckRequest>,
) -> Result<Json<Entitlement>, ApiError> {
    let MessageCheckRequest { account, context } = body;
    let entitlement = state
        .run(move |engine| engine.can_message(&account, &context))
        .await?;
    Ok(Json(entitlement))
}

/// Does the account's plan grant a capability.
pub async fn check_capability(
    State(state): State<Arc<AppState>>,
    _auth: ServiceAuth,
    Json(body): Json<CapabilityCheckRequest>,
) -> Json<Entitlement> {
    Json(state.engine.capability(&body.account, body.capability))
}
