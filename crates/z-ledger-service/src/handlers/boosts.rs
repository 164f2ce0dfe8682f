//! Boost handlers.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use z_ledger_core::{Boost, BoostRequest, BoostSubject, TransactionId, UserId};
use z_ledger_engine::BoostReceipt;

use crate::auth::ServiceAuth;
use crate::error::ApiError;
use crate::handlers::parse_id;
use crate::state::AppState;

/// Boost request body.
#[derive(Debug, Clone, Deserialize)]
pub struct BoostBody {
    /// Who pays.
    pub user_id: UserId,
    /// `story` or `profile`.
    pub subject_kind: String,
    /// Story or user ID.
    pub subject_id: String,
    /// Credits offered.
    pub credits: i64,
    /// Boost length in hours.
    pub duration_hours: u32,
}

impl BoostBody {
    fn into_request(self) -> Result<BoostRequest, ApiError> {
        Ok(BoostRequest {
            subject: parse_subject(&self.subject_kind, &self.subject_id)?,
            user_id: self.user_id,
            credits: self.credits,
            duration_hours: self.duration_hours,
        })
    }
}

/// Retry body: the committed spend plus the original request.
#[derive(Debug, Deserialize)]
pub struct RetryBoostBody {
    /// The spend reported in `boost_record_failed`.
    pub transaction_id: TransactionId,
    /// The original request.
    #[serde(flatten)]
    pub request: BoostBody,
}

/// Active boost lookup response.
#[derive(Debug, Serialize)]
pub struct ActiveBoostResponse {
    /// Whether a boost is live now.
    pub active: bool,
    /// The live boost.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub boost: Option<Boost>,
}

fn parse_subject(kind: &str, id: &str) -> Result<BoostSubject, ApiError> {
    match kind {
        "story" => Ok(BoostSubject::Story(parse_id(id, "story ID")?)),
        "profile" => Ok(BoostSubject::Profile(parse_id(id, "user ID")?)),
        other => Err(ApiError::BadRequest(format!(
            "Unknown boost subject kind: {other}"
        ))),
    }
}

/// Boost a story or profile.
pub async fn create_boost(
    State(state): State<Arc<AppState>>,
    auth: ServiceAuth,
    Json(body): Json<BoostBody>,
) -> Result<Json<BoostReceipt>, ApiError> {
    let request = body.into_request()?;

    tracing::debug!(
        service = %auth.service_name,
        user_id = %request.user_id,
        subject = %request.subject,
        "Boost requested"
    );

    let receipt = state.run(move |engine| engine.boost(request)).await?;
    Ok(Json(receipt))
}

/// Write the boost record for a spend that already committed.
pub async fn retry_boost(
    State(state): State<Arc<AppState>>,
    _auth: ServiceAuth,
    Json(body): Json<RetryBoostBody>,
) -> Result<Json<Boost>, ApiError> {
    let transaction_id = body.transaction_id;
    let request = body.request.into_request()?;
    let boost = state
        .run(move |engine| engine.retry_boost_record(&transaction_id, request))
        .await?;
    Ok(Json(boost))
}

/// The subject's live boost, if any.
pub async fn get_active_boost(
    State(state): State<Arc<AppState>>,
    _auth: ServiceAuth,
    Path((kind, subject_id)): Path<(String, String)>,
) -> Result<Json<ActiveBoostResponse>, ApiError> {
    let subject = parse_subject(&kind, &subject_id)?;
    let boost = state.run(move |engine| engine.active_boost(&subject)).await?;
    Ok(Json(ActiveBoostResponse {
        active: boost.is_some(),
        boost,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use z_ledger_core::StoryId;

    #[test]
    fn subject_parsing() {
        let story = StoryId::generate();
        assert_eq!(
            parse_subject("story", &story.to_string()).unwrap(),
            BoostSubject::Story(story)
        );
        assert!(parse_subject("story", "nope").is_err());
        assert!(parse_subject("group", &story.to_string()).is_err());
    }
}
