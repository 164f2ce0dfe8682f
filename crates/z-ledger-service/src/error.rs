//! API error types and responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use z_ledger_core::{Feature, LedgerError, Limit, TransactionId};

/// API error type.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Unauthorized - missing or invalid credentials.
    #[error("unauthorized")]
    Unauthorized,

    /// Resource not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Bad request - invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Insufficient credits.
    #[error("insufficient credits: balance={balance}, required={required}")]
    InsufficientCredits {
        /// Current balance.
        balance: i64,
        /// Required amount.
        required: i64,
    },

    /// Periodic quota reached.
    #[error("quota exceeded for {feature}: limit={limit}")]
    QuotaExceeded {
        /// The metered feature.
        feature: Feature,
        /// The cap in force.
        limit: Limit,
    },

    /// Subject already has a live boost.
    #[error("already boosted: {0}")]
    AlreadyBoosted(String),

    /// Duplicate event (idempotency).
    #[error("duplicate event: {0}")]
    DuplicateEvent(String),

    /// The unit could not be serialized in time. Safe to retry.
    #[error("concurrency conflict: {0}")]
    ConcurrencyConflict(String),

    /// Credits were spent but the boost record is missing.
    #[error("boost record failed after spend {transaction_id}: {message}")]
    BoostRecordFailed {
        /// The committed spend.
        transaction_id: TransactionId,
        /// Balance after the spend.
        balance_after: i64,
        /// Underlying failure.
        message: String,
    },

    /// Balance and ledger disagree.
    #[error("account inconsistent: {0}")]
    AccountInconsistent(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// JSON error response body.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message, details) = match &self {
            Self::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                self.to_string(),
                None,
            ),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg.clone(), None),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg.clone(), None),
            Self::InsufficientCredits { balance, required } => (
                StatusCode::PAYMENT_REQUIRED,
                "insufficient_credits",
                self.to_string(),
                Some(serde_json::json!({
                    "balance": balance,
                    "required": required
                })),
            ),
            Self::QuotaExceeded { feature, limit } => (
                StatusCode::TOO_MANY_REQUESTS,
                "quota_exceeded",
                self.to_string(),
                Some(serde_json::json!({
                    "feature": feature,
                    "limit": limit
                })),
            ),
            Self::AlreadyBoosted(subject) => (
                StatusCode::CONFLICT,
                "already_boosted",
                format!("{subject} already has an active boost"),
                None,
            ),
            Self::DuplicateEvent(id) => (
                StatusCode::CONFLICT,
                "duplicate_event",
                format!("Event {id} already processed"),
                None,
            ),
            Self::ConcurrencyConflict(msg) => {
                tracing::warn!(error = %msg, "Concurrency conflict");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "concurrency_conflict",
                    "The operation could not complete in time; retry it".to_string(),
                    Some(serde_json::json!({ "retryable": true })),
                )
            }
            Self::BoostRecordFailed {
                transaction_id,
                balance_after,
                message,
            } => {
                tracing::error!(
                    transaction_id = %transaction_id,
                    error = %message,
                    "Boost record failed after spend"
                );
                (
                    StatusCode::BAD_GATEWAY,
                    "boost_record_failed",
                    "Credits were spent but the boost was not recorded; retry the record".to_string(),
                    Some(serde_json::json!({
                        "transaction_id": transaction_id,
                        "balance_after": balance_after
                    })),
                )
            }
            Self::AccountInconsistent(msg) => {
                tracing::error!(error = %msg, "Account inconsistent");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "account_inconsistent",
                    msg.clone(),
                    None,
                )
            }
            Self::Internal(msg) => {
                tracing::error!(error = %msg, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                    None,
                )
            }
        };

        let body = ErrorResponse {
            error: ErrorBody {
                code: code.to_string(),
                message,
                details,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::InsufficientCredits { balance, required } => {
                Self::InsufficientCredits { balance, required }
            }
            LedgerError::QuotaExceeded { feature, limit } => Self::QuotaExceeded { feature, limit },
            LedgerError::AlreadyBoosted { subject } => Self::AlreadyBoosted(subject),
            LedgerError::DuplicateEvent { event_id } => Self::DuplicateEvent(event_id),
            LedgerError::ConcurrencyConflict(msg) => Self::ConcurrencyConflict(msg),
            LedgerError::BoostRecordFailed {
                transaction_id,
                balance_after,
                message,
            } => Self::BoostRecordFailed {
                transaction_id,
                balance_after,
                message,
            },
            err @ LedgerError::AccountInconsistent { .. } => {
                Self::AccountInconsistent(err.to_string())
            }
            err @ LedgerError::NotFound { .. } => Self::NotFound(err.to_string()),
            err @ (LedgerError::BoostBelowMinimum { .. }
            | LedgerError::InvalidDuration { .. }
            | LedgerError::InvalidAmount(_)
            | LedgerError::SelfGift
            | LedgerError::InvalidId(_)) => Self::BadRequest(err.to_string()),
            LedgerError::Storage(msg)
            | LedgerError::Serialization(msg)
            | LedgerError::Configuration(msg) => Self::Internal(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ledger_errors_map_to_statuses() {
        let cases = [
            (
                LedgerError::InsufficientCredits {
                    balance: 1,
                    required: 5,
                },
                StatusCode::PAYMENT_REQUIRED,
            ),
            (
                LedgerError::QuotaExceeded {
                    feature: Feature::Stories,
                    limit: Limit::Finite(1),
                },
                StatusCode::TOO_MANY_REQUESTS,
            ),
            (
                LedgerError::AlreadyBoosted {
                    subject: "story:x".into(),
                },
                StatusCode::CONFLICT,
            ),
            (
                LedgerError::ConcurrencyConflict("slow".into()),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (LedgerError::SelfGift, StatusCode::BAD_REQUEST),
            (
                LedgerError::NotFound {
                    entity: "account",
                    id: "u".into(),
                },
                StatusCode::NOT_FOUND,
            ),
            (
                LedgerError::Storage("disk".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, status) in cases {
            let response = ApiError::from(err).into_response();
            assert_eq!(response.status(), status);
        }
    }

    #[test]
    fn boost_record_failure_is_bad_gateway() {
        let err = LedgerError::BoostRecordFailed {
            transaction_id: TransactionId::generate(),
            balance_after: 40,
            message: "disk full".into(),
        };
        assert_eq!(
            ApiError::from(err).into_response().status(),
            StatusCode::BAD_GATEWAY
        );
    }
}
