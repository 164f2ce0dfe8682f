//! Error types for z-ledger.

use crate::ids::{IdError, TransactionId, UserId};
use crate::plan::{Feature, Limit};

/// Result type for z-ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;

/// Errors that can occur in z-ledger operations.
///
/// Business outcomes (`InsufficientCredits`, `QuotaExceeded`, `AlreadyBoosted`, ...)
/// never leave partial state behind. `ConcurrencyConflict` and
/// `AccountInconsistent` are system faults.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// The debit would take the balance below zero.
    #[error("insufficient credits: balance={balance}, required={required}")]
    InsufficientCredits {
        /// Current balance.
        balance: i64,
        /// Credits the operation needs.
        required: i64,
    },

    /// The periodic cap for a feature has been reached.
    #[error("quota exceeded for {feature}: limit={limit}")]
    QuotaExceeded {
        /// The metered feature.
        feature: Feature,
        /// The cap in force.
        limit: Limit,
    },

    /// The subject already has a live boost.
    #[error("already boosted: {subject}")]
    AlreadyBoosted {
        /// The boosted subject.
        subject: String,
    },

    /// The atomic unit could not be serialized before its deadline.
    /// Retry the whole operation.
    #[error("concurrency conflict: {0}")]
    ConcurrencyConflict(String),

    /// Balance and ledger disagree. Needs an operator.
    #[error("account inconsistent for {user_id}: {detail}")]
    AccountInconsistent {
        /// The affected user.
        user_id: UserId,
        /// What did not reconcile.
        detail: String,
    },

    /// Credits were spent but the boost record could not be written.
    #[error("boost record failed after spend {transaction_id}: {message}")]
    BoostRecordFailed {
        /// The committed spend.
        transaction_id: TransactionId,
        /// Balance after the committed spend.
        balance_after: i64,
        /// Underlying failure.
        message: String,
    },

    /// Boost offer is below the configured minimum.
    #[error("boost requires at least {minimum} credits, offered {credits}")]
    BoostBelowMinimum {
        /// Offered credits.
        credits: i64,
        /// Configured minimum.
        minimum: i64,
    },

    /// Boost duration outside the accepted range.
    #[error("invalid boost duration: {hours}h (allowed 1..={max_hours}h)")]
    InvalidDuration {
        /// Requested hours.
        hours: u32,
        /// Configured maximum.
        max_hours: u32,
    },

    /// Amount has the wrong sign or magnitude for the transaction type.
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// A user tried to gift to themselves.
    #[error("cannot gift to self")]
    SelfGift,

    /// An external event was already applied.
    #[error("duplicate event: {event_id}")]
    DuplicateEvent {
        /// The replayed event ID.
        event_id: String,
    },

    /// A referenced record does not exist.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Kind of record.
        entity: &'static str,
        /// Key that was looked up.
        id: String,
    },

    /// Invalid identifier.
    #[error("invalid identifier: {0}")]
    InvalidId(#[from] IdError),

    /// Storage error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl LedgerError {
    /// The caller may retry the whole operation unchanged.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::ConcurrencyConflict(_))
    }

    /// The error is a fault of the system rather than a business outcome.
    #[must_use]
    pub const fn is_system_fault(&self) -> bool {
        matches!(
            self,
            Self::ConcurrencyConflict(_)
                | Self::AccountInconsistent { .. }
                | Self::Storage(_)
                | Self::Serialization(_)
        )
    }
}
