//! Error types for z-ledger storage.

use z_ledger_core::LedgerError;

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur in storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Database operation failed.
    #[error("database error: {0}")]
    Database(String),

    /// Serialization/deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Record not found.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Kind of record.
        entity: &'static str,
        /// Key that was looked up.
        id: String,
    },

    /// A debit would take the balance below zero.
    #[error("insufficient credits: balance={balance}, required={required}")]
    InsufficientCredits {
        /// Current balance.
        balance: i64,
        /// Credits the debit needs.
        required: i64,
    },

    /// Duplicate event (idempotency check failed).
    #[error("duplicate event: {event_id}")]
    DuplicateEvent {
        /// The event ID that was duplicated.
        event_id: String,
    },

    /// The subject already has a live boost.
    #[error("already boosted: {subject}")]
    AlreadyBoosted {
        /// The boosted subject.
        subject: String,
    },

    /// A row lock could not be taken before the deadline. Nothing was written.
    #[error("lock timeout after {waited_ms}ms")]
    LockTimeout {
        /// How long the caller waited.
        waited_ms: u64,
    },

    /// The entry was rejected by ledger rules.
    #[error("invalid entry: {0}")]
    InvalidEntry(String),
}

impl StoreError {
    /// Map a ledger rule violation raised while pricing an entry.
    pub(crate) fn from_rule(err: LedgerError) -> Self {
        match err {
            LedgerError::InsufficientCredits { balance, required } => {
                Self::InsufficientCredits { balance, required }
            }
            other => Self::InvalidEntry(other.to_string()),
        }
    }
}

impl From<StoreError> for LedgerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Database(msg) => Self::Storage(msg),
            StoreError::Serialization(msg) => Self::Serialization(msg),
            StoreError::NotFound { entity, id } => Self::NotFound { entity, id },
            StoreError::InsufficientCredits { balance, required } => {
                Self::InsufficientCredits { balance, required }
            }
            StoreError::DuplicateEvent { event_id } => Self::DuplicateEvent { event_id },
            StoreError::AlreadyBoosted { subject } => Self::AlreadyBoosted { subject },
            StoreError::LockTimeout { waited_ms } => {
                Self::ConcurrencyConflict(format!("could not lock rows within {waited_ms}ms"))
            }
            StoreError::InvalidEntry(msg) => Self::InvalidAmount(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_timeout_is_retryable() {
        let err: LedgerError = StoreError::LockTimeout { waited_ms: 50 }.into();
        assert!(err.is_retryable());
        assert!(err.is_system_fault());
    }

    #[test]
    fn business_outcomes_survive_conversion() {
        let err: LedgerError = StoreError::InsufficientCredits {
            balance: 10,
            required: 50,
        }
        .into();
        assert!(matches!(
            err,
            LedgerError::InsufficientCredits {
                balance: 10,
                required: 50
            }
        ));
        assert!(!err.is_system_fault());
    }
}
