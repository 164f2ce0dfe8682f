//! Client error types.

/// Errors that can occur when using the z-ledger client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Server returned an error response.
    #[error("API error: {code} - {message}")]
    Api {
        /// Error code.
        code: String,
        /// Error message.
        message: String,
        /// HTTP status code.
        status: u16,
    },

    /// Insufficient credits.
    #[error("insufficient credits: balance={balance}, required={required}")]
    InsufficientCredits {
        /// Current balance.
        balance: i64,
        /// Required amount.
        required: i64,
    },

    /// Periodic quota reached.
    #[error("quota exceeded: {message}")]
    QuotaExceeded {
        /// Server message.
        message: String,
        /// The cap, if finite.
        limit: Option<u64>,
    },

    /// The subject already has a live boost.
    #[error("already boosted: {message}")]
    AlreadyBoosted {
        /// Server message.
        message: String,
    },

    /// Other conflicts, such as a replayed event.
    #[error("conflict ({code}): {message}")]
    Conflict {
        /// Error code.
        code: String,
        /// Server message.
        message: String,
    },

    /// Credits were spent but the boost was not recorded.
    /// Retry with `ZLedgerClient::retry_boost` and this transaction ID.
    #[error("boost record failed after spend {transaction_id}")]
    BoostRecordFailed {
        /// The committed spend.
        transaction_id: String,
        /// Balance after the spend.
        balance_after: i64,
    },

    /// Resource not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl ClientError {
    /// The same request may succeed if sent again.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Api { status, .. } => *status == 503,
            Self::Http(err) => err.is_timeout() || err.is_connect(),
            _ => false,
        }
    }
}
