//! z-ledger HTTP client implementation.

use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

use z_ledger_core::{
    AccountFacts, Boost, BoostRequest, BoostSubject, Capability, CreditAccount, CreditTransaction,
    Entitlement, Feature, IncrementOutcome, MessageContext, TransactionId, UsageSnapshot, UserId,
};

use crate::error::ClientError;
use crate::types::{
    subject_parts, ActiveBoostResponse, ApiErrorResponse, BoostBody, BoostReceipt,
    CapabilityRequest, FeatureRequest, GiftReceipt, GiftSealRequest, MessageRequest,
    RetryBoostBody, SpendRequest, TransactionPage,
};

/// z-ledger API client.
///
/// Wraps the entitlement, usage and credit endpoints for product services.
#[derive(Debug, Clone)]
pub struct ZLedgerClient {
    client: Client,
    base_url: String,
    api_key: String,
    service_name: String,
}

impl ZLedgerClient {
    /// Create a new z-ledger client.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Base URL of the z-ledger service (e.g., `"http://z-ledger:8080"`)
    /// * `api_key` - Service API key for authentication
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is not http(s) or the HTTP client cannot be built.
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Result<Self, ClientError> {
        Self::with_options(base_url, api_key, ClientOptions::default())
    }

    /// Create a new z-ledger client with custom options.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is not http(s) or the HTTP client cannot be built.
    pub fn with_options(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        options: ClientOptions,
    ) -> Result<Self, ClientError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ClientError::Configuration(format!(
                "base URL must be http(s): {base_url:?}"
            )));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(options.timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            base_url,
            api_key: api_key.into(),
            service_name: options.service_name,
        })
    }

    // ========================================================================
    // Entitlements and usage
    // ========================================================================

    /// Can the account use a metered feature now. Consumes nothing.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn check_feature(
        &self,
        account: &AccountFacts,
        feature: Feature,
    ) -> Result<Entitlement, ClientError> {
        let body = FeatureRequest { account, feature };
        self.post("/v1/entitlements/check", &body).await
    }

    /// Can the account send a message in this conversation.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn check_message(
        &self,
        account: &AccountFacts,
        context: &MessageContext,
    ) -> Result<Entitlement, ClientError> {
        let body = MessageRequest { account, context };
        self.post("/v1/entitlements/message", &body).await
    }

    /// Does the account's plan grant a capability.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn check_capability(
        &self,
        account: &AccountFacts,
        capability: Capability,
    ) -> Result<Entitlement, ClientError> {
        let body = CapabilityRequest {
            account,
            capability,
        };
        self.post("/v1/entitlements/capability", &body).await
    }

    /// Current usage of a feature in its period.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn peek_usage(
        &self,
        account: &AccountFacts,
        feature: Feature,
    ) -> Result<UsageSnapshot, ClientError> {
        let body = FeatureRequest { account, feature };
        self.post("/v1/usage/peek", &body).await
    }

    /// Count one use of a feature.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::QuotaExceeded` at the limit, or an error if the
    /// request fails.
    pub async fn consume_usage(
        &self,
        account: &AccountFacts,
        feature: Feature,
    ) -> Result<IncrementOutcome, ClientError> {
        let body = FeatureRequest { account, feature };
        self.post("/v1/usage/consume", &body).await
    }

    // ========================================================================
    // Credits
    // ========================================================================

    /// Create the account if needed and return it.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn ensure_account(&self, user_id: &UserId) -> Result<CreditAccount, ClientError> {
        let url = format!("{}/v1/accounts/{user_id}", self.base_url);
        self.send(self.client.put(&url)).await
    }

    /// Get an account, or `None` if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn get_account(
        &self,
        user_id: &UserId,
    ) -> Result<Option<CreditAccount>, ClientError> {
        match self.get(&format!("/v1/accounts/{user_id}")).await {
            Ok(account) => Ok(Some(account)),
            Err(ClientError::NotFound(_)) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// One page of an account's transactions, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn list_transactions(
        &self,
        user_id: &UserId,
        limit: usize,
        offset: usize,
    ) -> Result<TransactionPage, ClientError> {
        self.get(&format!(
            "/v1/accounts/{user_id}/transactions?limit={limit}&offset={offset}"
        ))
        .await
    }

    /// Spend credits on a paid action.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::InsufficientCredits` if the balance is too low, or
    /// an error if the request fails.
    pub async fn spend(
        &self,
        user_id: UserId,
        credits: i64,
        reference_type: &str,
        reference_id: &str,
    ) -> Result<CreditTransaction, ClientError> {
        let body = SpendRequest {
            user_id,
            credits,
            reference_type,
            reference_id,
        };
        self.post("/v1/credits/spend", &body).await
    }

    /// Boost a story or profile.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::AlreadyBoosted` if the subject has a live boost,
    /// `ClientError::BoostRecordFailed` if the spend committed but the record
    /// did not (recover with [`Self::retry_boost`]), or another error.
    pub async fn boost(&self, request: &BoostRequest) -> Result<BoostReceipt, ClientError> {
        self.post("/v1/boosts", &BoostBody::from(request)).await
    }

    /// Write the boost record for a spend that already committed.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn retry_boost(
        &self,
        transaction_id: &TransactionId,
        request: &BoostRequest,
    ) -> Result<Boost, ClientError> {
        let body = RetryBoostBody {
            transaction_id: *transaction_id,
            request: BoostBody::from(request),
        };
        self.post("/v1/boosts/retry", &body).await
    }

    /// The subject's live boost, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn active_boost(
        &self,
        subject: &BoostSubject,
    ) -> Result<Option<Boost>, ClientError> {
        let (kind, id) = subject_parts(subject);
        let response: ActiveBoostResponse = self.get(&format!("/v1/boosts/{kind}/{id}")).await?;
        Ok(response.boost)
    }

    /// Gift a seal. Both ledger legs commit together or not at all.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::InsufficientCredits` if the sender cannot pay, or
    /// an error if the request fails.
    pub async fn gift_seal(
        &self,
        sender_id: UserId,
        recipient_id: UserId,
        cost: i64,
        seal_id: &str,
    ) -> Result<GiftReceipt, ClientError> {
        let body = GiftSealRequest {
            sender_id,
            recipient_id,
            cost,
            seal_id,
        };
        self.post("/v1/gifts/seals", &body).await
    }

    // ========================================================================
    // Transport
    // ========================================================================

    async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        let url = format!("{}{path}", self.base_url);
        self.send(self.client.post(&url).json(body)).await
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let url = format!("{}{path}", self.base_url);
        self.send(self.client.get(&url)).await
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ClientError> {
        let response = request
            .header("x-api-key", &self.api_key)
            .header("x-service-name", &self.service_name)
            .send()
            .await?;

        Self::handle_response(response).await
    }

    /// Handle API response and convert errors.
    async fn handle_response<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ClientError> {
        let status = response.status();

        if status.is_success() {
            return Ok(response.json().await?);
        }

        // Try to parse error response
        let error_body: Result<ApiErrorResponse, _> = response.json().await;

        let Ok(api_error) = error_body else {
            return Err(ClientError::Api {
                code: "unknown".to_string(),
                message: format!("HTTP {status}"),
                status: status.as_u16(),
            });
        };

        let code = api_error.error.code;
        let message = api_error.error.message;
        let details = api_error.error.details.unwrap_or_default();
        let detail_i64 = |key: &str| details.get(key).and_then(serde_json::Value::as_i64);

        tracing::debug!(status = status.as_u16(), code = %code, "z-ledger returned an error");

        // Map specific error codes to typed errors
        let err = match code.as_str() {
            "insufficient_credits" => ClientError::InsufficientCredits {
                balance: detail_i64("balance").unwrap_or(0),
                required: detail_i64("required").unwrap_or(0),
            },
            "quota_exceeded" => ClientError::QuotaExceeded {
                limit: details.get("limit").and_then(serde_json::Value::as_u64),
                message,
            },
            "already_boosted" => ClientError::AlreadyBoosted { message },
            "duplicate_event" => ClientError::Conflict {
                code: code.clone(),
                message,
            },
            "boost_record_failed" => ClientError::BoostRecordFailed {
                transaction_id: details
                    .get("transaction_id")
                    .and_then(serde_json::Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                balance_after: detail_i64("balance_after").unwrap_or(0),
            },
            "not_found" => ClientError::NotFound(message),
            _ => ClientError::Api {
                code: code.clone(),
                message,
                status: status.as_u16(),
            },
        };
        Err(err)
    }
}

/// Client options for customization.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Request timeout in seconds (default: 10).
    pub timeout_seconds: u64,
    /// Service name to include in requests.
    pub service_name: String,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout_seconds: 10,
            service_name: "unknown".to_string(),
        }
    }
}

impl ClientOptions {
    /// Create options with a service name.
    #[must_use]
    pub fn with_service_name(name: impl Into<String>) -> Self {
        Self {
            service_name: name.into(),
            ..Self::default()
        }
    }
}
