//! Relay of domain events to the notification collaborator.
//!
//! Subscribes to the engine's event bus and POSTs each event as JSON.
//! Delivery failures are logged; they never affect ledger state.

use std::time::Duration;

use reqwest::Client;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;

use z_ledger_core::DomainEvent;

/// Maximum number of delivery attempts per event.
const MAX_ATTEMPTS: u32 = 3;

/// Initial backoff duration for retries (doubles with each attempt).
const INITIAL_BACKOFF_MS: u64 = 100;

/// Maximum backoff duration for retries.
const MAX_BACKOFF_MS: u64 = 5000;

/// Error type for event delivery.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The receiver answered with a non-success status.
    #[error("notification endpoint returned {0}")]
    Status(u16),
}

/// Posts domain events to a webhook URL.
#[derive(Debug, Clone)]
pub struct NotificationRelay {
    client: Client,
    url: String,
    max_attempts: u32,
    initial_backoff: Duration,
    max_backoff: Duration,
}

impl NotificationRelay {
    /// Create a relay posting to `url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(url: impl Into<String>) -> Result<Self, RelayError> {
        let client = Client::builder().timeout(Duration::from_secs(10)).build()?;
        Ok(Self {
            client,
            url: url.into(),
            max_attempts: MAX_ATTEMPTS,
            initial_backoff: Duration::from_millis(INITIAL_BACKOFF_MS),
            max_backoff: Duration::from_millis(MAX_BACKOFF_MS),
        })
    }

    /// Override the retry schedule.
    #[must_use]
    pub fn with_retry(mut self, max_attempts: u32, initial_backoff: Duration) -> Self {
        self.max_attempts = max_attempts.max(1);
        self.initial_backoff = initial_backoff;
        self
    }

    async fn send_once(&self, event: &DomainEvent) -> Result<(), RelayError> {
        let response = self.client.post(&self.url).json(event).send().await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(RelayError::Status(response.status().as_u16()))
        }
    }

    /// Deliver one event with exponential backoff retry.
    ///
    /// # Errors
    ///
    /// Returns the last error once all attempts have failed.
    pub async fn deliver(&self, event: &DomainEvent) -> Result<(), RelayError> {
        let mut attempt = 0;
        let mut backoff = self.initial_backoff;

        loop {
            match self.send_once(event).await {
                Ok(()) => {
                    tracing::debug!(
                        event_id = %event.id,
                        kind = %event.kind.as_str(),
                        "Event delivered"
                    );
                    return Ok(());
                }
                Err(e) => {
                    attempt += 1;

                    if attempt >= self.max_attempts {
                        tracing::warn!(
                            event_id = %event.id,
                            attempt = %attempt,
                            error = %e,
                            "Event delivery failed after max retries"
                        );
                        return Err(e);
                    }

                    tracing::debug!(
                        event_id = %event.id,
                        attempt = %attempt,
                        backoff_ms = %backoff.as_millis(),
                        error = %e,
                        "Event delivery failed, retrying"
                    );

                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(self.max_backoff);
                }
            }
        }
    }

    /// Relay events from `events` until the bus closes.
    #[must_use]
    pub fn spawn(self, mut events: broadcast::Receiver<DomainEvent>) -> JoinHandle<()> {
        tokio::spawn(async move {
            tracing::info!(url = %self.url, "Notification relay started");
            loop {
                match events.recv().await {
                    Ok(event) => {
                        // Failures are already logged; the ledger is unaffected.
                        let _ = self.deliver(&event).await;
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Notification relay lagged; events dropped");
                    }
                    Err(RecvError::Closed) => {
                        tracing::info!("Event bus closed, notification relay stopping");
                        break;
                    }
                }
            }
        })
    }
}
