//! Application state.

use std::sync::Arc;

use z_ledger_engine::Engine;

use crate::config::ServiceConfig;
use crate::error::ApiError;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// The ledger engine.
    pub engine: Arc<Engine>,

    /// Service configuration.
    pub config: ServiceConfig,
}

impl AppState {
    /// Create a new application state.
    #[must_use]
    pub fn new(engine: Arc<Engine>, config: ServiceConfig) -> Self {
        if config.service_api_key.is_none() {
            tracing::warn!(
                "SERVICE_API_KEY not configured - service endpoints will reject all calls"
            );
        }
        if config.admin_api_key.is_none() {
            tracing::warn!("ADMIN_API_KEY not configured - admin endpoints disabled");
        }

        Self { engine, config }
    }

    /// Run an engine operation off the async runtime.
    ///
    /// Engine calls may wait on row locks, so they go to the blocking pool.
    pub async fn run<T, F>(&self, op: F) -> Result<T, ApiError>
    where
        F: FnOnce(&Engine) -> z_ledger_core::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let engine = Arc::clone(&self.engine);
        tokio::task::spawn_blocking(move || op(&engine))
            .await
            .map_err(|e| ApiError::Internal(format!("engine task failed: {e}")))?
            .map_err(ApiError::from)
    }
}
