//! Authentication extractors.
//!
//! - `ServiceAuth` - service-to-service calls via `x-api-key`
//! - `AdminAuth` - operator endpoints via `x-admin-key`

use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::crypto::constant_time_eq;
use crate::error::ApiError;
use crate::state::AppState;

fn header<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts.headers.get(name).and_then(|v| v.to_str().ok())
}

fn check_key(presented: Option<&str>, expected: Option<&String>) -> Result<(), ApiError> {
    let presented = presented.ok_or(ApiError::Unauthorized)?;
    let expected = expected.ok_or(ApiError::Unauthorized)?;
    if constant_time_eq(presented, expected) {
        Ok(())
    } else {
        Err(ApiError::Unauthorized)
    }
}

/// Service authentication via API key.
#[derive(Debug, Clone)]
pub struct ServiceAuth {
    /// The calling service, for logs.
    pub service_name: String,
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for ServiceAuth {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        check_key(
            header(parts, "x-api-key"),
            state.config.service_api_key.as_ref(),
        )?;

        let service_name = header(parts, "x-service-name")
            .unwrap_or("unknown")
            .to_string();

        Ok(ServiceAuth { service_name })
    }
}

/// Admin authentication for operator endpoints.
#[derive(Debug, Clone)]
pub struct AdminAuth {
    /// Admin identifier (for audit logging).
    pub admin_id: String,
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AdminAuth {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        check_key(
            header(parts, "x-admin-key"),
            state.config.admin_api_key.as_ref(),
        )?;

        let admin_id = header(parts, "x-admin-id").unwrap_or("admin").to_string();

        tracing::info!(admin_id = %admin_id, "Admin authenticated");

        Ok(AdminAuth { admin_id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_check() {
        let expected = "secret".to_string();
        assert!(check_key(Some("secret"), Some(&expected)).is_ok());
        assert!(check_key(Some("Secret"), Some(&expected)).is_err());
        assert!(check_key(None, Some(&expected)).is_err());
        assert!(check_key(Some("secret"), None).is_err());
    }
}
