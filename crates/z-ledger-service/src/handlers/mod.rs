//! HTTP request handlers.

pub mod accounts;
pub mod admin;
pub mod boosts;
pub mod credits;
pub mod entitlements;
pub mod gifts;
pub mod health;
pub mod usage;
pub mod webhooks;

use std::str::FromStr;

use crate::error::ApiError;

/// Parse an identifier from a path or body field.
pub(crate) fn parse_id<T: FromStr>(value: &str, what: &str) -> Result<T, ApiError> {
    value
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("Invalid {what}: {value}")))
}
