//! z-ledger Client SDK.
//!
//! This crate provides a client library for product services to check
//! entitlements, meter usage and spend credits through the z-ledger API.
//!
//! # Example
//!
//! ```no_run
//! use z_ledger_client::{AccountFacts, Feature, PlanTier, UserId, ZLedgerClient};
//!
//! # async fn example() -> Result<(), z_ledger_client::ClientError> {
//! let client = ZLedgerClient::new(
//!     "http://z-ledger.ledger-system.svc:8080",
//!     "your-service-api-key",
//! )?;
//!
//! let account = AccountFacts {
//!     user_id: UserId::generate(),
//!     tier: PlanTier::Gold,
//!     verified: true,
//! };
//!
//! // Gate the action, then count it
//! if client.check_feature(&account, Feature::Stories).await?.allowed {
//!     let outcome = client.consume_usage(&account, Feature::Stories).await?;
//!     println!("{} stories posted today", outcome.count);
//! }
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod client;
mod error;
mod types;

pub use client::{ClientOptions, ZLedgerClient};
pub use error::ClientError;
pub use types::{BoostReceipt, GiftReceipt, TransactionPage};

pub use z_ledger_core::{
    AccountFacts, Boost, BoostRequest, BoostSubject, Capability, CreditAccount, CreditTransaction,
    DenialReason, Entitlement, Feature, IncrementOutcome, Limit, MessageContext, PlanTier,
    StoryId, TransactionId, TransactionType, UsageSnapshot, UserId,
};
