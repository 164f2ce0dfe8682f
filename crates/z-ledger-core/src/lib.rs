//! Core types and rules for z-ledger.
//!
//! This crate holds everything about entitlements and credits that does not
//! touch storage:
//!
//! - **Identifiers**: `UserId`, `StoryId`, `TransactionId`, `BoostId`, `EventId`
//! - **Plans**: `PlanTier`, `PlanCatalog`, `Limit`, `Feature`, `Capability`
//! - **Usage**: `UsageCounter`, `UsageSnapshot`, `apply_increment`
//! - **Credits**: `CreditAccount`, `CreditTransaction`, `LedgerEntry`, `reconcile`
//! - **Boosts**: `Boost`, `BoostSubject`, `BoostRequest`
//! - **Entitlements**: `resolve_feature`, `resolve_capability`, `resolve_message`
//! - **Time**: `Calendar`, `Clock`
//!
//! # Credits
//!
//! Credits are whole units stored as `i64`. Every balance change is one ledger
//! row with `balance_after = balance_before + amount`, and the account balance
//! always equals the last row's `balance_after`.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod account;
pub mod boost;
pub mod calendar;
pub mod credits;
pub mod entitlement;
pub mod error;
pub mod event;
pub mod ids;
pub mod plan;
pub mod usage;

pub use account::{reconcile, CreditAccount, LedgerTotals};
pub use boost::{
    Boost, BoostRequest, BoostSubject, DEFAULT_MAX_BOOST_HOURS, DEFAULT_MIN_BOOST_CREDITS,
};
pub use calendar::{Calendar, Clock, ManualClock, SystemClock};
pub use credits::{CreditTransaction, LedgerEntry, Reference, ReferenceType, TransactionType};
pub use entitlement::{
    resolve_capability, resolve_feature, resolve_message, AccountFacts, DenialReason,
    Entitlement, MessageContext,
};
pub use error::{LedgerError, Result};
pub use event::{DomainEvent, DomainEventKind};
pub use ids::{BoostId, EventId, IdError, StoryId, TransactionId, UserId};
pub use plan::{
    CatalogEntry, Capability, Feature, Limit, Period, PlanCatalog, PlanLimits, PlanTier,
};
pub use usage::{apply_increment, IncrementOutcome, UsageCounter, UsageSnapshot};
