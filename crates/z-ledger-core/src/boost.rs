//! Boost types for z-ledger.
//!
//! A boost is the side record of a paid visibility action. Expiry is decided at
//! read time from `expires_at`; `is_active` can additionally be flipped off by a
//! sweeper so queries skip dead rows.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::credits::{CreditTransaction, Reference, ReferenceType};
use crate::error::{LedgerError, Result};
use crate::{BoostId, StoryId, TransactionId, UserId};

/// Default minimum credits for a boost.
pub const DEFAULT_MIN_BOOST_CREDITS: i64 = 10;

/// Default longest boost, in hours (one week).
pub const DEFAULT_MAX_BOOST_HOURS: u32 = 168;

/// The thing being boosted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum BoostSubject {
    /// A story.
    Story(StoryId),
    /// A user's profile.
    Profile(UserId),
}

impl BoostSubject {
    /// Ledger reference for spending on this subject.
    #[must_use]
    pub fn reference(&self) -> Reference {
        match self {
            Self::Story(id) => Reference::new(ReferenceType::StoryBoost, id.to_string()),
            Self::Profile(id) => Reference::new(ReferenceType::ProfileBoost, id.to_string()),
        }
    }

    /// Kind name.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Story(_) => "story",
            Self::Profile(_) => "profile",
        }
    }

    /// 17-byte storage key: kind tag then the UUID.
    #[must_use]
    pub fn key(&self) -> [u8; 17] {
        let (tag, bytes) = match self {
            Self::Story(id) => (1u8, id.as_bytes()),
            Self::Profile(id) => (2u8, id.as_bytes()),
        };
        let mut key = [0u8; 17];
        key[0] = tag;
        key[1..].copy_from_slice(bytes);
        key
    }
}

impl fmt::Display for BoostSubject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Story(id) => write!(f, "story:{id}"),
            Self::Profile(id) => write!(f, "profile:{id}"),
        }
    }
}

/// A request to boost a subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoostRequest {
    /// Subject to boost.
    pub subject: BoostSubject,
    /// Paying user.
    pub user_id: UserId,
    /// Credits offered.
    pub credits: i64,
    /// Length of the boost.
    pub duration_hours: u32,
}

/// A purchased boost.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Boost {
    /// Boost ID.
    pub id: BoostId,
    /// Boosted subject.
    pub subject: BoostSubject,
    /// Paying user.
    pub user_id: UserId,
    /// Credits debited.
    pub credits_spent: i64,
    /// Length of the boost.
    pub duration_hours: u32,
    /// The spend that paid for it.
    pub transaction_id: TransactionId,
    /// Start.
    pub created_at: DateTime<Utc>,
    /// End.
    pub expires_at: DateTime<Utc>,
    /// Cleared by the sweeper once expired.
    pub is_active: bool,
}

impl Boost {
    /// Build the record for a committed spend. Expiry counts from the spend.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::InvalidDuration` if the expiry is not representable.
    pub fn from_spend(request: &BoostRequest, spend: &CreditTransaction) -> Result<Self> {
        let expires_at = spend
            .created_at
            .checked_add_signed(Duration::hours(i64::from(request.duration_hours)))
            .ok_or(LedgerError::InvalidDuration {
                hours: request.duration_hours,
                max_hours: DEFAULT_MAX_BOOST_HOURS,
            })?;
        Ok(Self {
            id: BoostId::generate(),
            subject: request.subject,
            user_id: request.user_id,
            credits_spent: -spend.amount,
            duration_hours: request.duration_hours,
            transaction_id: spend.id,
            created_at: spend.created_at,
            expires_at,
            is_active: true,
        })
    }

    /// Whether the boost is in effect at `now`.
    #[must_use]
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.is_active && now <= self.expires_at
    }
}
