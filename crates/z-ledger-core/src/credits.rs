//! Credit transaction types for z-ledger.
//!
//! Every balance change is exactly one immutable [`CreditTransaction`] row.
//! Callers describe the change as a [`LedgerEntry`]; the store turns it into a
//! row while holding the account's lock, filling in the before/after balances.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, Result};
use crate::{TransactionId, UserId};

/// A committed ledger row. Never updated or deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditTransaction {
    /// Unique transaction ID (ULID for time-ordering).
    pub id: TransactionId,

    /// The user whose balance was affected.
    pub user_id: UserId,

    /// Type of transaction.
    pub transaction_type: TransactionType,

    /// Signed amount. Positive = credit, negative = debit.
    pub amount: i64,

    /// Balance before this row.
    pub balance_before: i64,

    /// Balance after this row. Always `balance_before + amount`.
    pub balance_after: i64,

    /// What the credits were for.
    pub reference: Reference,

    /// Other side of a gift.
    pub counterparty_user_id: Option<UserId>,

    /// When the transaction was committed.
    pub created_at: DateTime<Utc>,
}

impl CreditTransaction {
    /// Whether the row's own arithmetic holds.
    #[must_use]
    pub fn is_balanced(&self) -> bool {
        self.balance_before.checked_add(self.amount) == Some(self.balance_after)
    }
}

/// Type of credit transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    /// Credits bought through the payment collaborator.
    Purchase,

    /// Credits spent on a paid action.
    Spend,

    /// Credits given away as a gift.
    GiftSent,

    /// Credits received from a gift.
    GiftReceived,

    /// Reversal of earlier spending.
    Refund,

    /// Promotional credits.
    Bonus,
}

impl TransactionType {
    /// Check if this transaction type adds credits (positive balance change).
    #[must_use]
    pub const fn is_credit(&self) -> bool {
        matches!(
            self,
            Self::Purchase | Self::GiftReceived | Self::Refund | Self::Bonus
        )
    }

    /// Check if this transaction type removes credits (negative balance change).
    #[must_use]
    pub const fn is_debit(&self) -> bool {
        matches!(self, Self::Spend | Self::GiftSent)
    }

    /// Get the type name as a string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Purchase => "purchase",
            Self::Spend => "spend",
            Self::GiftSent => "gift_sent",
            Self::GiftReceived => "gift_received",
            Self::Refund => "refund",
            Self::Bonus => "bonus",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Category of thing a transaction pays for or comes from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceType {
    /// Story visibility boost.
    StoryBoost,
    /// Profile visibility boost.
    ProfileBoost,
    /// Decorative seal gift.
    SealGift,
    /// Payment collaborator top-up.
    Purchase,
    /// Operator grant.
    Promotion,
    /// Operator refund.
    Refund,
    /// Any other paid action.
    Custom(String),
}

impl ReferenceType {
    /// Get the reference type as a string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::StoryBoost => "story_boost",
            Self::ProfileBoost => "profile_boost",
            Self::SealGift => "seal_gift",
            Self::Purchase => "purchase",
            Self::Promotion => "promotion",
            Self::Refund => "refund",
            Self::Custom(name) => name,
        }
    }

    /// Whether rows with this reference pay for a boost.
    #[must_use]
    pub const fn is_boost(&self) -> bool {
        matches!(self, Self::StoryBoost | Self::ProfileBoost)
    }

    /// Parse a reference type name, treating unknown names as custom.
    #[must_use]
    pub fn parse(name: &str) -> Self {
        match name {
            "story_boost" => Self::StoryBoost,
            "profile_boost" => Self::ProfileBoost,
            "seal_gift" => Self::SealGift,
            "purchase" => Self::Purchase,
            "promotion" => Self::Promotion,
            "refund" => Self::Refund,
            other => Self::Custom(other.to_string()),
        }
    }
}

/// What a transaction refers to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Reference {
    /// Category.
    pub reference_type: ReferenceType,
    /// Identifier within the category.
    pub reference_id: String,
}

impl Reference {
    /// Create a reference.
    #[must_use]
    pub fn new(reference_type: ReferenceType, reference_id: impl Into<String>) -> Self {
        Self {
            reference_type,
            reference_id: reference_id.into(),
        }
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.reference_type.as_str(), self.reference_id)
    }
}

/// A requested balance change, before it is priced against the account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    /// Affected user.
    pub user_id: UserId,
    /// Type of change.
    pub transaction_type: TransactionType,
    /// Signed amount.
    pub amount: i64,
    /// What it is for.
    pub reference: Reference,
    /// Other side of a gift.
    pub counterparty_user_id: Option<UserId>,
}

impl LedgerEntry {
    /// Build an entry and check the amount's sign matches the type.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::InvalidAmount` for zero amounts or a sign that
    /// disagrees with `transaction_type`.
    pub fn new(
        user_id: UserId,
        transaction_type: TransactionType,
        amount: i64,
        reference: Reference,
    ) -> Result<Self> {
        let entry = Self {
            user_id,
            transaction_type,
            amount,
            reference,
            counterparty_user_id: None,
        };
        entry.validate()?;
        Ok(entry)
    }

    /// Spend `credits` (positive) on `reference`.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::InvalidAmount` if `credits` is not positive.
    pub fn spend(user_id: UserId, credits: i64, reference: Reference) -> Result<Self> {
        Self::new(user_id, TransactionType::Spend, negate(credits)?, reference)
    }

    /// Credit a purchase of `credits`.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::InvalidAmount` if `credits` is not positive.
    pub fn purchase(user_id: UserId, credits: i64, reference: Reference) -> Result<Self> {
        Self::new(user_id, TransactionType::Purchase, credits, reference)
    }

    /// The two legs of a gift: debit the sender, credit the recipient.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::SelfGift` if sender and recipient match, or
    /// `LedgerError::InvalidAmount` if `cost` is not positive.
    pub fn gift_pair(
        sender_id: UserId,
        recipient_id: UserId,
        cost: i64,
        reference: &Reference,
    ) -> Result<[Self; 2]> {
        if sender_id == recipient_id {
            return Err(LedgerError::SelfGift);
        }

        let mut sent = Self::new(
            sender_id,
            TransactionType::GiftSent,
            negate(cost)?,
            reference.clone(),
        )?;
        sent.counterparty_user_id = Some(recipient_id);

        let mut received = Self::new(
            recipient_id,
            TransactionType::GiftReceived,
            cost,
            reference.clone(),
        )?;
        received.counterparty_user_id = Some(sender_id);

        Ok([sent, received])
    }

    /// Check the amount's sign against the type.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::InvalidAmount` on mismatch.
    pub fn validate(&self) -> Result<()> {
        let ok = if self.transaction_type.is_debit() {
            self.amount < 0
        } else {
            self.amount > 0
        };

        if ok {
            Ok(())
        } else {
            Err(LedgerError::InvalidAmount(format!(
                "{} requires a {} amount, got {}",
                self.transaction_type,
                if self.transaction_type.is_debit() {
                    "negative"
                } else {
                    "positive"
                },
                self.amount
            )))
        }
    }

    /// Turn the entry into a committed row given the balance it applies to.
    #[must_use]
    pub fn into_transaction(
        self,
        balance_before: i64,
        balance_after: i64,
        created_at: DateTime<Utc>,
    ) -> CreditTransaction {
        CreditTransaction {
            id: TransactionId::generate(),
            user_id: self.user_id,
            transaction_type: self.transaction_type,
            amount: self.amount,
            balance_before,
            balance_after,
            reference: self.reference,
            counterparty_user_id: self.counterparty_user_id,
            created_at,
        }
    }
}

fn negate(credits: i64) -> Result<i64> {
    if credits <= 0 {
        return Err(LedgerError::InvalidAmount(format!(
            "credits must be positive, got {credits}"
        )));
    }
    Ok(-credits)
}
