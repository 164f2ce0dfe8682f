//! Request and response types for the z-ledger client.
//!
//! Domain values (accounts, transactions, boosts, entitlements) are the
//! `z-ledger-core` types themselves.

use serde::{Deserialize, Serialize};

use z_ledger_core::{
    AccountFacts, Boost, BoostRequest, BoostSubject, Capability, CreditTransaction, Feature,
    MessageContext, TransactionId, UserId,
};

/// Metered feature request.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct FeatureRequest<'a> {
    pub account: &'a AccountFacts,
    pub feature: Feature,
}

/// Message gate request.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct MessageRequest<'a> {
    pub account: &'a AccountFacts,
    pub context: &'a MessageContext,
}

/// Capability request.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct CapabilityRequest<'a> {
    pub account: &'a AccountFacts,
    pub capability: Capability,
}

/// Spend request.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct SpendRequest<'a> {
    pub user_id: UserId,
    pub credits: i64,
    pub reference_type: &'a str,
    pub reference_id: &'a str,
}

/// Boost request in wire form.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct BoostBody {
    pub user_id: UserId,
    pub subject_kind: &'static str,
    pub subject_id: String,
    pub credits: i64,
    pub duration_hours: u32,
}

/// Kind name and ID of a subject, as the boost routes take them.
pub(crate) fn subject_parts(subject: &BoostSubject) -> (&'static str, String) {
    let id = match subject {
        BoostSubject::Story(id) => id.to_string(),
        BoostSubject::Profile(id) => id.to_string(),
    };
    (subject.kind(), id)
}

impl From<&BoostRequest> for BoostBody {
    fn from(request: &BoostRequest) -> Self {
        let (subject_kind, subject_id) = subject_parts(&request.subject);
        Self {
            user_id: request.user_id,
            subject_kind,
            subject_id,
            credits: request.credits,
            duration_hours: request.duration_hours,
        }
    }
}

/// Boost record retry.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct RetryBoostBody {
    pub transaction_id: TransactionId,
    #[serde(flatten)]
    pub request: BoostBody,
}

/// Seal gift request.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct GiftSealRequest<'a> {
    pub sender_id: UserId,
    pub recipient_id: UserId,
    pub cost: i64,
    pub seal_id: &'a str,
}

/// A page of transactions, newest first.
#[derive(Debug, Clone, Deserialize)]
pub struct TransactionPage {
    /// The page.
    pub transactions: Vec<CreditTransaction>,
    /// Whether older transactions remain.
    pub has_more: bool,
}

/// A started boost and the spend that paid for it.
#[derive(Debug, Clone, Deserialize)]
pub struct BoostReceipt {
    /// The live boost.
    pub boost: Boost,
    /// The committed spend.
    pub transaction: CreditTransaction,
}

/// Both legs of a seal gift.
#[derive(Debug, Clone, Deserialize)]
pub struct GiftReceipt {
    /// Debit against the sender.
    pub sent: CreditTransaction,
    /// Credit to the recipient.
    pub received: CreditTransaction,
}

/// Active boost lookup.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ActiveBoostResponse {
    pub boost: Option<Boost>,
}

/// API error response format.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ApiErrorResponse {
    pub error: ApiErrorBody,
}

/// API error body.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ApiErrorBody {
    pub code: String,
    pub message: String,
    #[serde(default)]
    pub details: Option<serde_json::Value>,
}
