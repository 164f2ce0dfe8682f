//! Entitlement resolution.
//!
//! Everything here is a pure function of the plan catalog, the caller-supplied
//! account facts, and (for metered features) a usage snapshot. Looking up the
//! snapshot and consuming quota are the engine's job.

use serde::{Deserialize, Serialize};

use crate::plan::{Capability, Feature, Limit, PlanCatalog, PlanLimits, PlanTier};
use crate::usage::UsageSnapshot;
use crate::UserId;

/// Account facts supplied by the identity collaborator on every call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountFacts {
    /// Authenticated user.
    pub user_id: UserId,
    /// Current subscription tier.
    pub tier: PlanTier,
    /// Verification status.
    pub verified: bool,
}

impl AccountFacts {
    /// This account's catalog row.
    #[must_use]
    pub fn limits<'a>(&self, catalog: &'a PlanCatalog) -> &'a PlanLimits {
        catalog.limits(self.tier, self.verified)
    }
}

/// Conversation metadata for the message gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageContext {
    /// Starting a new conversation.
    Initiate,
    /// Replying in a conversation someone else started.
    Reply {
        /// Who sent the first message.
        initiator_id: UserId,
        /// The initiator's tier when they started it.
        initiator_tier: PlanTier,
    },
}

/// Why a request was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialReason {
    /// The plan has no allowance for the feature.
    NotInPlan,
    /// The period's allowance is used up.
    QuotaExhausted,
    /// Free accounts cannot start conversations.
    FreeTierCannotInitiate,
    /// Free accounts can only reply to premium initiators.
    InitiatorNotPremium,
}

/// Answer to "can this user do this right now".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entitlement {
    /// Whether the action may proceed.
    pub allowed: bool,
    /// Uses left in the current period. `None` for capabilities.
    pub remaining: Option<Limit>,
    /// Lowest tier that would unblock the action.
    pub required_tier: Option<PlanTier>,
    /// Verifying the account would unblock (or is also needed to unblock) it.
    pub requires_verification: bool,
    /// Why it was denied.
    pub reason: Option<DenialReason>,
}

impl Entitlement {
    fn allow(remaining: Option<Limit>) -> Self {
        Self {
            allowed: true,
            remaining,
            required_tier: None,
            requires_verification: false,
            reason: None,
        }
    }

    fn deny(reason: DenialReason, remaining: Option<Limit>, upgrade: Upgrade) -> Self {
        Self {
            allowed: false,
            remaining,
            required_tier: upgrade.tier,
            requires_verification: upgrade.requires_verification,
            reason: Some(reason),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Upgrade {
    tier: Option<PlanTier>,
    requires_verification: bool,
}

/// Cheapest change to `facts` whose catalog row satisfies `unblocks`.
///
/// A higher tier at the same verification status wins; otherwise verification
/// alone, then verification plus a higher tier.
fn upgrade_path(
    catalog: &PlanCatalog,
    facts: &AccountFacts,
    unblocks: impl Fn(&PlanLimits) -> bool,
) -> Upgrade {
    let above = |tier: PlanTier| tier.rank() > facts.tier.rank();

    if let Some(tier) = catalog.lowest_tier_where(facts.verified, |t, l| above(t) && unblocks(l)) {
        return Upgrade {
            tier: Some(tier),
            requires_verification: false,
        };
    }

    if !facts.verified {
        if unblocks(catalog.limits(facts.tier, true)) {
            return Upgrade {
                tier: None,
                requires_verification: true,
            };
        }
        if let Some(tier) = catalog.lowest_tier_where(true, |t, l| above(t) && unblocks(l)) {
            return Upgrade {
                tier: Some(tier),
                requires_verification: true,
            };
        }
    }

    Upgrade::default()
}

/// Resolve a metered feature against a read-only usage snapshot.
///
/// The snapshot's limit must be this account's current catalog limit.
#[must_use]
pub fn resolve_feature(
    catalog: &PlanCatalog,
    facts: &AccountFacts,
    snapshot: &UsageSnapshot,
) -> Entitlement {
    let feature = snapshot.feature;

    if snapshot.limit.is_blocked() {
        let upgrade = upgrade_path(catalog, facts, |l| !l.limit(feature).is_blocked());
        return Entitlement::deny(DenialReason::NotInPlan, Some(snapshot.remaining), upgrade);
    }

    if !snapshot.has_room() {
        let count = snapshot.count;
        let upgrade = upgrade_path(catalog, facts, |l| l.limit(feature).permits(count));
        return Entitlement::deny(DenialReason::QuotaExhausted, Some(snapshot.remaining), upgrade);
    }

    Entitlement::allow(Some(snapshot.remaining))
}

/// Resolve a boolean capability. No counter is involved.
#[must_use]
pub fn resolve_capability(
    catalog: &PlanCatalog,
    facts: &AccountFacts,
    capability: Capability,
) -> Entitlement {
    if facts.limits(catalog).allows(capability) {
        return Entitlement::allow(None);
    }
    let upgrade = upgrade_path(catalog, facts, |l| l.allows(capability));
    Entitlement::deny(DenialReason::NotInPlan, None, upgrade)
}

/// Resolve the message gate.
///
/// Free accounts may never initiate, and may reply only when the conversation
/// was started by a premium account. Everyone else is bound by the daily
/// message quota in `snapshot`.
#[must_use]
pub fn resolve_message(
    catalog: &PlanCatalog,
    facts: &AccountFacts,
    context: &MessageContext,
    snapshot: &UsageSnapshot,
) -> Entitlement {
    debug_assert_eq!(snapshot.feature, Feature::Messages);

    if !facts.tier.is_premium() {
        let premium = Upgrade {
            tier: catalog.lowest_tier_where(facts.verified, |t, _| t.is_premium()),
            requires_verification: false,
        };
        match context {
            MessageContext::Initiate => {
                return Entitlement::deny(
                    DenialReason::FreeTierCannotInitiate,
                    Some(snapshot.remaining),
                    premium,
                );
            }
            // Replying to your own conversation is initiating it.
            MessageContext::Reply { initiator_id, .. } if *initiator_id == facts.user_id => {
                return Entitlement::deny(
                    DenialReason::FreeTierCannotInitiate,
                    Some(snapshot.remaining),
                    premium,
                );
            }
            MessageContext::Reply { initiator_tier, .. } if !initiator_tier.is_premium() => {
                return Entitlement::deny(
                    DenialReason::InitiatorNotPremium,
                    Some(snapshot.remaining),
                    premium,
                );
            }
            MessageContext::Reply { .. } => {}
        }
    }

    resolve_feature(catalog, facts, snapshot)
}
