//! Plan catalog for z-ledger.
//!
//! The catalog is a static table keyed by `(tier, verified)`. It holds numeric
//! limits for metered features and booleans for capabilities. The resolver and
//! the ledger only ever look values up here; changing a limit is a data change.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, Result};

// ============================================================================
// Tiers
// ============================================================================

/// Subscription tier supplied by the identity collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanTier {
    /// No subscription.
    Free,
    /// Gold subscription.
    Gold,
    /// Diamond subscription.
    Diamond,
    /// Couple subscription, ranked with Diamond.
    Couple,
}

impl PlanTier {
    /// Every tier, lowest rank first.
    pub const ALL: [PlanTier; 4] = [Self::Free, Self::Gold, Self::Diamond, Self::Couple];

    /// Position in the tier hierarchy. Diamond and Couple share a rank.
    #[must_use]
    pub const fn rank(self) -> u8 {
        match self {
            Self::Free => 0,
            Self::Gold => 1,
            Self::Diamond | Self::Couple => 2,
        }
    }

    /// Check if this tier is at least `other` in the hierarchy.
    #[must_use]
    pub const fn is_at_least(self, other: PlanTier) -> bool {
        self.rank() >= other.rank()
    }

    /// Any tier above Free.
    #[must_use]
    pub const fn is_premium(self) -> bool {
        self.rank() > 0
    }

    /// Get the tier name as a string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Gold => "gold",
            Self::Diamond => "diamond",
            Self::Couple => "couple",
        }
    }
}

impl fmt::Display for PlanTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Limits
// ============================================================================

/// A numeric cap, or the unlimited sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Limit {
    /// At most this many uses per period.
    Finite(u32),
    /// No cap.
    Unlimited,
}

impl Limit {
    /// Whether `count` prior uses still leave room for one more.
    #[must_use]
    pub const fn permits(self, count: u32) -> bool {
        match self {
            Self::Finite(max) => count < max,
            Self::Unlimited => true,
        }
    }

    /// Uses left after `count`.
    #[must_use]
    pub const fn remaining(self, count: u32) -> Limit {
        match self {
            Self::Finite(max) => Self::Finite(max.saturating_sub(count)),
            Self::Unlimited => Self::Unlimited,
        }
    }

    /// A zero cap: the feature is not available at all.
    #[must_use]
    pub const fn is_blocked(self) -> bool {
        matches!(self, Self::Finite(0))
    }
}

impl fmt::Display for Limit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Finite(n) => write!(f, "{n}"),
            Self::Unlimited => f.write_str("unlimited"),
        }
    }
}

// Serialized as a number, or the string "unlimited".
impl Serialize for Limit {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Self::Finite(n) => serializer.serialize_u32(*n),
            Self::Unlimited => serializer.serialize_str("unlimited"),
        }
    }
}

impl<'de> Deserialize<'de> for Limit {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(u32),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Number(n) => Ok(Self::Finite(n)),
            Raw::Text(s) if s == "unlimited" => Ok(Self::Unlimited),
            Raw::Text(s) => Err(serde::de::Error::custom(format!("invalid limit: {s}"))),
        }
    }
}

// ============================================================================
// Features and capabilities
// ============================================================================

/// Counting window for a metered feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Period {
    /// One calendar day.
    Day,
    /// One calendar month.
    Month,
}

/// A metered feature with a per-period cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    /// Direct messages sent.
    Messages,
    /// Stories posted.
    Stories,
    /// Events created.
    Events,
}

impl Feature {
    /// Every metered feature.
    pub const ALL: [Feature; 3] = [Self::Messages, Self::Stories, Self::Events];

    /// The window the feature's counter rolls over on.
    #[must_use]
    pub const fn period(self) -> Period {
        match self {
            Self::Messages | Self::Stories => Period::Day,
            Self::Events => Period::Month,
        }
    }

    /// Get the feature name as a string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Messages => "messages",
            Self::Stories => "stories",
            Self::Events => "events",
        }
    }

    /// Stable one-byte code used in storage keys.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::Messages => 1,
            Self::Stories => 2,
            Self::Events => 3,
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A boolean capability gated purely on plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Voice and video calls.
    Call,
    /// Creating group conversations.
    CreateGroups,
    /// Earning from content.
    Monetize,
}

// ============================================================================
// Catalog
// ============================================================================

/// Limits and capabilities for one `(tier, verified)` entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanLimits {
    /// Messages per day.
    pub messages_per_day: Limit,
    /// Stories per day.
    pub stories_per_day: Limit,
    /// Events per month.
    pub events_per_month: Limit,
    /// May place calls.
    pub can_call: bool,
    /// May create groups.
    pub can_create_groups: bool,
    /// May monetize content.
    pub can_monetize: bool,
}

impl PlanLimits {
    /// The cap for a metered feature.
    #[must_use]
    pub const fn limit(&self, feature: Feature) -> Limit {
        match feature {
            Feature::Messages => self.messages_per_day,
            Feature::Stories => self.stories_per_day,
            Feature::Events => self.events_per_month,
        }
    }

    /// Whether a capability is granted.
    #[must_use]
    pub const fn allows(&self, capability: Capability) -> bool {
        match capability {
            Capability::Call => self.can_call,
            Capability::CreateGroups => self.can_create_groups,
            Capability::Monetize => self.can_monetize,
        }
    }
}

/// One row of a catalog file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Tier this row applies to.
    pub tier: PlanTier,
    /// Verification status this row applies to.
    pub verified: bool,
    /// Limits for the pair.
    #[serde(flatten)]
    pub limits: PlanLimits,
}

/// Immutable `(tier, verified)` → limits table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanCatalog {
    entries: HashMap<(PlanTier, bool), PlanLimits>,
}

impl PlanCatalog {
    /// Build a catalog from explicit rows.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Configuration` if any `(tier, verified)` pair is
    /// missing or duplicated, or if a couple row differs from its diamond row.
    pub fn from_entries(rows: Vec<CatalogEntry>) -> Result<Self> {
        let mut entries = HashMap::with_capacity(rows.len());
        for row in rows {
            if entries.insert((row.tier, row.verified), row.limits).is_some() {
                return Err(LedgerError::Configuration(format!(
                    "duplicate catalog entry for {} (verified={})",
                    row.tier, row.verified
                )));
            }
        }

        for tier in PlanTier::ALL {
            for verified in [false, true] {
                if !entries.contains_key(&(tier, verified)) {
                    return Err(LedgerError::Configuration(format!(
                        "missing catalog entry for {tier} (verified={verified})"
                    )));
                }
            }
        }

        for verified in [false, true] {
            if entries.get(&(PlanTier::Couple, verified))
                != entries.get(&(PlanTier::Diamond, verified))
            {
                return Err(LedgerError::Configuration(format!(
                    "couple limits must equal diamond limits (verified={verified})"
                )));
            }
        }

        Ok(Self { entries })
    }

    /// Parse a catalog from a JSON array of rows.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Configuration` on malformed or incomplete input.
    pub fn from_json(json: &str) -> Result<Self> {
        let rows: Vec<CatalogEntry> = serde_json::from_str(json)
            .map_err(|e| LedgerError::Configuration(format!("invalid plan catalog: {e}")))?;
        Self::from_entries(rows)
    }

    /// Look up the limits for a tier and verification status.
    #[must_use]
    pub fn limits(&self, tier: PlanTier, verified: bool) -> &PlanLimits {
        // Construction guarantees every pair is present.
        &self.entries[&(tier, verified)]
    }

    /// All rows, lowest tier first, unverified before verified.
    #[must_use]
    pub fn entries(&self) -> Vec<CatalogEntry> {
        PlanTier::ALL
            .into_iter()
            .flat_map(|tier| {
                [false, true].into_iter().map(move |verified| (tier, verified))
            })
            .map(|(tier, verified)| CatalogEntry {
                tier,
                verified,
                limits: *self.limits(tier, verified),
            })
            .collect()
    }

    /// Lowest-ranked tier whose entry satisfies `predicate` for the given
    /// verification status.
    #[must_use]
    pub fn lowest_tier_where(
        &self,
        verified: bool,
        predicate: impl Fn(PlanTier, &PlanLimits) -> bool,
    ) -> Option<PlanTier> {
        PlanTier::ALL
            .into_iter()
            .find(|tier| predicate(*tier, self.limits(*tier, verified)))
    }
}

impl Default for PlanCatalog {
    fn default() -> Self {
        use Limit::{Finite, Unlimited};

        let row = |tier, verified, messages, stories, events, call, groups, monetize| CatalogEntry {
            tier,
            verified,
            limits: PlanLimits {
                messages_per_day: messages,
                stories_per_day: stories,
                events_per_month: events,
                can_call: call,
                can_create_groups: groups,
                can_monetize: monetize,
            },
        };

        let mut rows = vec![
            row(PlanTier::Free, false, Finite(20), Finite(0), Finite(0), false, false, false),
            row(PlanTier::Free, true, Finite(40), Finite(1), Finite(1), false, false, false),
            row(PlanTier::Gold, false, Finite(100), Finite(3), Finite(2), true, true, false),
            row(PlanTier::Gold, true, Unlimited, Finite(5), Finite(4), true, true, true),
        ];
        for tier in [PlanTier::Diamond, PlanTier::Couple] {
            rows.push(row(tier, false, Unlimited, Finite(10), Finite(10), true, true, true));
            rows.push(row(tier, true, Unlimited, Unlimited, Unlimited, true, true, true));
        }

        Self {
            entries: rows
                .into_iter()
                .map(|r| ((r.tier, r.verified), r.limits))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_hierarchy() {
        assert!(PlanTier::Gold.is_at_least(PlanTier::Free));
        assert!(PlanTier::Couple.is_at_least(PlanTier::Diamond));
        assert!(PlanTier::Diamond.is_at_least(PlanTier::Couple));
        assert!(!PlanTier::Gold.is_at_least(PlanTier::Diamond));
        assert!(!PlanTier::Free.is_premium());
    }

    #[test]
    fn verification_unlocks_free_stories() {
        let catalog = PlanCatalog::default();
        assert!(catalog.limits(PlanTier::Free, false).stories_per_day.is_blocked());
        assert_eq!(
            catalog.limits(PlanTier::Free, true).stories_per_day,
            Limit::Finite(1)
        );
    }

    #[test]
    fn verified_gold_has_no_message_cap() {
        let catalog = PlanCatalog::default();
        assert_eq!(
            catalog.limits(PlanTier::Gold, false).messages_per_day,
            Limit::Finite(100)
        );
        assert_eq!(
            catalog.limits(PlanTier::Gold, true).messages_per_day,
            Limit::Unlimited
        );
    }

    #[test]
    fn couple_matches_diamond() {
        let catalog = PlanCatalog::default();
        for verified in [false, true] {
            assert_eq!(
                catalog.limits(PlanTier::Couple, verified),
                catalog.limits(PlanTier::Diamond, verified)
            );
        }
    }

    #[test]
    fn limit_arithmetic() {
        assert!(Limit::Finite(5).permits(4));
        assert!(!Limit::Finite(5).permits(5));
        assert!(Limit::Unlimited.permits(u32::MAX));
        assert_eq!(Limit::Finite(5).remaining(7), Limit::Finite(0));
    }

    #[test]
    fn limit_serde() {
        assert_eq!(serde_json::to_string(&Limit::Finite(3)).unwrap(), "3");
        assert_eq!(serde_json::to_string(&Limit::Unlimited).unwrap(), "\"unlimited\"");
        assert_eq!(serde_json::from_str::<Limit>("\"unlimited\"").unwrap(), Limit::Unlimited);
        assert!(serde_json::from_str::<Limit>("\"lots\"").is_err());
    }

    #[test]
    fn catalog_json_roundtrip() {
        let catalog = PlanCatalog::default();
        let json = serde_json::to_string(&catalog.entries()).unwrap();
        assert_eq!(PlanCatalog::from_json(&json).unwrap(), catalog);
    }

    #[test]
    fn incomplete_catalog_is_rejected() {
        let mut rows = PlanCatalog::default().entries();
        rows.pop();
        assert!(matches!(
            PlanCatalog::from_entries(rows),
            Err(LedgerError::Configuration(_))
        ));
    }

    #[test]
    fn couple_rows_must_match_diamond() {
        let mut rows = serde_json::to_value(PlanCatalog::default().entries()).unwrap();
        for row in rows.as_array_mut().unwrap() {
            if row["tier"] == "couple" && row["verified"] == true {
                row["messages_per_day"] = serde_json::json!(1);
            }
        }

        match PlanCatalog::from_json(&rows.to_string()) {
            Err(LedgerError::Configuration(msg)) => assert!(msg.contains("couple")),
            other => panic!("expected Configuration, got {other:?}"),
        }
    }

    #[test]
    fn lowest_tier_for_calls() {
        let catalog = PlanCatalog::default();
        assert_eq!(
            catalog.lowest_tier_where(false, |_, l| l.can_call),
            Some(PlanTier::Gold)
        );
        assert_eq!(
            catalog.lowest_tier_where(false, |_, l| l.can_monetize),
            Some(PlanTier::Diamond)
        );
        assert_eq!(
            catalog.lowest_tier_where(true, |_, l| l.can_monetize),
            Some(PlanTier::Gold)
        );
    }
}
