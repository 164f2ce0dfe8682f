//! Entitlement checks.
//!
//! These only read. Quota is consumed separately through
//! [`Engine::consume`] once the caller's action has actually happened.

use z_ledger_core::{
    resolve_capability, resolve_feature, resolve_message, AccountFacts, Capability, Entitlement,
    Feature, MessageContext, Result,
};

use crate::Engine;

impl Engine {
    /// Can the account use a metered feature right now, and how much is left.
    ///
    /// # Errors
    ///
    /// Returns an error if the counter cannot be read.
    pub fn can_use(&self, facts: &AccountFacts, feature: Feature) -> Result<Entitlement> {
        let snapshot = self.peek(facts, feature)?;
        Ok(resolve_feature(&self.catalog, facts, &snapshot))
    }

    /// Can the account send a message in the given conversation context.
    ///
    /// # Errors
    ///
    /// Returns an error if the message counter cannot be read.
    pub fn can_message(
        &self,
        facts: &AccountFacts,
        context: &MessageContext,
    ) -> Result<Entitlement> {
        let snapshot = self.peek(facts, Feature::Messages)?;
        Ok(resolve_message(&self.catalog, facts, context, &snapshot))
    }

    /// Does the account's plan grant a capability.
    #[must_use]
    pub fn capability(&self, facts: &AccountFacts, capability: Capability) -> Entitlement {
        resolve_capability(&self.catalog, facts, capability)
    }
}
