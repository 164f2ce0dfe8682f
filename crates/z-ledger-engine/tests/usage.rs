//! Usage counter and entitlement integration tests.

mod common;

use chrono::{Duration, TimeZone, Utc};
use common::{facts, noon, TestEngine};
use z_ledger_core::{
    AccountFacts, Calendar, Capability, DenialReason, Feature, LedgerError, Limit,
    MessageContext, PlanTier, UserId,
};
use z_ledger_engine::EngineConfig;

// ============================================================================
// Increment
// ============================================================================

#[test]
fn twenty_racing_increments_against_limit_five() {
    let t = TestEngine::new();
    // Gold + verified: five stories per day.
    let gold = facts(PlanTier::Gold, true);
    assert_eq!(t.engine.limit_for(&gold, Feature::Stories), Limit::Finite(5));

    let results: Vec<_> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..20)
            .map(|_| s.spawn(|| t.engine.consume(&gold, Feature::Stories)))
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let allowed = results.iter().filter(|r| r.is_ok()).count();
    let rejected = results
        .iter()
        .filter(|r| matches!(r, Err(LedgerError::QuotaExceeded { .. })))
        .count();
    assert_eq!(allowed, 5);
    assert_eq!(rejected, 15);
    assert_eq!(t.engine.peek(&gold, Feature::Stories).unwrap().count, 5);
}

#[test]
fn rejected_increment_does_not_count() {
    let t = TestEngine::new();
    let free = facts(PlanTier::Free, true);

    assert!(t.engine.increment(&free, Feature::Stories).unwrap().allowed);
    let second = t.engine.increment(&free, Feature::Stories).unwrap();
    assert!(!second.allowed);
    assert_eq!(second.count, 1);
    assert_eq!(t.engine.peek(&free, Feature::Stories).unwrap().count, 1);
}

#[test]
fn counter_at_limit_yesterday_allows_today() {
    let t = TestEngine::new();
    let gold = facts(PlanTier::Gold, false);

    for _ in 0..3 {
        t.engine.consume(&gold, Feature::Stories).unwrap();
    }
    assert!(t.engine.consume(&gold, Feature::Stories).is_err());

    t.clock.advance(Duration::days(1));
    let today = t.engine.increment(&gold, Feature::Stories).unwrap();
    assert!(today.allowed);
    assert_eq!(today.count, 1);
}

#[test]
fn monthly_feature_rolls_over_on_the_first() {
    let t = TestEngine::new();
    let gold = facts(PlanTier::Gold, false);

    t.clock.set(Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap());
    t.engine.consume(&gold, Feature::Events).unwrap();
    t.clock.set(Utc.with_ymd_and_hms(2026, 3, 30, 9, 0, 0).unwrap());
    t.engine.consume(&gold, Feature::Events).unwrap();
    assert!(t.engine.consume(&gold, Feature::Events).is_err());

    t.clock.set(Utc.with_ymd_and_hms(2026, 4, 1, 0, 0, 0).unwrap());
    assert_eq!(t.engine.consume(&gold, Feature::Events).unwrap().count, 1);
}

#[test]
fn peek_reports_reset_time_and_writes_nothing() {
    let t = TestEngine::new();
    let free = facts(PlanTier::Free, false);

    let snapshot = t.engine.peek(&free, Feature::Messages).unwrap();
    assert_eq!(snapshot.count, 0);
    assert_eq!(snapshot.limit, Limit::Finite(20));
    assert_eq!(snapshot.remaining, Limit::Finite(20));
    assert_eq!(
        snapshot.resets_at,
        Utc.with_ymd_and_hms(2026, 3, 10, 0, 0, 0).unwrap()
    );
    assert!(z_ledger_store::Store::get_counter(&*t.store, &free.user_id, Feature::Messages)
        .unwrap()
        .is_none());
}

#[test]
fn upgrade_takes_effect_mid_day() {
    let t = TestEngine::new();
    let user_id = UserId::generate();
    let free = AccountFacts {
        user_id,
        tier: PlanTier::Free,
        verified: true,
    };
    t.engine.consume(&free, Feature::Stories).unwrap();
    assert!(t.engine.consume(&free, Feature::Stories).is_err());

    let gold = AccountFacts {
        tier: PlanTier::Gold,
        ..free
    };
    let outcome = t.engine.consume(&gold, Feature::Stories).unwrap();
    assert_eq!(outcome.count, 2);
    assert_eq!(outcome.limit, Limit::Finite(5));
}

#[test]
fn day_boundary_follows_configured_offset() {
    let config = EngineConfig {
        calendar: Calendar::with_offset_minutes(120).unwrap(),
        ..EngineConfig::default()
    };
    let t = TestEngine::with_config(config);
    let free = facts(PlanTier::Free, true);

    // 21:30 UTC on the 9th is 23:30 local.
    t.clock.set(Utc.with_ymd_and_hms(2026, 3, 9, 21, 30, 0).unwrap());
    t.engine.consume(&free, Feature::Stories).unwrap();
    assert!(t.engine.consume(&free, Feature::Stories).is_err());

    // 22:30 UTC is already the 10th locally.
    t.clock.set(Utc.with_ymd_and_hms(2026, 3, 9, 22, 30, 0).unwrap());
    assert!(t.engine.consume(&free, Feature::Stories).is_ok());
}

#[test]
fn prune_keeps_recent_counters() {
    let t = TestEngine::new();
    let old = facts(PlanTier::Gold, false);
    let recent = facts(PlanTier::Gold, false);

    t.engine.consume(&old, Feature::Messages).unwrap();
    t.clock.advance(Duration::days(40));
    t.engine.consume(&recent, Feature::Messages).unwrap();

    assert_eq!(t.engine.prune_counters().unwrap(), 1);
    assert_eq!(t.engine.peek(&recent, Feature::Messages).unwrap().count, 1);
}

// ============================================================================
// Entitlements
// ============================================================================

#[test]
fn can_use_reflects_consumed_quota() {
    let t = TestEngine::new();
    let gold = facts(PlanTier::Gold, false);

    let before = t.engine.can_use(&gold, Feature::Stories).unwrap();
    assert!(before.allowed);
    assert_eq!(before.remaining, Some(Limit::Finite(3)));

    for _ in 0..3 {
        t.engine.consume(&gold, Feature::Stories).unwrap();
    }
    let after = t.engine.can_use(&gold, Feature::Stories).unwrap();
    assert!(!after.allowed);
    assert_eq!(after.reason, Some(DenialReason::QuotaExhausted));
    assert_eq!(after.required_tier, Some(PlanTier::Diamond));
}

#[test]
fn can_use_does_not_consume() {
    let t = TestEngine::new();
    let gold = facts(PlanTier::Gold, false);
    for _ in 0..10 {
        t.engine.can_use(&gold, Feature::Stories).unwrap();
    }
    assert_eq!(t.engine.peek(&gold, Feature::Stories).unwrap().count, 0);
}

#[test]
fn free_reply_exception() {
    let t = TestEngine::new();
    let free = facts(PlanTier::Free, false);

    assert!(!t
        .engine
        .can_message(&free, &MessageContext::Initiate)
        .unwrap()
        .allowed);

    let premium_thread = MessageContext::Reply {
        initiator_id: UserId::generate(),
        initiator_tier: PlanTier::Diamond,
    };
    assert!(t.engine.can_message(&free, &premium_thread).unwrap().allowed);
}

#[test]
fn capabilities_are_plan_only() {
    let t = TestEngine::new();
    assert!(t
        .engine
        .capability(&facts(PlanTier::Gold, false), Capability::Call)
        .allowed);
    assert!(!t
        .engine
        .capability(&facts(PlanTier::Free, true), Capability::CreateGroups)
        .allowed);
}

#[test]
fn tomorrow_reads_as_fresh_quota() {
    let t = TestEngine::new();
    let free = facts(PlanTier::Free, true);
    t.engine.consume(&free, Feature::Stories).unwrap();
    assert!(!t.engine.can_use(&free, Feature::Stories).unwrap().allowed);

    t.clock.set(noon(2026, 3, 10));
    assert!(t.engine.can_use(&free, Feature::Stories).unwrap().allowed);
}
