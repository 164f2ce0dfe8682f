//! Ledger and spend orchestration integration tests.

mod common;

use common::TestEngine;
use z_ledger_core::{
    DomainEventKind, LedgerError, Reference, ReferenceType, TransactionType, UserId,
};

fn unlock(id: &str) -> Reference {
    Reference::new(ReferenceType::Custom("profile_unlock".into()), id)
}

// ============================================================================
// Accounts
// ============================================================================

#[test]
fn concurrent_first_touch_creates_one_account() {
    let t = TestEngine::new();
    let user_id = UserId::generate();

    let accounts: Vec<_> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..16)
            .map(|_| s.spawn(|| t.engine.ensure_account(&user_id)))
            .collect();
        handles.into_iter().map(|h| h.join().unwrap().unwrap()).collect()
    });

    assert!(accounts.iter().all(|a| a == &accounts[0]));
    assert_eq!(accounts[0].balance, 0);
    assert_eq!(t.engine.transactions(&user_id, 10, 0).unwrap().len(), 0);
    t.engine.verify_account(&user_id).unwrap();
}

#[test]
fn account_read_does_not_create() {
    let t = TestEngine::new();
    let user_id = UserId::generate();
    assert!(t.engine.account(&user_id).unwrap().is_none());
    assert!(matches!(
        t.engine.verify_account(&user_id),
        Err(LedgerError::NotFound { .. })
    ));
}

// ============================================================================
// Balance arithmetic
// ============================================================================

#[test]
fn balance_equals_sum_of_committed_amounts() {
    let t = TestEngine::new();
    let user_id = t.funded_user(200);

    t.engine.spend(user_id, 45, unlock("a")).unwrap();
    t.engine.grant_bonus(user_id, 15, "welcome").unwrap();
    assert!(t.engine.spend(user_id, 1_000, unlock("b")).is_err());
    t.engine.refund(user_id, 20, unlock("a")).unwrap();
    let last = t.engine.spend(user_id, 10, unlock("c")).unwrap();

    let account = t.engine.account(&user_id).unwrap().unwrap();
    let ledger = t.engine.transactions(&user_id, 100, 0).unwrap();
    let sum: i64 = ledger.iter().map(|tx| tx.amount).sum();

    assert_eq!(account.balance, sum);
    assert_eq!(account.balance, last.balance_after);
    assert_eq!(account.balance, 180);
    assert_eq!(account.total_spent, 35);

    let totals = t.engine.verify_account(&user_id).unwrap();
    assert_eq!(totals.bonus, 15);
    assert_eq!(totals.transactions, 5);
}

#[test]
fn overdraft_changes_nothing() {
    let t = TestEngine::new();
    let user_id = t.funded_user(10);

    let err = t
        .engine
        .apply_transaction(user_id, TransactionType::Spend, -50, unlock("x"))
        .unwrap_err();

    assert!(matches!(
        err,
        LedgerError::InsufficientCredits {
            balance: 10,
            required: 50
        }
    ));
    assert_eq!(t.engine.account(&user_id).unwrap().unwrap().balance, 10);
    assert_eq!(t.engine.transactions(&user_id, 10, 0).unwrap().len(), 1);
}

#[test]
fn wrong_sign_is_rejected_before_storage() {
    let t = TestEngine::new();
    let user_id = t.funded_user(10);
    let result = t
        .engine
        .apply_transaction(user_id, TransactionType::Spend, 5, unlock("x"));
    assert!(matches!(result, Err(LedgerError::InvalidAmount(_))));
    assert_eq!(t.engine.transactions(&user_id, 10, 0).unwrap().len(), 1);
}

#[test]
fn refund_cannot_exceed_spending() {
    let t = TestEngine::new();
    let user_id = t.funded_user(100);
    t.engine.spend(user_id, 10, unlock("a")).unwrap();

    let result = t.engine.refund(user_id, 11, unlock("a"));
    assert!(matches!(result, Err(LedgerError::InvalidAmount(_))));
    assert_eq!(t.engine.account(&user_id).unwrap().unwrap().balance, 90);
}

#[test]
fn concurrent_spends_cannot_double_spend() {
    let t = TestEngine::new();
    let user_id = t.funded_user(100);

    let results: Vec<_> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..12)
            .map(|i| {
                let engine = &t.engine;
                s.spawn(move || engine.spend(user_id, 25, unlock(&i.to_string())))
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let ok = results.iter().filter(|r| r.is_ok()).count();
    let short = results
        .iter()
        .filter(|r| matches!(r, Err(LedgerError::InsufficientCredits { .. })))
        .count();
    assert_eq!(ok, 4);
    assert_eq!(short, 8);
    assert_eq!(t.engine.account(&user_id).unwrap().unwrap().balance, 0);
    t.engine.verify_account(&user_id).unwrap();
}

// ============================================================================
// Purchases
// ============================================================================

#[test]
fn purchase_is_idempotent_on_event_id() {
    let t = TestEngine::new();
    let user_id = UserId::generate();
    let mut events = t.engine.events().subscribe();

    let tx = t.engine.purchase(user_id, 500, "pay_123").unwrap();
    assert_eq!(tx.balance_after, 500);

    let replay = t.engine.purchase(user_id, 500, "pay_123");
    assert!(matches!(replay, Err(LedgerError::DuplicateEvent { .. })));

    let account = t.engine.account(&user_id).unwrap().unwrap();
    assert_eq!(account.balance, 500);
    assert_eq!(account.total_purchased, 500);

    let event = events.try_recv().unwrap();
    assert_eq!(event.kind, DomainEventKind::CreditsPurchased);
    assert_eq!(event.amount, 500);
    assert!(events.try_recv().is_err());
}

// ============================================================================
// Gifts
// ============================================================================

#[test]
fn gift_moves_credits_symmetrically() {
    let t = TestEngine::new();
    let sender = t.funded_user(100);
    let recipient = t.funded_user(0);
    let mut events = t.engine.events().subscribe();

    let receipt = t.engine.gift_seal(sender, recipient, 30, "rose").unwrap();
    assert_eq!(receipt.sent.amount, -30);
    assert_eq!(receipt.received.amount, 30);
    assert_eq!(receipt.sent.counterparty_user_id, Some(recipient));
    assert_eq!(receipt.received.counterparty_user_id, Some(sender));

    let a = t.engine.account(&sender).unwrap().unwrap();
    let b = t.engine.account(&recipient).unwrap().unwrap();
    assert_eq!(a.total_gifted, 30);
    assert_eq!(a.balance, 70);
    assert_eq!(b.total_received, 30);
    assert_eq!(b.balance, 30);

    t.engine.verify_account(&sender).unwrap();
    t.engine.verify_account(&recipient).unwrap();

    let event = events.try_recv().unwrap();
    assert_eq!(event.kind, DomainEventKind::SealGifted);
    assert_eq!(event.user_id, recipient);
}

#[test]
fn unaffordable_gift_commits_neither_leg() {
    let t = TestEngine::new();
    let sender = t.funded_user(10);
    let recipient = UserId::generate();

    let result = t.engine.gift_seal(sender, recipient, 30, "rose");
    assert!(matches!(result, Err(LedgerError::InsufficientCredits { .. })));
    assert!(t.engine.account(&recipient).unwrap().is_none());
    assert_eq!(t.engine.account(&sender).unwrap().unwrap().balance, 10);
}

#[test]
fn self_gift_is_rejected() {
    let t = TestEngine::new();
    let user_id = t.funded_user(100);
    assert!(matches!(
        t.engine.gift_seal(user_id, user_id, 10, "rose"),
        Err(LedgerError::SelfGift)
    ));
}

#[test]
fn crossing_gifts_do_not_deadlock() {
    let t = TestEngine::new();
    let a = t.funded_user(1_000);
    let b = t.funded_user(1_000);

    std::thread::scope(|s| {
        for i in 0..8 {
            let engine = &t.engine;
            let (from, to) = if i % 2 == 0 { (a, b) } else { (b, a) };
            s.spawn(move || {
                for _ in 0..25 {
                    engine.gift_seal(from, to, 1, "pebble").unwrap();
                }
            });
        }
    });

    let total = t.engine.account(&a).unwrap().unwrap().balance
        + t.engine.account(&b).unwrap().unwrap().balance;
    assert_eq!(total, 2_000);
    t.engine.verify_account(&a).unwrap();
    t.engine.verify_account(&b).unwrap();
}
