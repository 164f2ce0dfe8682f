//! Account, credit, boost, gift and admin endpoint integration tests.

mod common;

use axum::http::StatusCode;
use common::TestHarness;
use serde_json::json;
use z_ledger_core::{StoryId, TransactionId, UserId};

// ============================================================================
// Accounts
// ============================================================================

#[tokio::test]
async fn get_account_before_ensure_is_not_found() {
    let harness = TestHarness::new();

    harness
        .server
        .get(&format!("/v1/accounts/{}", harness.test_user_id))
        .add_header("x-api-key", TestHarness::service_key())
        .await
        .assert_status_not_found();
}

#[tokio::test]
async fn ensure_account_is_idempotent() {
    let harness = TestHarness::new();
    let path = format!("/v1/accounts/{}", harness.test_user_id);

    let first = harness
        .server
        .put(&path)
        .add_header("x-api-key", TestHarness::service_key())
        .await;
    first.assert_status_ok();
    let first: serde_json::Value = first.json();
    assert_eq!(first["balance"], 0);

    let second: serde_json::Value = harness
        .server
        .put(&path)
        .add_header("x-api-key", TestHarness::service_key())
        .await
        .json();
    assert_eq!(first, second);

    harness
        .server
        .get(&path)
        .add_header("x-api-key", TestHarness::service_key())
        .await
        .assert_status_ok();
}

#[tokio::test]
async fn invalid_user_id_is_bad_request() {
    let harness = TestHarness::new();

    harness
        .server
        .put("/v1/accounts/not-a-uuid")
        .add_header("x-api-key", TestHarness::service_key())
        .await
        .assert_status_bad_request();
}

#[tokio::test]
async fn transactions_paginate_newest_first() {
    let harness = TestHarness::new();
    let user_id = harness.test_user_id;
    harness.fund(user_id, 10);
    harness.fund(user_id, 20);
    harness.fund(user_id, 30);

    let response = harness
        .server
        .get(&format!("/v1/accounts/{user_id}/transactions?limit=2"))
        .add_header("x-api-key", TestHarness::service_key())
        .await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    let transactions = body["transactions"].as_array().unwrap();
    assert_eq!(transactions.len(), 2);
    assert_eq!(transactions[0]["amount"], 30);
    assert_eq!(transactions[1]["amount"], 20);
    assert_eq!(body["has_more"], true);

    let body: serde_json::Value = harness
        .server
        .get(&format!("/v1/accounts/{user_id}/transactions?limit=2&offset=2"))
        .add_header("x-api-key", TestHarness::service_key())
        .await
        .json();
    assert_eq!(body["transactions"].as_array().unwrap().len(), 1);
    assert_eq!(body["has_more"], false);
}

// ============================================================================
// Spend
// ============================================================================

#[tokio::test]
async fn spend_deducts_credits() {
    let harness = TestHarness::new();
    let user_id = harness.test_user_id;
    harness.fund(user_id, 100);

    let response = harness
        .server
        .post("/v1/credits/spend")
        .add_header("x-api-key", TestHarness::service_key())
        .json(&json!({
            "user_id": user_id,
            "credits": 40,
            "reference_type": "profile_unlock",
            "reference_id": "profile-1"
        }))
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["amount"], -40);
    assert_eq!(body["balance_after"], 60);
}

#[tokio::test]
async fn overdraft_is_payment_required() {
    let harness = TestHarness::new();
    let user_id = harness.test_user_id;
    harness.fund(user_id, 10);

    let response = harness
        .server
        .post("/v1/credits/spend")
        .add_header("x-api-key", TestHarness::service_key())
        .json(&json!({
            "user_id": user_id,
            "credits": 50,
            "reference_type": "profile_unlock",
            "reference_id": "profile-1"
        }))
        .await;

    response.assert_status(StatusCode::PAYMENT_REQUIRED);
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"]["code"], "insufficient_credits");
    assert_eq!(body["error"]["details"]["balance"], 10);
    assert_eq!(body["error"]["details"]["required"], 50);

    let account = harness.engine.account(&user_id).unwrap().unwrap();
    assert_eq!(account.balance, 10);
}

#[tokio::test]
async fn generic_spend_cannot_pay_for_a_boost() {
    let harness = TestHarness::new();
    let user_id = harness.test_user_id;
    harness.fund(user_id, 100);

    let response = harness
        .server
        .post("/v1/credits/spend")
        .add_header("x-api-key", TestHarness::service_key())
        .json(&json!({
            "user_id": user_id,
            "credits": 30,
            "reference_type": "story_boost",
            "reference_id": StoryId::generate().to_string()
        }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"]["code"], "bad_request");

    let account = harness.engine.account(&user_id).unwrap().unwrap();
    assert_eq!(account.balance, 100);
}

// ============================================================================
// Boosts
// ============================================================================

#[tokio::test]
async fn boost_then_conflict() {
    let harness = TestHarness::new();
    let user_id = harness.test_user_id;
    harness.fund(user_id, 100);
    let story_id = StoryId::generate();
    let request = json!({
        "user_id": user_id,
        "subject_kind": "story",
        "subject_id": story_id,
        "credits": 20,
        "duration_hours": 24
    });

    let response = harness
        .server
        .post("/v1/boosts")
        .add_header("x-api-key", TestHarness::service_key())
        .json(&request)
        .await;
    response.assert_status_ok();
    let receipt: serde_json::Value = response.json();
    assert_eq!(receipt["transaction"]["balance_after"], 80);
    assert_eq!(receipt["boost"]["subject"]["kind"], "story");
    assert_eq!(receipt["boost"]["expires_at"], "2026-03-10T12:00:00Z");

    let conflict = harness
        .server
        .post("/v1/boosts")
        .add_header("x-api-key", TestHarness::service_key())
        .json(&request)
        .await;
    conflict.assert_status(StatusCode::CONFLICT);
    let body: serde_json::Value = conflict.json();
    assert_eq!(body["error"]["code"], "already_boosted");

    let active: serde_json::Value = harness
        .server
        .get(&format!("/v1/boosts/story/{story_id}"))
        .add_header("x-api-key", TestHarness::service_key())
        .await
        .json();
    assert_eq!(active["active"], true);

    assert_eq!(harness.engine.account(&user_id).unwrap().unwrap().balance, 80);
}

#[tokio::test]
async fn expired_boost_reads_inactive() {
    let harness = TestHarness::new();
    let user_id = harness.test_user_id;
    harness.fund(user_id, 100);

    harness
        .server
        .post("/v1/boosts")
        .add_header("x-api-key", TestHarness::service_key())
        .json(&json!({
            "user_id": user_id,
            "subject_kind": "profile",
            "subject_id": user_id,
            "credits": 10,
            "duration_hours": 1
        }))
        .await
        .assert_status_ok();

    harness.clock.advance(chrono::Duration::hours(2));

    let active: serde_json::Value = harness
        .server
        .get(&format!("/v1/boosts/profile/{user_id}"))
        .add_header("x-api-key", TestHarness::service_key())
        .await
        .json();
    assert_eq!(active["active"], false);
}

#[tokio::test]
async fn invalid_boost_requests_are_bad_requests() {
    let harness = TestHarness::new();
    let user_id = harness.test_user_id;
    harness.fund(user_id, 100);

    for (kind, credits, hours) in [("story", 20, 0), ("story", 20, 169), ("story", 5, 24), ("group", 20, 24)] {
        harness
            .server
            .post("/v1/boosts")
            .add_header("x-api-key", TestHarness::service_key())
            .json(&json!({
                "user_id": user_id,
                "subject_kind": kind,
                "subject_id": StoryId::generate(),
                "credits": credits,
                "duration_hours": hours
            }))
            .await
            .assert_status_bad_request();
    }

    assert_eq!(harness.engine.account(&user_id).unwrap().unwrap().balance, 100);
}

#[tokio::test]
async fn retry_checks_the_transaction() {
    let harness = TestHarness::new();
    let user_id = harness.test_user_id;
    harness.fund(user_id, 100);
    let purchase = harness.engine.transactions(&user_id, 1, 0).unwrap()[0].id;

    let mismatched = harness
        .server
        .post("/v1/boosts/retry")
        .add_header("x-api-key", TestHarness::service_key())
        .json(&json!({
            "transaction_id": purchase,
            "user_id": user_id,
            "subject_kind": "story",
            "subject_id": StoryId::generate(),
            "credits": 20,
            "duration_hours": 24
        }))
        .await;
    mismatched.assert_status_bad_request();

    let missing = harness
        .server
        .post("/v1/boosts/retry")
        .add_header("x-api-key", TestHarness::service_key())
        .json(&json!({
            "transaction_id": TransactionId::generate(),
            "user_id": user_id,
            "subject_kind": "story",
            "subject_id": StoryId::generate(),
            "credits": 20,
            "duration_hours": 24
        }))
        .await;
    missing.assert_status_not_found();
}

// ============================================================================
// Gifts
// ============================================================================

#[tokio::test]
async fn gift_seal_moves_credits() {
    let harness = TestHarness::new();
    let sender = harness.test_user_id;
    let recipient = UserId::generate();
    harness.fund(sender, 100);

    let response = harness
        .server
        .post("/v1/gifts/seals")
        .add_header("x-api-key", TestHarness::service_key())
        .json(&json!({
            "sender_id": sender,
            "recipient_id": recipient,
            "cost": 30,
            "seal_id": "rose"
        }))
        .await;

    response.assert_status_ok();
    let receipt: serde_json::Value = response.json();
    assert_eq!(receipt["sent"]["amount"], -30);
    assert_eq!(receipt["received"]["amount"], 30);
    assert_eq!(harness.engine.account(&recipient).unwrap().unwrap().balance, 30);
}

#[tokio::test]
async fn self_gift_is_bad_request() {
    let harness = TestHarness::new();
    let user_id = harness.test_user_id;
    harness.fund(user_id, 100);

    harness
        .server
        .post("/v1/gifts/seals")
        .add_header("x-api-key", TestHarness::service_key())
        .json(&json!({
            "sender_id": user_id,
            "recipient_id": user_id,
            "cost": 30,
            "seal_id": "rose"
        }))
        .await
        .assert_status_bad_request();
}

// ============================================================================
// Admin
// ============================================================================

#[tokio::test]
async fn admin_endpoints_require_admin_key() {
    let harness = TestHarness::new();

    harness
        .server
        .post("/v1/admin/credits")
        .add_header("x-api-key", TestHarness::service_key())
        .json(&json!({
            "user_id": harness.test_user_id,
            "kind": "bonus",
            "credits": 10,
            "reason": "welcome"
        }))
        .await
        .assert_status_unauthorized();
}

#[tokio::test]
async fn admin_bonus_refund_and_verify() {
    let harness = TestHarness::new();
    let user_id = harness.test_user_id;
    harness.fund(user_id, 100);
    harness
        .engine
        .spend(
            user_id,
            40,
            z_ledger_core::Reference::new(
                z_ledger_core::ReferenceType::Custom("profile_unlock".into()),
                "p",
            ),
        )
        .unwrap();

    let bonus = harness
        .server
        .post("/v1/admin/credits")
        .add_header("x-admin-key", TestHarness::admin_key())
        .json(&json!({ "user_id": user_id, "kind": "bonus", "credits": 15, "reason": "welcome" }))
        .await;
    bonus.assert_status_ok();
    let body: serde_json::Value = bonus.json();
    assert_eq!(body["transaction_type"], "bonus");
    assert_eq!(body["balance_after"], 75);

    harness
        .server
        .post("/v1/admin/credits")
        .add_header("x-admin-key", TestHarness::admin_key())
        .json(&json!({ "user_id": user_id, "kind": "refund", "credits": 50, "reason": "too much" }))
        .await
        .assert_status_bad_request();

    harness
        .server
        .post("/v1/admin/credits")
        .add_header("x-admin-key", TestHarness::admin_key())
        .json(&json!({ "user_id": user_id, "kind": "refund", "credits": 40, "reason": "support" }))
        .await
        .assert_status_ok();

    let response = harness
        .server
        .get(&format!("/v1/admin/accounts/{user_id}/verify"))
        .add_header("x-admin-key", TestHarness::admin_key())
        .await;
    response.assert_status_ok();
    let totals: serde_json::Value = response.json();
    assert_eq!(totals["bonus"], 15);
    assert_eq!(totals["spent"], 0);
    assert_eq!(totals["closing_balance"], 115);
}

#[tokio::test]
async fn verify_missing_account_is_not_found() {
    let harness = TestHarness::new();

    harness
        .server
        .get(&format!("/v1/admin/accounts/{}/verify", UserId::generate()))
        .add_header("x-admin-key", TestHarness::admin_key())
        .await
        .assert_status_not_found();
}
