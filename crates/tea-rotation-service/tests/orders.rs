//! Order placement integration tests.

mod common;

use chrono::{Duration, Utc};
use common::TestHarness;
use serde_json::json;
use tea_rotation_store::{CommitClaim, Store};

#[tokio::test]
async fn place_order_applies_defaults() {
    let harness = TestHarness::new();
    let alice = harness.seed_user("Alice", 0, 0).await;
    let session = harness.start_session().await;

    let response = harness
        .server
        .put(&format!("/v1/sessions/{session}/orders/{}", alice.id))
        .json(&json!({}))
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["drink_type"], "Tea");
    assert_eq!(body["sugar_level"], "Normal");
    assert_eq!(body["is_excused"], false);
}

#[tokio::test]
async fn omitted_fields_reuse_last_committed_preferences() {
    let harness = TestHarness::new();
    let alice = harness.seed_user("Alice", 0, 0).await;
    let first = harness.start_session().await;
    harness
        .server
        .put(&format!("/v1/sessions/{first}/orders/{}", alice.id))
        .json(&json!({ "drink_type": "Coffee", "sugar_level": "Less" }))
        .await
        .assert_status_ok();
    harness
        .server
        .post("/v1/summarize")
        .json(&json!({
            "session_id": first.to_string(),
            "confirm_assignee": alice.id.to_string(),
        }))
        .await
        .assert_status_ok();

    let second = harness.start_session().await;
    let response = harness
        .server
        .put(&format!("/v1/sessions/{second}/orders/{}", alice.id))
        .json(&json!({}))
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["drink_type"], "Coffee");
    assert_eq!(body["sugar_level"], "Less");

    let mixed: serde_json::Value = harness
        .server
        .put(&format!("/v1/sessions/{second}/orders/{}", alice.id))
        .json(&json!({ "drink_type": "Tea" }))
        .await
        .json();
    assert_eq!(mixed["drink_type"], "Tea");
    assert_eq!(mixed["sugar_level"], "Less");
}

#[tokio::test]
async fn claimed_session_rejects_order_changes() {
    let harness = TestHarness::new();
    let alice = harness.seed_user("Alice", 0, 0).await;
    let session = harness.start_session().await;
    harness.order(session, alice.id, "Tea", false).await;

    let claim = CommitClaim::new(Utc::now(), Duration::seconds(60));
    harness.store.claim_session(&session, &claim).await.unwrap();

    let path = format!("/v1/sessions/{session}/orders/{}", alice.id);
    harness
        .server
        .put(&path)
        .json(&json!({ "drink_type": "Coffee" }))
        .await
        .assert_status(axum::http::StatusCode::CONFLICT);
    let response = harness.server.delete(&path).await;
    response.assert_status(axum::http::StatusCode::CONFLICT);
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"], "Session is no longer accepting orders.");
}

#[tokio::test]
async fn placing_again_replaces_the_order() {
    let harness = TestHarness::new();
    let alice = harness.seed_user("Alice", 0, 0).await;
    let session = harness.start_session().await;
    harness.order(session, alice.id, "Tea", false).await;

    harness
        .server
        .put(&format!("/v1/sessions/{session}/orders/{}", alice.id))
        .json(&json!({ "drink_type": "Coffee", "sugar_level": "Less" }))
        .await
        .assert_status_ok();

    let body: serde_json::Value = harness
        .server
        .get(&format!("/v1/sessions/{session}/orders"))
        .await
        .json();
    let orders = body.as_array().unwrap();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0]["drink_type"], "Coffee");
    assert_eq!(orders[0]["sugar_level"], "Less");
    assert_eq!(orders[0]["user_name"], "Alice");
}

#[tokio::test]
async fn order_for_unknown_user_is_404() {
    let harness = TestHarness::new();
    let session = harness.start_session().await;

    harness
        .server
        .put(&format!(
            "/v1/sessions/{session}/orders/{}",
            tea_rotation_core::UserId::generate()
        ))
        .json(&json!({}))
        .await
        .assert_status_not_found();
}

#[tokio::test]
async fn completed_session_rejects_orders() {
    let harness = TestHarness::new();
    let alice = harness.seed_user("Alice", 0, 0).await;
    let bob = harness.seed_user("Bob", 0, 0).await;
    let session = harness.start_session().await;
    harness.order(session, alice.id, "Tea", false).await;
    harness
        .server
        .post("/v1/summarize")
        .json(&json!({
            "session_id": session.to_string(),
            "confirm_assignee": alice.id.to_string(),
        }))
        .await
        .assert_status_ok();

    let response = harness
        .server
        .put(&format!("/v1/sessions/{session}/orders/{}", bob.id))
        .json(&json!({}))
        .await;

    response.assert_status(axum::http::StatusCode::CONFLICT);
}

#[tokio::test]
async fn revoke_order_removes_it() {
    let harness = TestHarness::new();
    let alice = harness.seed_user("Alice", 0, 0).await;
    let session = harness.start_session().await;
    harness.order(session, alice.id, "Tea", false).await;

    let path = format!("/v1/sessions/{session}/orders/{}", alice.id);
    let response = harness.server.delete(&path).await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["deleted"], true);

    harness.server.delete(&path).await.assert_status_not_found();

    let orders: serde_json::Value = harness
        .server
        .get(&format!("/v1/sessions/{session}/orders"))
        .await
        .json();
    assert_eq!(orders, json!([]));
}

#[tokio::test]
async fn excused_order_is_listed_but_not_a_candidate() {
    let harness = TestHarness::new();
    let alice = harness.seed_user("Alice", 5, 1).await;
    let bob = harness.seed_user("Bob", 1, 1).await;
    let session = harness.start_session().await;
    harness.order(session, alice.id, "Tea", true).await;
    harness.order(session, bob.id, "Tea", false).await;

    let orders: serde_json::Value = harness
        .server
        .get(&format!("/v1/sessions/{session}/orders"))
        .await
        .json();
    assert_eq!(orders.as_array().unwrap().len(), 2);

    let proposal: serde_json::Value = harness
        .server
        .post("/v1/summarize")
        .json(&json!({ "session_id": session.to_string() }))
        .await
        .json();
    let candidates = proposal["candidates"].as_array().unwrap();
    assert_eq!(candidates.len(), 1);
    assert_eq!(candidates[0]["name"], "Bob");
}
