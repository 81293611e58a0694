//! User management integration tests.

mod common;

use common::TestHarness;
use serde_json::json;

#[tokio::test]
async fn create_user_trims_name_and_zeroes_counters() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .post("/v1/users")
        .json(&json!({ "name": "  Alice  " }))
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["name"], "Alice");
    assert_eq!(body["drink_count"], 0);
    assert_eq!(body["total_drinks_bought"], 0);
    assert!(body["last_assigned_at"].is_null());
}

#[tokio::test]
async fn blank_name_is_rejected() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .post("/v1/users")
        .json(&json!({ "name": "   " }))
        .await;

    response.assert_status_bad_request();
}

#[tokio::test]
async fn duplicate_name_ignoring_case_is_409() {
    let harness = TestHarness::new();
    harness
        .server
        .post("/v1/users")
        .json(&json!({ "name": "Alice" }))
        .await
        .assert_status_ok();

    let response = harness
        .server
        .post("/v1/users")
        .json(&json!({ "name": "alice" }))
        .await;

    response.assert_status(axum::http::StatusCode::CONFLICT);
    let body: serde_json::Value = response.json();
    assert_eq!(body["code"], "conflict");
}

#[tokio::test]
async fn list_users_is_sorted_by_name() {
    let harness = TestHarness::new();
    for name in ["carol", "Alice", "bob"] {
        harness
            .server
            .post("/v1/users")
            .json(&json!({ "name": name }))
            .await
            .assert_status_ok();
    }

    let body: serde_json::Value = harness.server.get("/v1/users").await.json();
    let names: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|u| u["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, ["Alice", "bob", "carol"]);
}

#[tokio::test]
async fn get_user_by_id() {
    let harness = TestHarness::new();
    let alice = harness.seed_user("Alice", 2, 1).await;

    let body = harness.user_json(alice.id).await;

    assert_eq!(body["id"], alice.id.to_string());
    assert_eq!(body["drink_count"], 2);
}

#[tokio::test]
async fn unknown_user_is_404() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .get(&format!("/v1/users/{}", tea_rotation_core::UserId::generate()))
        .await;

    response.assert_status_not_found();
}

#[tokio::test]
async fn malformed_user_id_is_400() {
    let harness = TestHarness::new();

    harness
        .server
        .get("/v1/users/not-a-uuid")
        .await
        .assert_status_bad_request();
}
