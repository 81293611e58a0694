//! Common test utilities for tea rotation integration tests.

#![allow(dead_code)] // Some utilities are used by different test files

use std::sync::Arc;

use axum::http::{HeaderName, HeaderValue};
use axum::Router;
use axum_test::TestServer;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::json;

use tea_rotation_core::{SessionId, User, UserId};
use tea_rotation_service::auth::JwtClaims;
use tea_rotation_service::{create_router, AppState, ServiceConfig};
use tea_rotation_store::MemoryStore;

pub const JWT_SECRET: &str = "test-jwt-secret";
pub const ADMIN_KEY: &str = "test-admin-key";

/// Test harness containing everything needed for integration tests.
pub struct TestHarness {
    /// The test server for making HTTP requests.
    pub server: TestServer,
    /// Direct handle on the store for seeding and assertions.
    pub store: Arc<MemoryStore>,
}

impl TestHarness {
    /// Create a new test harness with an empty store.
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    /// Create a harness after adjusting the default test configuration.
    pub fn with_config(adjust: impl FnOnce(&mut ServiceConfig)) -> Self {
        let store = Arc::new(MemoryStore::new());

        let mut config = ServiceConfig {
            listen_addr: "127.0.0.1:0".into(),
            jwt_secret: Some(JWT_SECRET.into()),
            admin_api_key: Some(ADMIN_KEY.into()),
            ..ServiceConfig::default()
        };
        adjust(&mut config);

        let state = AppState::new(store.clone(), config);
        let router: Router = create_router(state);

        let server = TestServer::new(router).expect("Failed to create test server");

        Self { server, store }
    }

    /// Insert a user with existing rotation history.
    pub async fn seed_user(&self, name: &str, drink_count: i64, bought: i64) -> User {
        let mut user = User::new(name);
        user.drink_count = drink_count;
        user.total_drinks_bought = bought;
        self.store.insert_user(user.clone()).await;
        user
    }

    /// Start a session through the API.
    pub async fn start_session(&self) -> SessionId {
        let response = self.server.post("/v1/sessions").await;
        response.assert_status_ok();
        let body: serde_json::Value = response.json();
        body["id"]
            .as_str()
            .expect("session id")
            .parse()
            .expect("valid session id")
    }

    /// Place an order through the API.
    pub async fn order(&self, session: SessionId, user: UserId, drink: &str, excused: bool) {
        self.server
            .put(&format!("/v1/sessions/{session}/orders/{user}"))
            .json(&json!({ "drink_type": drink, "is_excused": excused }))
            .await
            .assert_status_ok();
    }

    /// Fetch a user through the API.
    pub async fn user_json(&self, user: UserId) -> serde_json::Value {
        let response = self.server.get(&format!("/v1/users/{user}")).await;
        response.assert_status_ok();
        response.json()
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// `Authorization` header name.
pub fn authorization() -> HeaderName {
    axum::http::header::AUTHORIZATION
}

/// A bearer header carrying a valid HS256 token for `subject`.
pub fn bearer_for(subject: &str) -> HeaderValue {
    let claims = JwtClaims {
        sub: subject.into(),
        exp: chrono::Utc::now().timestamp() + 3600,
    };
    let token = encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .expect("Failed to sign token");
    HeaderValue::from_str(&format!("Bearer {token}")).expect("valid header")
}

/// `X-Admin-Key` header name.
pub fn admin_key_header() -> HeaderName {
    HeaderName::from_static("x-admin-key")
}

/// Header value from a static string.
pub fn value(raw: &'static str) -> HeaderValue {
    HeaderValue::from_static(raw)
}
