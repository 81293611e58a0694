//! Router configuration.
//!
//! This module sets up the Axum router with all routes and middleware.

use std::sync::Arc;
use std::time::Duration;

use axum::routing::{delete, get, post, put};
use axum::Router;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{health, orders, sessions, summarize, users};
use crate::state::AppState;

/// Maximum concurrent requests for API endpoints.
const API_MAX_CONCURRENT_REQUESTS: usize = 50;

/// Create the service router with all routes and middleware.
///
/// # Routes
///
/// ## Public
/// - `GET /health` - Health check
///
/// ## Rotation
/// - `POST /v1/summarize` - Propose candidates or commit an assignee
///
/// ## Users
/// - `GET /v1/users` - List users
/// - `POST /v1/users` - Create a user
/// - `GET /v1/users/:id` - Get a user
///
/// ## Sessions
/// - `POST /v1/sessions` - Start a session
/// - `GET /v1/sessions/current` - Current session or `null`
/// - `GET /v1/sessions/:id` - Get a session
/// - `GET /v1/sessions/:id/summary` - Order breakdown
/// - `GET /v1/sessions/:id/orders` - List orders
/// - `PUT /v1/sessions/:id/orders/:user_id` - Place or replace an order
/// - `DELETE /v1/sessions/:id/orders/:user_id` - Revoke an order
///
/// ## Admin (`X-Admin-Key`)
/// - `DELETE /v1/sessions/active` - Clear active sessions
pub fn create_router(state: AppState) -> Router {
    // Extract config values before moving state
    let cors_origins = state.config.cors_origins.clone();
    let max_body_bytes = state.config.max_body_bytes;
    let request_timeout_seconds = state.config.request_timeout_seconds;

    let cors = build_cors_layer(&cors_origins);

    let state = Arc::new(state);

    let api_routes = Router::new()
        .route("/summarize", post(summarize::summarize))
        // Users
        .route("/users", get(users::list_users).post(users::create_user))
        .route("/users/:id", get(users::get_user))
        // Sessions
        .route("/sessions", post(sessions::start_session))
        .route("/sessions/current", get(sessions::get_current_session))
        .route("/sessions/active", delete(sessions::clear_active_sessions))
        .route("/sessions/:id", get(sessions::get_session))
        .route("/sessions/:id/summary", get(sessions::get_session_summary))
        // Orders
        .route("/sessions/:id/orders", get(orders::list_orders))
        .route(
            "/sessions/:id/orders/:user_id",
            put(orders::place_order).delete(orders::delete_order),
        )
        .layer(ConcurrencyLimitLayer::new(API_MAX_CONCURRENT_REQUESTS));

    Router::new()
        // Health (public, no rate limit)
        .route("/health", get(health::health))
        .nest("/v1", api_routes)
        // Global middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(TimeoutLayer::new(Duration::from_secs(
            request_timeout_seconds,
        )))
        .with_state(state)
}

/// Build the CORS layer from configured origins.
///
/// Preflight `OPTIONS` requests are answered by the layer itself.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}
