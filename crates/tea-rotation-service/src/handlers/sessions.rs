//! Session handlers.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use chrono::Utc;
use serde::Serialize;

use tea_rotation_core::{
    completed_grace_cutoff, current_session, OrderBreakdown, OrderWithUser, Session, SessionId,
};

use super::parse_session_id;
use crate::auth::AdminAuth;
use crate::error::ApiError;
use crate::state::AppState;

/// Session summary response.
#[derive(Debug, Serialize)]
pub struct SessionSummaryResponse {
    /// The session.
    pub session: Session,
    /// Every order, excused ones included.
    pub orders: Vec<OrderWithUser>,
    /// Orders grouped by drink and sugar level.
    pub breakdown: OrderBreakdown,
    /// Number of cups to make.
    pub total_cups: usize,
    /// Human-readable preparation instructions.
    pub instructions: String,
}

/// Clear active sessions response.
#[derive(Debug, Serialize)]
pub struct ClearSessionsResponse {
    /// Number of sessions removed.
    pub cleared: u64,
}

/// Start a new session.
pub async fn start_session(State(state): State<Arc<AppState>>) -> Result<Json<Session>, ApiError> {
    let session = state.store.create_session(Utc::now()).await?;
    tracing::info!(session_id = %session.id, "Session started");
    Ok(Json(session))
}

/// The current session: the active one, or one completed within the grace
/// window. `null` when there is none.
pub async fn get_current_session(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Option<Session>>, ApiError> {
    let now = Utc::now();
    let grace = state.config.completed_grace_seconds;

    let active = state.store.active_session().await?;
    let latest_completed = if active.is_some() {
        None
    } else {
        state
            .store
            .latest_completed_since(completed_grace_cutoff(now, grace))
            .await?
    };

    Ok(Json(current_session(active, latest_completed, now, grace)))
}

/// Get a single session.
pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<Session>, ApiError> {
    let session_id = parse_session_id(&session_id)?;
    Ok(Json(load_session(&state, &session_id).await?))
}

/// Summary of a session's orders.
pub async fn get_session_summary(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionSummaryResponse>, ApiError> {
    let session_id = parse_session_id(&session_id)?;
    let session = load_session(&state, &session_id).await?;
    let orders = state.store.list_orders(&session_id).await?;
    let breakdown = OrderBreakdown::from_orders(&orders);

    Ok(Json(SessionSummaryResponse {
        session,
        total_cups: breakdown.total_cups(),
        instructions: breakdown.instructions(),
        breakdown,
        orders,
    }))
}

/// Delete every active session and its orders (admin only).
pub async fn clear_active_sessions(
    State(state): State<Arc<AppState>>,
    admin: AdminAuth,
) -> Result<Json<ClearSessionsResponse>, ApiError> {
    let cleared = state.store.clear_active_sessions().await?;
    tracing::info!(admin_id = %admin.admin_id, cleared, "Active sessions cleared");
    Ok(Json(ClearSessionsResponse { cleared }))
}

/// Load a session or fail with 404.
pub(crate) async fn load_session(
    state: &AppState,
    session_id: &SessionId,
) -> Result<Session, ApiError> {
    state
        .store
        .get_session(session_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Session not found".into()))
}
