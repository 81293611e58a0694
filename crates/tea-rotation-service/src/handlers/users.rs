//! User handlers.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;

use tea_rotation_core::{normalize_name, NewUser, User};

use super::parse_user_id;
use crate::error::ApiError;
use crate::state::AppState;

/// Create user request.
#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    /// Display name. Trimmed before storing.
    pub name: String,
    /// External auth subject to link (optional).
    #[serde(default)]
    pub auth_user_id: Option<String>,
}

/// List all users.
pub async fn list_users(State(state): State<Arc<AppState>>) -> Result<Json<Vec<User>>, ApiError> {
    let users = state.store.list_users().await?;
    Ok(Json(users))
}

/// Create a user.
///
/// Names are display attributes, but a case-insensitive duplicate is refused
/// so people can tell each other apart in the order list.
pub async fn create_user(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateUserRequest>,
) -> Result<Json<User>, ApiError> {
    let name = normalize_name(&body.name)?;
    let auth_user_id = body
        .auth_user_id
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());

    if !state.store.find_users_by_name(&name).await?.is_empty() {
        return Err(ApiError::Conflict(format!(
            "A user named \"{name}\" already exists."
        )));
    }

    let user = state
        .store
        .create_user(NewUser { name, auth_user_id })
        .await?;

    tracing::info!(user_id = %user.id, name = %user.name, "User created");

    Ok(Json(user))
}

/// Get a single user.
pub async fn get_user(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<User>, ApiError> {
    let user_id = parse_user_id(&user_id)?;
    let user = state
        .store
        .get_user(&user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;
    Ok(Json(user))
}
