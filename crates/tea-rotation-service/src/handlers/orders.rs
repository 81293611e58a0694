//! Order handlers.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use tea_rotation_core::{Order, OrderWithUser, DEFAULT_DRINK, DEFAULT_SUGAR_LEVEL};

use super::sessions::load_session;
use super::{parse_session_id, parse_user_id};
use crate::error::ApiError;
use crate::state::AppState;

/// Place order request. Every field is optional.
///
/// Omitted drink and sugar fall back to what the user last ordered, then to
/// "Tea" and "Normal".
#[derive(Debug, Default, Deserialize)]
pub struct PlaceOrderRequest {
    /// Drink type.
    #[serde(default)]
    pub drink_type: Option<String>,
    /// Sugar level.
    #[serde(default)]
    pub sugar_level: Option<String>,
    /// Present in the session but not drinking this round.
    #[serde(default)]
    pub is_excused: bool,
}

/// Delete order response.
#[derive(Debug, Serialize)]
pub struct DeleteOrderResponse {
    /// Whether an order was removed.
    pub deleted: bool,
}

/// List a session's orders with user names.
pub async fn list_orders(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<Vec<OrderWithUser>>, ApiError> {
    let session_id = parse_session_id(&session_id)?;
    load_session(&state, &session_id).await?;
    let orders = state.store.list_orders(&session_id).await?;
    Ok(Json(orders))
}

/// Place or replace a user's order in an active session.
///
/// The store refuses the write once the session is completed or a commit
/// has claimed it.
pub async fn place_order(
    State(state): State<Arc<AppState>>,
    Path((session_id, user_id)): Path<(String, String)>,
    Json(body): Json<PlaceOrderRequest>,
) -> Result<Json<Order>, ApiError> {
    let session_id = parse_session_id(&session_id)?;
    let user_id = parse_user_id(&user_id)?;
    load_session(&state, &session_id).await?;
    let user = state
        .store
        .get_user(&user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;

    let drink_type = body
        .drink_type
        .as_deref()
        .and_then(non_blank)
        .or_else(|| user.last_ordered_drink.as_deref().and_then(non_blank))
        .unwrap_or_else(|| DEFAULT_DRINK.to_string());
    let sugar_level = body
        .sugar_level
        .as_deref()
        .and_then(non_blank)
        .or_else(|| user.last_sugar_level.as_deref().and_then(non_blank))
        .unwrap_or_else(|| DEFAULT_SUGAR_LEVEL.to_string());

    let order = Order::new(session_id, user_id, drink_type, sugar_level, body.is_excused);
    state.store.upsert_order(&order).await?;

    tracing::debug!(
        session_id = %session_id,
        user_id = %user_id,
        drink = %order.drink_type,
        excused = order.is_excused,
        "Order placed"
    );

    Ok(Json(order))
}

/// Revoke a user's order from an active session.
pub async fn delete_order(
    State(state): State<Arc<AppState>>,
    Path((session_id, user_id)): Path<(String, String)>,
) -> Result<Json<DeleteOrderResponse>, ApiError> {
    let session_id = parse_session_id(&session_id)?;
    let user_id = parse_user_id(&user_id)?;
    load_session(&state, &session_id).await?;

    let deleted = state.store.delete_order(&session_id, &user_id).await?;
    if !deleted {
        return Err(ApiError::NotFound("Order not found".into()));
    }

    tracing::debug!(session_id = %session_id, user_id = %user_id, "Order revoked");

    Ok(Json(DeleteOrderResponse { deleted }))
}

/// Trimmed value, or `None` when blank.
fn non_blank(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
