//! Summarize handler: propose candidates, or commit a confirmed assignee.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;

use tea_rotation_core::UserId;

use crate::auth::Caller;
use crate::engine::{EngineError, SummarizeOutcome, SummarizeRequest};
use crate::error::ApiError;
use crate::state::AppState;

use super::parse_session_id;

/// Summarize request body.
#[derive(Debug, Deserialize)]
pub struct SummarizeBody {
    /// Session to summarize.
    pub session_id: String,
    /// Confirmed assignee. Absent or empty for the propose phase.
    #[serde(default)]
    pub confirm_assignee: Option<String>,
}

impl SummarizeBody {
    fn parse(&self) -> Result<SummarizeRequest, ApiError> {
        let session_id = parse_session_id(&self.session_id)?;
        let confirm_assignee = match self.confirm_assignee.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(raw.parse::<UserId>().map_err(|_| EngineError::InvalidAssignee)?),
        };
        Ok(SummarizeRequest {
            session_id,
            confirm_assignee,
        })
    }
}

/// Run one summarize phase.
pub async fn summarize(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Json(body): Json<SummarizeBody>,
) -> Result<Json<SummarizeOutcome>, ApiError> {
    let request = body.parse()?;

    tracing::debug!(
        session_id = %request.session_id,
        confirm = request.confirm_assignee.is_some(),
        caller = ?caller.subject(),
        "Summarize requested"
    );

    let outcome = state
        .engine
        .summarize(&request, caller.subject(), Utc::now())
        .await?;

    Ok(Json(outcome))
}
