//! API handlers.

pub mod health;
pub mod orders;
pub mod sessions;
pub mod summarize;
pub mod users;

use tea_rotation_core::{SessionId, UserId};

use crate::error::ApiError;

/// Parse a session id from a path segment.
pub(crate) fn parse_session_id(raw: &str) -> Result<SessionId, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::BadRequest("Invalid session ID".into()))
}

/// Parse a user id from a path segment.
pub(crate) fn parse_user_id(raw: &str) -> Result<UserId, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::BadRequest("Invalid user ID".into()))
}
