//! API error types and responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use tea_rotation_core::CoreError;
use tea_rotation_store::StoreError;

use crate::engine::EngineError;

/// API error type.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Unauthorized - missing or invalid credentials.
    #[error("unauthorized")]
    Unauthorized,

    /// Resource not found.
    #[error("{0}")]
    NotFound(String),

    /// Bad request - invalid input.
    #[error("{0}")]
    BadRequest(String),

    /// Conflict - resource already exists or invalid state transition.
    #[error("{0}")]
    Conflict(String),

    /// Internal server error. The message is passed through to the client.
    #[error("{0}")]
    Internal(String),
}

/// JSON error response body.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
    code: &'static str,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            Self::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized"),
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            Self::Conflict(_) => (StatusCode::CONFLICT, "conflict"),
            Self::Internal(msg) => {
                tracing::error!(error = %msg, "Internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error")
            }
        };

        let body = ErrorResponse {
            error: self.to_string(),
            code,
        };

        (status, Json(body)).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { .. } => Self::NotFound(err.to_string()),
            StoreError::Conflict(msg) => Self::Conflict(msg),
            StoreError::Database(_) | StoreError::Corrupt(_) => Self::Internal(err.to_string()),
        }
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::NoOrdersFound | EngineError::SessionNotFound => {
                Self::NotFound(err.to_string())
            }
            EngineError::InvalidAssignee => Self::BadRequest(err.to_string()),
            EngineError::ConcurrentModification => Self::Conflict(err.to_string()),
            EngineError::DataStore(store) => Self::Internal(store.to_string()),
        }
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::NoOrdersFound => Self::NotFound(err.to_string()),
            CoreError::InvalidId(_) | CoreError::EmptyName => Self::BadRequest(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_errors_map_to_documented_statuses() {
        let cases = [
            (EngineError::NoOrdersFound, StatusCode::NOT_FOUND),
            (EngineError::SessionNotFound, StatusCode::NOT_FOUND),
            (EngineError::InvalidAssignee, StatusCode::BAD_REQUEST),
            (EngineError::ConcurrentModification, StatusCode::CONFLICT),
            (
                EngineError::DataStore(StoreError::Database("boom".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).into_response().status(), status);
        }
    }

    #[test]
    fn invalid_assignee_message_is_user_facing() {
        let err = ApiError::from(EngineError::InvalidAssignee);
        assert_eq!(err.to_string(), "Invalid assignee selected.");
    }

    #[test]
    fn store_conflict_is_409() {
        let err = ApiError::from(StoreError::Conflict("taken".into()));
        assert_eq!(err.into_response().status(), StatusCode::CONFLICT);
    }
}
