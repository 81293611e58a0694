//! Authentication extractors.
//!
//! - `Caller` - optional end-user identity from an HS256 JWT
//! - `AdminAuth` - admin key for privileged endpoints

use std::convert::Infallible;
use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::crypto::secrets_match;
use crate::error::ApiError;
use crate::state::AppState;

/// An authenticated end user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    /// The raw subject claim from the JWT.
    pub subject: String,
}

/// The identity behind a request, if it carried a valid token.
///
/// Never rejects: a missing or invalid token yields `Caller(None)`.
#[derive(Debug, Clone, Default)]
pub struct Caller(pub Option<AuthUser>);

impl Caller {
    /// The caller's subject, if authenticated.
    #[must_use]
    pub fn subject(&self) -> Option<&str> {
        self.0.as_ref().map(|u| u.subject.as_str())
    }
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for Caller {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let Some(token) = bearer_token(parts) else {
            return Ok(Self(None));
        };

        // Gated so the bypass never exists in production builds.
        #[cfg(any(test, feature = "test-auth"))]
        if let Some(subject) = token.strip_prefix("test-token:") {
            return Ok(Self(Some(AuthUser {
                subject: subject.to_string(),
            })));
        }

        let Some(secret) = state.config.jwt_secret.as_deref() else {
            tracing::debug!("Bearer token ignored, no JWT secret configured");
            return Ok(Self(None));
        };

        Ok(Self(validate_jwt(token, secret).map(|claims| AuthUser {
            subject: claims.sub,
        })))
    }
}

/// Admin authentication via `X-Admin-Key`.
#[derive(Debug, Clone)]
pub struct AdminAuth {
    /// Admin identifier (for audit logging).
    pub admin_id: String,
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AdminAuth {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let admin_key = parts
            .headers
            .get("x-admin-key")
            .and_then(|v| v.to_str().ok())
            .ok_or(ApiError::Unauthorized)?;

        let expected_key = state
            .config
            .admin_api_key
            .as_deref()
            .ok_or(ApiError::Unauthorized)?;

        if !secrets_match(admin_key, expected_key) {
            tracing::warn!("Rejected admin request with wrong key");
            return Err(ApiError::Unauthorized);
        }

        let admin_id = parts
            .headers
            .get("x-admin-id")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("admin")
            .to_string();

        tracing::info!(admin_id = %admin_id, "Admin authenticated");

        Ok(AdminAuth { admin_id })
    }
}

/// JWT claims accepted from callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Subject, matched against `users.auth_user_id`.
    pub sub: String,
    /// Expiration time.
    pub exp: i64,
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Validate an HS256 token, returning its claims.
fn validate_jwt(token: &str, secret: &str) -> Option<JwtClaims> {
    let validation = Validation::new(Algorithm::HS256);
    match decode::<JwtClaims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation) {
        Ok(data) => Some(data.claims),
        Err(e) => {
            tracing::debug!(error = %e, "JWT validation failed");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn token(secret: &str, sub: &str, exp: i64) -> String {
        let claims = JwtClaims {
            sub: sub.into(),
            exp,
        };
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    fn in_an_hour() -> i64 {
        chrono::Utc::now().timestamp() + 3600
    }

    #[test]
    fn valid_token_yields_subject() {
        let claims = validate_jwt(&token("s3cret", "auth|alice", in_an_hour()), "s3cret").unwrap();
        assert_eq!(claims.sub, "auth|alice");
    }

    #[test]
    fn wrong_secret_is_rejected() {
        assert!(validate_jwt(&token("other", "auth|alice", in_an_hour()), "s3cret").is_none());
    }

    #[test]
    fn expired_token_is_rejected() {
        let expired = chrono::Utc::now().timestamp() - 3600;
        assert!(validate_jwt(&token("s3cret", "auth|alice", expired), "s3cret").is_none());
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(validate_jwt("not.a.jwt", "s3cret").is_none());
    }
}
