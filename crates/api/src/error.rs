//! User-visible error taxonomy and its HTTP mapping.
//!
//! Every rejection is a structured `{"error": {"code", "message"}}` body.
//! Infrastructure failures (store, signing) collapse into an opaque 500; the
//! detail goes to the log, never to the caller.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use qoa_auth::SigningError;
use qoa_infra::StoreError;

/// A terminal, user-visible authorization failure.
#[derive(Debug, Clone)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
}

impl ApiError {
    fn new(status: StatusCode, code: &'static str, message: &str) -> Self {
        Self {
            status,
            code,
            message: message.to_string(),
        }
    }

    /// No credential resolvable (or bad login credentials).
    pub fn unauthorized() -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            "UNAUTHORIZED",
            "Authentication required",
        )
    }

    /// Token verified but the backing user no longer exists.
    pub fn invalid_token() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "INVALID_TOKEN", "Invalid user")
    }

    /// Refresh token absent, expired, rotated, or revoked — one bucket by
    /// design, to avoid telling an attacker which it was.
    pub fn session_expired() -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            "SESSION_EXPIRED",
            "Refresh token invalid or expired",
        )
    }

    /// Valid identity, insufficient role.
    pub fn forbidden() -> Self {
        Self::new(StatusCode::FORBIDDEN, "FORBIDDEN", "Role required")
    }

    /// Valid identity, missing a declared scope.
    pub fn insufficient_scope() -> Self {
        Self::new(
            StatusCode::FORBIDDEN,
            "INSUFFICIENT_SCOPE",
            "Insufficient scope",
        )
    }

    /// Valid identity, suspended or inside a block window.
    pub fn account_blocked() -> Self {
        Self::new(StatusCode::FORBIDDEN, "ACCOUNT_BLOCKED", "User blocked")
    }

    pub fn user_not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND, "USER_NOT_FOUND", "User not found")
    }

    fn internal() -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "INTERNAL",
            "Internal error",
        )
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        tracing::error!(error = %err, "credential store failure");
        Self::internal()
    }
}

impl From<SigningError> for ApiError {
    fn from(err: SigningError) -> Self {
        tracing::error!(error = %err, "token signing failure");
        Self::internal()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({
            "error": {
                "code": self.code,
                "message": self.message,
            }
        });
        (self.status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_match_the_taxonomy() {
        assert_eq!(ApiError::unauthorized().status, StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::invalid_token().status, StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::session_expired().status, StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::forbidden().status, StatusCode::FORBIDDEN);
        assert_eq!(ApiError::insufficient_scope().status, StatusCode::FORBIDDEN);
        assert_eq!(ApiError::account_blocked().status, StatusCode::FORBIDDEN);
        assert_eq!(ApiError::user_not_found().status, StatusCode::NOT_FOUND);
    }
}
