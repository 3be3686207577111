//! Participant identity extraction.
//!
//! Authentication itself happens upstream in the platform's session layer;
//! this service trusts the forwarded participant id in the bearer slot and
//! only resolves display names through the directory.

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::AppState;

/// Authenticated participant extracted from
/// `Authorization: Bearer <participant-id>`.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
}

/// Rejection returned when the participant id is missing or malformed.
pub struct AuthError {
    message: &'static str,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "error": {
                "code": "UNAUTHORIZED",
                "message": self.message
            }
        });
        (StatusCode::UNAUTHORIZED, Json(body)).into_response()
    }
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or(AuthError {
                message: "Missing Authorization header",
            })?;

        let user_id = header.strip_prefix("Bearer ").ok_or(AuthError {
            message: "Invalid Authorization header format",
        })?;

        if user_id.is_empty() {
            return Err(AuthError {
                message: "Empty participant id",
            });
        }

        Ok(AuthUser {
            user_id: user_id.to_string(),
        })
    }
}
