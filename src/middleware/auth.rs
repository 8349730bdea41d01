//! Caller identity extraction
//!
//! Session handling lives in the upstream API gateway; by the time a request
//! reaches this service the gateway has verified the session and forwarded the
//! caller's ID in the `X-User-Id` header. This extractor only parses it.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use uuid::Uuid;

/// Header carrying the gateway-verified caller ID
pub const USER_ID_HEADER: &str = "X-User-Id";

/// Caller identity for permission checks (buyer vs seller)
#[derive(Debug, Clone, Copy)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
}

#[derive(Debug, Serialize)]
struct AuthError {
    error: AuthErrorDetails,
}

#[derive(Debug, Serialize)]
struct AuthErrorDetails {
    code: String,
    message: String,
}

impl AuthError {
    fn new(code: &str, message: &str) -> Self {
        Self {
            error: AuthErrorDetails {
                code: code.to_string(),
                message: message.to_string(),
            },
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        (StatusCode::UNAUTHORIZED, Json(self)).into_response()
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|h| h.to_str().ok())
            .ok_or_else(|| {
                AuthError::new("MISSING_USER", "X-User-Id header required").into_response()
            })?;

        let user_id = Uuid::parse_str(header).map_err(|_| {
            AuthError::new("INVALID_USER", "X-User-Id must be a UUID").into_response()
        })?;

        Ok(AuthenticatedUser { user_id })
    }
}
