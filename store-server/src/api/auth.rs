//! Actor identity extractor
//!
//! Authentication and session mechanics live upstream; handlers receive
//! the already-authenticated user id through the `X-User-Id` header. A
//! missing or malformed header is a 401.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::utils::AppError;

/// Authenticated actor id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentUser(pub u64);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get("x-user-id")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse().ok())
            .map(CurrentUser)
            .ok_or(AppError::Unauthorized)
    }
}
