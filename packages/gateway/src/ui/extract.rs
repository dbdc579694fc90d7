//! Request extractors.

use axum::{extract::FromRequestParts, http::request::Parts};

use crate::domain::UserId;

use super::error::ApiError;

/// Header carrying the identity resolved by the upstream auth layer
pub const USER_ID_HEADER: &str = "x-user-id";

/// Caller identity taken from [`USER_ID_HEADER`].
///
/// Rejects with 401 when the header is missing, not UTF-8, or blank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser(pub UserId);

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .ok_or(ApiError::Unauthorized)?;

        UserId::new(raw.trim().to_string())
            .map(AuthenticatedUser)
            .map_err(|e| {
                tracing::warn!("Rejected identity header: {}", e);
                ApiError::Unauthorized
            })
    }
}
