//! Bearer token extraction. Validation itself happens in the handlers,
//! which know the tenant and its signing keys.

use axum::{extract::FromRequestParts, http::header, http::request::Parts};
use service_core::error::AppError;

/// Extractor for the raw `Authorization: Bearer` token.
pub struct BearerToken(pub String);

#[axum::async_trait]
impl<S> FromRequestParts<S> for BearerToken
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .filter(|value| !value.is_empty())
            .ok_or_else(|| AppError::InvalidToken {
                description: "Missing bearer token".to_string(),
            })?;

        Ok(BearerToken(token.to_string()))
    }
}
