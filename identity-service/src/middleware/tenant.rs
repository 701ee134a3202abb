//! Tenant selection. Every request names its tenant in a header; requests
//! without one are unauthorized, not bad requests, so tenancy cannot be
//! probed anonymously.

use axum::{extract::FromRequestParts, http::request::Parts};
use service_core::error::AppError;

pub const TENANT_HEADER: &str = "x-tenant-id";

/// Extractor for the tenant id header.
#[derive(Debug, Clone)]
pub struct TenantId(pub String);

#[axum::async_trait]
impl<S> FromRequestParts<S> for TenantId
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let tenant_id = parts
            .headers
            .get(TENANT_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .ok_or_else(|| AppError::unauthorized("unauthorized", "Missing tenant header"))?;

        Ok(TenantId(tenant_id.to_string()))
    }
}
