use axum::{extract::State, http::header, response::IntoResponse, Json};
use service_core::error::AppError;

use crate::middleware::TenantId;
use crate::AppState;

/// Get the tenant's JSON Web Key Set (JWKS)
#[utoipa::path(
    get,
    path = "/.well-known/jwks.json",
    responses(
        (status = 200, description = "Public JWKS for the tenant returned")
    ),
    tag = "Well-Known"
)]
pub async fn jwks(
    State(state): State<AppState>,
    TenantId(tenant_id): TenantId,
) -> Result<impl IntoResponse, AppError> {
    let jwks = state.issuer.jwks(&tenant_id).await?;
    Ok((
        [
            (header::CONTENT_TYPE, "application/json"),
            (header::CACHE_CONTROL, "public, max-age=3600"),
        ],
        Json(jwks),
    ))
}
