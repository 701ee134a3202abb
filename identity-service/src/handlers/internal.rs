//! Internal endpoints for collaborator services, keyed by a shared secret.

use axum::{extract::State, http::HeaderMap, http::StatusCode, response::IntoResponse, Json};
use serde::Deserialize;
use service_core::error::AppError;
use subtle::ConstantTimeEq;
use utoipa::ToSchema;
use validator::Validate;

use crate::utils::validation::ValidatedJson;
use crate::AppState;

pub const INTERNAL_API_KEY_HEADER: &str = "x-internal-api-key";

#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct InvalidateCacheRequest {
    #[validate(length(min = 1, message = "tenant_id is required"))]
    pub tenant_id: String,
}

/// Drop the cached token config for a tenant. Called by the admin service
/// after every config change; must be broadcast to all instances.
#[utoipa::path(
    post,
    path = "/internal/cache/invalidate",
    request_body = InvalidateCacheRequest,
    responses(
        (status = 200, description = "Cache entry dropped"),
        (status = 401, description = "Missing or wrong internal api key")
    ),
    tag = "Internal",
    security(
        ("internal_api_key" = [])
    )
)]
pub async fn invalidate_cache(
    State(state): State<AppState>,
    headers: HeaderMap,
    ValidatedJson(req): ValidatedJson<InvalidateCacheRequest>,
) -> Result<impl IntoResponse, AppError> {
    let presented = headers
        .get(INTERNAL_API_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();

    let expected = state.config.security.internal_api_key.as_bytes();
    if !bool::from(presented.as_bytes().ct_eq(expected)) {
        return Err(AppError::unauthorized(
            "unauthorized",
            "Invalid internal api key",
        ));
    }

    state.token_configs.invalidate(&req.tenant_id);

    Ok((
        StatusCode::OK,
        Json(serde_json::json!({ "message": "Cache entry dropped" })),
    ))
}
