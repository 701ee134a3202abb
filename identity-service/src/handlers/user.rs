use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use service_core::error::AppError;

use crate::dtos::{ErrorResponse, ListRefreshTokensQuery, RefreshTokenListResponse};
use crate::middleware::{BearerToken, TenantId};
use crate::AppState;

/// List the caller's active refresh tokens (sessions)
#[utoipa::path(
    get,
    path = "/user/refresh-tokens",
    params(ListRefreshTokensQuery),
    responses(
        (status = 200, description = "Active sessions for the caller", body = RefreshTokenListResponse),
        (status = 400, description = "Missing client_id or pagination out of range", body = ErrorResponse),
        (status = 401, description = "Invalid access token, see WWW-Authenticate", body = ErrorResponse)
    ),
    tag = "User",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn list_refresh_tokens(
    State(state): State<AppState>,
    TenantId(tenant_id): TenantId,
    BearerToken(token): BearerToken,
    Query(query): Query<ListRefreshTokensQuery>,
) -> Result<impl IntoResponse, AppError> {
    let claims = state
        .issuer
        .validate_access_token(&tenant_id, &token, query.client_id.as_deref())
        .await?;

    let response = state
        .refresh
        .list(
            &tenant_id,
            &claims,
            query.client_id.as_deref(),
            query.page,
            query.page_size,
        )
        .await?;

    Ok((StatusCode::OK, Json(response)))
}
