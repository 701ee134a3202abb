use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use axum_extra::extract::cookie::CookieJar;
use service_core::error::AppError;

use crate::dtos::{ErrorResponse, RefreshRequest, RefreshResponse};
use crate::handlers::{cleared_cookie, token_cookie, ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE};
use crate::middleware::TenantId;
use crate::services::metrics::{increment, TOKEN_REFRESHES_TOTAL};
use crate::services::ServiceError;
use crate::utils::validation::ValidatedJson;
use crate::AppState;

/// Exchange a refresh token for a fresh access token
#[utoipa::path(
    post,
    path = "/token/refresh",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "Access token refreshed", body = RefreshResponse),
        (status = 401, description = "Invalid refresh token; AT/RT cookies are cleared", body = ErrorResponse)
    ),
    tag = "Token"
)]
pub async fn refresh(
    State(state): State<AppState>,
    TenantId(tenant_id): TenantId,
    jar: CookieJar,
    ValidatedJson(req): ValidatedJson<RefreshRequest>,
) -> Result<axum::response::Response, AppError> {
    match state
        .refresh
        .refresh(&tenant_id, &req.refresh_token, req.client_id.as_deref())
        .await
    {
        Ok(issued) => {
            increment(&TOKEN_REFRESHES_TOTAL, &[&tenant_id, "success"]);
            let jar = jar.add(token_cookie(
                ACCESS_TOKEN_COOKIE,
                issued.access_token.clone(),
                &issued.config.cookie,
            ));
            let response = RefreshResponse {
                access_token: issued.access_token,
                token_type: "bearer".to_string(),
                expires_in: issued.expires_in,
            };
            Ok((StatusCode::OK, jar, Json(response)).into_response())
        }
        Err(e @ ServiceError::Unauthorized(_)) => {
            increment(&TOKEN_REFRESHES_TOTAL, &[&tenant_id, "failure"]);
            // Cookies are cleared to empty values so browser sessions do not
            // keep replaying a dead token.
            let policy = state.token_configs.get(&tenant_id).await.ok();
            let policy = policy.as_ref().map(|c| &c.cookie);
            let jar = jar
                .add(cleared_cookie(ACCESS_TOKEN_COOKIE, policy))
                .add(cleared_cookie(REFRESH_TOKEN_COOKIE, policy));
            Ok((jar, AppError::from(e)).into_response())
        }
        Err(e) => {
            increment(&TOKEN_REFRESHES_TOTAL, &[&tenant_id, "failure"]);
            Err(e.into())
        }
    }
}
