use axum::{
    extract::{ConnectInfo, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use axum_extra::extract::cookie::CookieJar;
use service_core::error::AppError;
use std::net::SocketAddr;

use crate::dtos::{
    BiometricChallengeRequest, BiometricChallengeResponse, BiometricCompleteRequest,
    ErrorResponse, TokenBundleResponse,
};
use crate::handlers::{token_cookie, ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE};
use crate::middleware::TenantId;
use crate::services::metrics::{
    increment, BIOMETRIC_CHALLENGES_TOTAL, BIOMETRIC_COMPLETIONS_TOTAL,
};
use crate::utils::validation::ValidatedJson;
use crate::AppState;

/// Request a one-time biometric challenge
#[utoipa::path(
    post,
    path = "/biometric/challenge",
    request_body = BiometricChallengeRequest,
    responses(
        (status = 200, description = "Challenge issued", body = BiometricChallengeResponse),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 401, description = "Invalid refresh token", body = ErrorResponse)
    ),
    tag = "Biometric"
)]
pub async fn challenge(
    State(state): State<AppState>,
    TenantId(tenant_id): TenantId,
    ValidatedJson(req): ValidatedJson<BiometricChallengeRequest>,
) -> Result<impl IntoResponse, AppError> {
    let response = state.biometric.create_challenge(&tenant_id, req).await?;
    increment(&BIOMETRIC_CHALLENGES_TOTAL, &[&tenant_id]);
    Ok((StatusCode::OK, Json(response)))
}

/// Complete a biometric registration or login
#[utoipa::path(
    post,
    path = "/biometric/complete",
    request_body = BiometricCompleteRequest,
    responses(
        (status = 200, description = "Tokens issued", body = TokenBundleResponse),
        (status = 400, description = "Invalid request, bad encoding or unknown challenge state", body = ErrorResponse),
        (status = 401, description = "Signature verification failed", body = ErrorResponse),
        (status = 404, description = "Credential not registered", body = ErrorResponse)
    ),
    tag = "Biometric"
)]
pub async fn complete(
    State(state): State<AppState>,
    TenantId(tenant_id): TenantId,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    jar: CookieJar,
    ValidatedJson(req): ValidatedJson<BiometricCompleteRequest>,
) -> Result<impl IntoResponse, AppError> {
    let flow = if req.public_key.is_some() {
        "registration"
    } else {
        "login"
    };

    let completed = match state
        .biometric
        .complete(&tenant_id, req, addr.ip().to_string())
        .await
    {
        Ok(completed) => completed,
        Err(e) => {
            increment(&BIOMETRIC_COMPLETIONS_TOTAL, &[&tenant_id, flow, "failure"]);
            return Err(e.into());
        }
    };
    increment(&BIOMETRIC_COMPLETIONS_TOTAL, &[&tenant_id, flow, "success"]);

    let bundle = completed.bundle;
    let jar = jar
        .add(token_cookie(
            ACCESS_TOKEN_COOKIE,
            bundle.access_token.clone(),
            &bundle.config.cookie,
        ))
        .add(token_cookie(
            REFRESH_TOKEN_COOKIE,
            bundle.refresh_token.clone(),
            &bundle.config.cookie,
        ));

    let response = TokenBundleResponse {
        access_token: bundle.access_token,
        refresh_token: bundle.refresh_token,
        id_token: bundle.id_token,
        token_type: "bearer".to_string(),
        expires_in: bundle.expires_in,
        mfa_factors: completed.mfa_factors,
    };

    Ok((StatusCode::OK, jar, Json(response)))
}
