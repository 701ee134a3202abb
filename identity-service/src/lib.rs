pub mod config;
pub mod dtos;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod utils;

use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use service_core::middleware::{
    rate_limit::ip_rate_limit_middleware, security_headers::security_headers_middleware,
    tracing::request_id_middleware,
};

use crate::middleware::metrics::metrics_middleware;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::{
    openapi::security::{ApiKey, ApiKeyValue, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::config::IdentityConfig;
use crate::services::{
    BiometricService, ChallengeStore, RefreshTokenManager, TokenConfigProvider, TokenIssuer,
};
use service_core::error::AppError;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health::health_check,
        handlers::well_known::jwks,
        handlers::biometric::challenge,
        handlers::biometric::complete,
        handlers::token::refresh,
        handlers::user::list_refresh_tokens,
        handlers::internal::invalidate_cache,
    ),
    components(
        schemas(
            dtos::ErrorResponse,
            dtos::BiometricChallengeRequest,
            dtos::BiometricChallengeResponse,
            dtos::BiometricCompleteRequest,
            dtos::RefreshRequest,
            dtos::RefreshResponse,
            dtos::RefreshTokenItem,
            dtos::RefreshTokenListResponse,
            dtos::TokenBundleResponse,
            handlers::internal::InvalidateCacheRequest,
            models::DeviceMetadata,
            models::Platform,
            models::Client,
            models::ClientKind,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Biometric", description = "Device registration and login via signed challenges"),
        (name = "Token", description = "Refresh token exchange"),
        (name = "User", description = "Session listing"),
        (name = "Internal", description = "Collaborator-facing operations"),
        (name = "Well-Known", description = "Public service metadata"),
        (name = "Observability", description = "Service health and monitoring"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    utoipa::openapi::security::HttpBuilder::new()
                        .scheme(utoipa::openapi::security::HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
            components.add_security_scheme(
                "tenant_header",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new("x-tenant-id"))),
            );
            components.add_security_scheme(
                "internal_api_key",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new("x-internal-api-key"))),
            );
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<IdentityConfig>,
    pub biometric: Arc<BiometricService>,
    pub refresh: Arc<RefreshTokenManager>,
    pub issuer: Arc<TokenIssuer>,
    pub token_configs: Arc<TokenConfigProvider>,
    pub challenges: Arc<dyn ChallengeStore>,
    pub challenge_rate_limiter: service_core::middleware::rate_limit::IpRateLimiter,
    pub ip_rate_limiter: service_core::middleware::rate_limit::IpRateLimiter,
}

pub async fn build_router(state: AppState) -> Result<Router, AppError> {
    // Challenge issuance gets its own, tighter limit.
    let challenge_limiter = state.challenge_rate_limiter.clone();
    let challenge_route = Router::new()
        .route("/biometric/challenge", post(handlers::biometric::challenge))
        .layer(from_fn_with_state(
            challenge_limiter,
            ip_rate_limit_middleware,
        ));

    let ip_limiter = state.ip_rate_limiter.clone();

    let mut app = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/metrics", get(handlers::metrics::metrics))
        .route("/.well-known/jwks.json", get(handlers::well_known::jwks));

    let swagger_enabled = match state.config.environment {
        crate::config::Environment::Dev => true,
        crate::config::Environment::Prod => {
            state.config.swagger.enabled == crate::config::SwaggerMode::Public
        }
    };

    if swagger_enabled {
        app =
            app.merge(SwaggerUi::new("/docs").url("/.well-known/openapi.json", ApiDoc::openapi()));
    } else {
        app = app.route(
            "/.well-known/openapi.json",
            get(|| async { axum::Json(ApiDoc::openapi()) }),
        );
    }

    let app = app
        .merge(challenge_route)
        .route("/biometric/complete", post(handlers::biometric::complete))
        .route("/token/refresh", post(handlers::token::refresh))
        .route(
            "/user/refresh-tokens",
            get(handlers::user::list_refresh_tokens),
        )
        .route(
            "/internal/cache/invalidate",
            post(handlers::internal::invalidate_cache),
        )
        .with_state(state.clone())
        .layer(from_fn_with_state(ip_limiter, ip_rate_limit_middleware))
        .layer(from_fn(metrics_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                )
            }),
        )
        .layer(from_fn(request_id_middleware))
        .layer(from_fn(security_headers_middleware))
        .layer(
            CorsLayer::new()
                .allow_origin(
                    state
                        .config
                        .security
                        .allowed_origins
                        .iter()
                        .map(|o| {
                            o.parse::<axum::http::HeaderValue>().unwrap_or_else(|e| {
                                tracing::error!(
                                    "Invalid CORS origin '{}': {}. Using fallback.",
                                    o,
                                    e
                                );
                                axum::http::HeaderValue::from_static("*")
                            })
                        })
                        .collect::<Vec<axum::http::HeaderValue>>(),
                )
                .allow_methods([
                    axum::http::Method::GET,
                    axum::http::Method::POST,
                    axum::http::Method::OPTIONS,
                ])
                .allow_headers([
                    axum::http::header::AUTHORIZATION,
                    axum::http::header::CONTENT_TYPE,
                    axum::http::header::HeaderName::from_static("x-tenant-id"),
                    axum::http::header::HeaderName::from_static("x-internal-api-key"),
                    axum::http::header::HeaderName::from_static("x-request-id"),
                ]),
        );

    Ok(app)
}
