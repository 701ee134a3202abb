use identity_service::{
    build_router,
    config::IdentityConfig,
    services::{
        BiometricService, Database, HttpProfileFetcher, RedisChallengeStore, RefreshTokenManager,
        TokenConfigProvider, TokenIssuer,
    },
    AppState,
};
use service_core::middleware::rate_limit::create_ip_rate_limiter;
use service_core::observability::logging::init_tracing;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;

#[tokio::main]
async fn main() -> Result<(), service_core::error::AppError> {
    // Load configuration - fail fast if invalid
    let config = IdentityConfig::from_env()?;

    init_tracing(
        &config.service_name,
        &config.log_level,
        "http://tempo:4317", // In production this would come from config
    );

    identity_service::services::metrics::init_metrics();

    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
        "Starting identity service"
    );

    let database = Arc::new(Database::new(&config.database).await?);
    tracing::info!("Database initialized");

    let challenges = Arc::new(RedisChallengeStore::new(&config.redis.url).await?);
    tracing::info!("Challenge store initialized");

    let profiles = Arc::new(HttpProfileFetcher::new(
        config.profile.base_url.clone(),
        config.profile.timeout_seconds,
    )?);

    let token_configs = Arc::new(TokenConfigProvider::new(database.clone()));
    let issuer = Arc::new(TokenIssuer::new(token_configs.clone(), profiles));

    let biometric = Arc::new(BiometricService::new(
        database.clone(),
        database.clone(),
        database.clone(),
        challenges.clone(),
        issuer.clone(),
        config.biometric.challenge_ttl_seconds,
    ));
    let refresh = Arc::new(RefreshTokenManager::new(database.clone(), issuer.clone()));

    let challenge_rate_limiter = create_ip_rate_limiter(
        config.rate_limit.challenge_attempts,
        config.rate_limit.challenge_window_seconds,
    );
    let ip_rate_limiter = create_ip_rate_limiter(
        config.rate_limit.global_ip_limit,
        config.rate_limit.global_ip_window_seconds,
    );
    tracing::info!("Rate limiters initialized: Challenge and Global IP");

    let config = Arc::new(config);
    let state = AppState {
        config: config.clone(),
        biometric,
        refresh,
        issuer,
        token_configs,
        challenges,
        challenge_rate_limiter,
        ip_rate_limiter,
    };

    let app = build_router(state).await?;

    let addr = config.common.bind_address();

    let service_span = tracing::info_span!(
        "service",
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
    );
    let _guard = service_span.enter();

    tracing::info!(address = %addr, "Listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Service shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        },
    }

    // Give in-flight requests 30 seconds to complete
    tokio::time::sleep(tokio::time::Duration::from_secs(30)).await;
}
