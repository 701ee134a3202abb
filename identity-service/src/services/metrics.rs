use prometheus::{Encoder, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};
use std::sync::OnceLock;

// Global registry
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

pub static HTTP_REQUESTS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
pub static HTTP_REQUEST_DURATION_SECONDS: OnceLock<HistogramVec> = OnceLock::new();
pub static BIOMETRIC_CHALLENGES_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
pub static BIOMETRIC_COMPLETIONS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
pub static TOKEN_REFRESHES_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

pub fn init_metrics() {
    let registry = Registry::new();

    let requests_total = IntCounterVec::new(
        Opts::new("http_requests_total", "Total number of HTTP requests"),
        &["method", "path", "status"],
    )
    .expect("valid metric definition");

    let request_duration = HistogramVec::new(
        prometheus::HistogramOpts::new(
            "http_request_duration_seconds",
            "HTTP request duration in seconds",
        ),
        &["method", "path", "status"],
    )
    .expect("valid metric definition");

    let challenges_total = IntCounterVec::new(
        Opts::new(
            "biometric_challenges_total",
            "Biometric challenges issued, by tenant",
        ),
        &["tenant"],
    )
    .expect("valid metric definition");

    let completions_total = IntCounterVec::new(
        Opts::new(
            "biometric_completions_total",
            "Biometric completion attempts, by tenant, flow and outcome",
        ),
        &["tenant", "flow", "outcome"],
    )
    .expect("valid metric definition");

    let refreshes_total = IntCounterVec::new(
        Opts::new(
            "token_refreshes_total",
            "Token refresh attempts, by tenant and outcome",
        ),
        &["tenant", "outcome"],
    )
    .expect("valid metric definition");

    for collector in [
        Box::new(requests_total.clone()) as Box<dyn prometheus::core::Collector>,
        Box::new(request_duration.clone()),
        Box::new(challenges_total.clone()),
        Box::new(completions_total.clone()),
        Box::new(refreshes_total.clone()),
    ] {
        if let Err(e) = registry.register(collector) {
            tracing::error!("Failed to register metrics collector: {}", e);
            panic!("Failed to initialize metrics: {}", e);
        }
    }

    let _ = REGISTRY.set(registry);
    let _ = HTTP_REQUESTS_TOTAL.set(requests_total);
    let _ = HTTP_REQUEST_DURATION_SECONDS.set(request_duration);
    let _ = BIOMETRIC_CHALLENGES_TOTAL.set(challenges_total);
    let _ = BIOMETRIC_COMPLETIONS_TOTAL.set(completions_total);
    let _ = TOKEN_REFRESHES_TOTAL.set(refreshes_total);
}

pub fn get_metrics() -> String {
    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();

    let registry = match REGISTRY.get() {
        Some(r) => r,
        None => {
            tracing::error!("Metrics registry not initialized");
            return "# Metrics registry not initialized\n".to_string();
        }
    };

    let metric_families = registry.gather();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return format!("# Failed to encode metrics: {}\n", e);
    }

    match String::from_utf8(buffer) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("Failed to convert metrics to UTF-8: {}", e);
            format!("# Failed to convert metrics to UTF-8: {}\n", e)
        }
    }
}

/// Increment a counter if metrics are initialized; no-op otherwise so unit
/// tests do not need the registry.
pub fn increment(counter: &OnceLock<IntCounterVec>, labels: &[&str]) {
    if let Some(counter) = counter.get() {
        counter.with_label_values(labels).inc();
    }
}
