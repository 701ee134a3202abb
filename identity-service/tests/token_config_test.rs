//! Tests for tenant token config: JWKS publication, cache invalidation and
//! dynamic claim extraction.

mod common;

use common::*;
use serde_json::json;

fn decode_access_claims(access_token: &str) -> serde_json::Value {
    let decoding_key = jsonwebtoken::DecodingKey::from_rsa_pem(TEST_PUBLIC_KEY.as_bytes()).unwrap();
    let mut validation = jsonwebtoken::Validation::new(jsonwebtoken::Algorithm::RS256);
    validation.validate_aud = false;
    jsonwebtoken::decode::<serde_json::Value>(access_token, &decoding_key, &validation)
        .unwrap()
        .claims
}

#[tokio::test]
async fn jwks_exposes_the_tenant_signing_keys() {
    let app = TestApp::new().await;

    let (status, headers, jwks) = get_with_auth(
        &app.router,
        "/.well-known/jwks.json",
        Some(TEST_TENANT),
        None,
    )
    .await;
    assert_eq!(status, 200);
    assert!(headers["cache-control"]
        .to_str()
        .unwrap()
        .contains("max-age"));

    let keys = jwks["keys"].as_array().unwrap();
    assert_eq!(keys.len(), 1);
    assert_eq!(keys[0]["kty"], "RSA");
    assert_eq!(keys[0]["alg"], "RS256");
    assert_eq!(keys[0]["kid"], TEST_KID);
    assert!(!keys[0]["n"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn cache_invalidation_requires_the_internal_key_and_takes_effect() {
    let app = TestApp::new().await;

    // Warm the cache, then change the stored config behind it.
    app.token_configs.get(TEST_TENANT).await.unwrap();
    {
        let mut configs = app.store.token_configs.lock().unwrap();
        let mut changed = test_token_config();
        changed.access_token_ttl_seconds = 1234;
        configs.insert(TEST_TENANT.to_string(), changed);
    }

    // Without the internal key the call is rejected and the cache stays warm.
    use tower::ServiceExt;
    let request = axum::http::Request::builder()
        .method("POST")
        .uri("/internal/cache/invalidate")
        .header("content-type", "application/json")
        .body(axum::body::Body::from(
            json!({ "tenant_id": TEST_TENANT }).to_string(),
        ))
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), 401);
    assert_eq!(
        app.token_configs
            .get(TEST_TENANT)
            .await
            .unwrap()
            .access_token_ttl_seconds,
        900
    );

    // With the key the next read observes the new config.
    let request = axum::http::Request::builder()
        .method("POST")
        .uri("/internal/cache/invalidate")
        .header("content-type", "application/json")
        .header("x-internal-api-key", TEST_INTERNAL_API_KEY)
        .body(axum::body::Body::from(
            json!({ "tenant_id": TEST_TENANT }).to_string(),
        ))
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(
        app.token_configs
            .get(TEST_TENANT)
            .await
            .unwrap()
            .access_token_ttl_seconds,
        1234
    );
}

#[tokio::test]
async fn extracted_claims_follow_path_order_with_last_writer_wins() {
    let app = TestApp::new().await;
    {
        let mut configs = app.store.token_configs.lock().unwrap();
        let mut config = test_token_config();
        config.access_claim_paths = vec![
            "email".to_string(),
            "name.firstName".to_string(),
            "items[0].value".to_string(),
            "items[1].value".to_string(),
            "missing.path".to_string(),
        ];
        configs.insert(TEST_TENANT.to_string(), config);
    }
    app.profiles.insert(
        TEST_TENANT,
        TEST_USER,
        json!({
            "email": "alice@example.com",
            "name": { "firstName": "Alice" },
            "items": [ { "value": "first" }, { "value": "second" } ]
        }),
    );
    app.seed_refresh_token(TEST_TENANT, TEST_CLIENT, TEST_USER, "rt-1");

    let (status, _, body) = post_json(
        &app.router,
        "/token/refresh",
        Some(TEST_TENANT),
        &json!({ "refresh_token": "rt-1" }),
    )
    .await;
    assert_eq!(status, 200);

    let claims = decode_access_claims(body["access_token"].as_str().unwrap());
    assert_eq!(claims["email"], "alice@example.com");
    // Nested value surfaces under its final segment name.
    assert_eq!(claims["firstName"], "Alice");
    // Both item paths end in `value`; the later path wins.
    assert_eq!(claims["value"], "second");
    // Unresolvable paths are skipped without failing issuance.
    assert!(claims.get("path").is_none());
}

#[tokio::test]
async fn profile_outage_degrades_to_tokens_without_extracted_claims() {
    let app = TestApp::new().await;
    {
        let mut configs = app.store.token_configs.lock().unwrap();
        let mut config = test_token_config();
        config.access_claim_paths = vec!["email".to_string()];
        configs.insert(TEST_TENANT.to_string(), config);
    }
    // No profile seeded for the user.
    app.seed_refresh_token(TEST_TENANT, TEST_CLIENT, TEST_USER, "rt-1");

    let (status, _, body) = post_json(
        &app.router,
        "/token/refresh",
        Some(TEST_TENANT),
        &json!({ "refresh_token": "rt-1" }),
    )
    .await;
    assert_eq!(status, 200);

    let claims = decode_access_claims(body["access_token"].as_str().unwrap());
    assert!(claims.get("email").is_none());
    assert_eq!(claims["sub"], TEST_USER);
}

#[tokio::test]
async fn health_endpoint_reports_healthy() {
    let app = TestApp::new().await;

    let (status, _, body) = get_with_auth(&app.router, "/health", None, None).await;
    assert_eq!(status, 200);
    assert_eq!(body["status"], "healthy");
}
