//! Tests for token refresh and session listing.

mod common;

use chrono::{Duration, Utc};
use common::*;
use serde_json::{json, Value};

fn decode_access_claims(access_token: &str) -> Value {
    let decoding_key = jsonwebtoken::DecodingKey::from_rsa_pem(TEST_PUBLIC_KEY.as_bytes()).unwrap();
    let mut validation = jsonwebtoken::Validation::new(jsonwebtoken::Algorithm::RS256);
    validation.validate_aud = false;
    jsonwebtoken::decode::<Value>(access_token, &decoding_key, &validation)
        .unwrap()
        .claims
}

/// Mint a signed access token directly, bypassing the refresh endpoint.
fn mint_access_token(user_id: &str, client_id: &str, exp_offset_seconds: i64) -> String {
    let now = Utc::now().timestamp();
    let claims = json!({
        "sub": user_id,
        "iss": "https://idp.test",
        "aud": client_id,
        "tid": TEST_TENANT,
        "cid": client_id,
        "jti": "test-jti",
        "scope": "openid profile",
        "rft_id": "test-rft-id",
        "amr": ["pwd"],
        "iat": now,
        "exp": now + exp_offset_seconds,
    });

    let mut header = jsonwebtoken::Header::new(jsonwebtoken::Algorithm::RS256);
    header.kid = Some(TEST_KID.to_string());
    let key = jsonwebtoken::EncodingKey::from_rsa_pem(TEST_PRIVATE_KEY.as_bytes()).unwrap();
    jsonwebtoken::encode(&header, &claims, &key).unwrap()
}

#[tokio::test]
async fn refresh_mints_an_access_token_bound_to_the_same_rft_id() {
    let app = TestApp::new().await;
    let stored = app.seed_refresh_token(TEST_TENANT, TEST_CLIENT, TEST_USER, "rt-1");

    let (status, headers, body) = post_json(
        &app.router,
        "/token/refresh",
        Some(TEST_TENANT),
        &json!({ "refresh_token": "rt-1", "client_id": TEST_CLIENT }),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(body["token_type"], "bearer");
    assert_eq!(body["expires_in"], 900);

    let claims = decode_access_claims(body["access_token"].as_str().unwrap());
    assert_eq!(claims["rft_id"], stored.token_hash);
    assert_eq!(claims["sub"], TEST_USER);

    let cookies = set_cookies(&headers);
    assert!(cookies.iter().any(|c| c.starts_with("AT=ey")));
}

#[tokio::test]
async fn refresh_without_client_id_skips_the_client_check() {
    let app = TestApp::new().await;
    app.seed_refresh_token(TEST_TENANT, TEST_CLIENT, TEST_USER, "rt-1");

    let (status, _, body) = post_json(
        &app.router,
        "/token/refresh",
        Some(TEST_TENANT),
        &json!({ "refresh_token": "rt-1" }),
    )
    .await;
    assert_eq!(status, 200);
    assert!(body["access_token"].is_string());
}

#[tokio::test]
async fn expired_refresh_token_clears_both_cookies() {
    let app = TestApp::new().await;
    let token = app.seed_refresh_token(TEST_TENANT, TEST_CLIENT, TEST_USER, "rt-expired");
    {
        let mut tokens = app.store.refresh_tokens.lock().unwrap();
        let stored = tokens
            .get_mut(&(TEST_TENANT.to_string(), token.token_hash.clone()))
            .unwrap();
        stored.expires_at = Utc::now() - Duration::hours(1);
    }

    let (status, headers, error) = post_json(
        &app.router,
        "/token/refresh",
        Some(TEST_TENANT),
        &json!({ "refresh_token": "rt-expired" }),
    )
    .await;
    assert_eq!(status, 401);
    assert_eq!(error["error"], "unauthorized");

    let cookies = set_cookies(&headers);
    assert!(cookies.iter().any(|c| c.starts_with("AT=;")));
    assert!(cookies.iter().any(|c| c.starts_with("RT=;")));
}

#[tokio::test]
async fn refresh_with_wrong_client_id_is_unauthorized() {
    let app = TestApp::new().await;
    app.seed_refresh_token(TEST_TENANT, TEST_CLIENT, TEST_USER, "rt-1");

    let (status, _, error) = post_json(
        &app.router,
        "/token/refresh",
        Some(TEST_TENANT),
        &json!({ "refresh_token": "rt-1", "client_id": "other-app" }),
    )
    .await;
    assert_eq!(status, 401);
    assert_eq!(error["error"], "unauthorized");
}

#[tokio::test]
async fn listing_paginates_and_reports_the_full_count() {
    let app = TestApp::new().await;
    for i in 0..5 {
        app.seed_refresh_token(TEST_TENANT, TEST_CLIENT, TEST_USER, &format!("rt-{}", i));
    }
    let access_token = mint_access_token(TEST_USER, TEST_CLIENT, 900);

    let mut seen = 0;
    for (page, expected) in [(1, 2), (2, 2), (3, 1)] {
        let path = format!(
            "/user/refresh-tokens?client_id={}&page={}&page_size=2",
            TEST_CLIENT, page
        );
        let (status, _, body) = get_with_auth(
            &app.router,
            &path,
            Some(TEST_TENANT),
            Some(&access_token),
        )
        .await;
        assert_eq!(status, 200, "page {}", page);
        assert_eq!(body["total_count"], 5, "page {}", page);
        let items = body["refresh_tokens"].as_array().unwrap();
        assert_eq!(items.len(), expected, "page {}", page);
        seen += items.len();

        for item in items {
            // The opaque value is never exposed, only the stable hash id.
            assert_ne!(item["refresh_token"], "");
            assert_eq!(item["device_name"], "Seeded device");
        }
    }
    assert_eq!(seen, 5);
}

#[tokio::test]
async fn listing_is_isolated_across_tenants_and_users() {
    let app = TestApp::new().await;
    app.seed_refresh_token(TEST_TENANT, TEST_CLIENT, TEST_USER, "rt-1");
    app.seed_refresh_token(TEST_TENANT, TEST_CLIENT, "user-2", "rt-2");
    app.seed_token_config("tenant-b");
    app.seed_refresh_token("tenant-b", TEST_CLIENT, TEST_USER, "rt-3");

    let access_token = mint_access_token(TEST_USER, TEST_CLIENT, 900);
    let path = format!("/user/refresh-tokens?client_id={}", TEST_CLIENT);
    let (status, _, body) =
        get_with_auth(&app.router, &path, Some(TEST_TENANT), Some(&access_token)).await;
    assert_eq!(status, 200);
    assert_eq!(body["total_count"], 1);
}

#[tokio::test]
async fn listing_rejects_bad_pagination_and_missing_client_id() {
    let app = TestApp::new().await;
    let access_token = mint_access_token(TEST_USER, TEST_CLIENT, 900);

    let cases = [
        format!("/user/refresh-tokens?client_id={}&page=0", TEST_CLIENT),
        format!(
            "/user/refresh-tokens?client_id={}&page=1&page_size=0",
            TEST_CLIENT
        ),
        format!(
            "/user/refresh-tokens?client_id={}&page=1&page_size=101",
            TEST_CLIENT
        ),
        "/user/refresh-tokens".to_string(),
    ];
    for path in cases {
        let (status, _, error) =
            get_with_auth(&app.router, &path, Some(TEST_TENANT), Some(&access_token)).await;
        assert_eq!(status, 400, "{}", path);
        assert_eq!(error["error"], "invalid_request", "{}", path);
    }
}

#[tokio::test]
async fn token_validation_failures_carry_distinct_www_authenticate_descriptions() {
    let app = TestApp::new().await;
    let path = format!("/user/refresh-tokens?client_id={}", TEST_CLIENT);

    // Expired token. Validation leeway is 60 seconds, so go well past it.
    let expired = mint_access_token(TEST_USER, TEST_CLIENT, -7200);
    let (status, headers, error) =
        get_with_auth(&app.router, &path, Some(TEST_TENANT), Some(&expired)).await;
    assert_eq!(status, 401);
    assert_eq!(error["error"], "invalid_token");
    let challenge = headers["www-authenticate"].to_str().unwrap().to_string();
    assert!(challenge.contains("expired"), "{}", challenge);

    // Malformed token.
    let (status, headers, _) = get_with_auth(
        &app.router,
        &path,
        Some(TEST_TENANT),
        Some("not-a-jwt"),
    )
    .await;
    assert_eq!(status, 401);
    let challenge = headers["www-authenticate"].to_str().unwrap().to_string();
    assert!(challenge.contains("malformed"), "{}", challenge);

    // Token issued to a different client than the query names.
    let other = mint_access_token(TEST_USER, "other-app", 900);
    let (status, headers, _) =
        get_with_auth(&app.router, &path, Some(TEST_TENANT), Some(&other)).await;
    assert_eq!(status, 401);
    let challenge = headers["www-authenticate"].to_str().unwrap().to_string();
    assert!(challenge.contains("different client"), "{}", challenge);

    // Missing bearer token entirely.
    let (status, _, _) = get_with_auth(&app.router, &path, Some(TEST_TENANT), None).await;
    assert_eq!(status, 401);
}
