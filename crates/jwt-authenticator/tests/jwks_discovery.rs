//! Remote key resolution through OpenID Connect discovery and JWKS endpoints
//!
//! Exercises discovery caching, refresh on unknown key ids (key rotation),
//! fetch failures and rate-limited refreshes against a mock provider.

mod common;

use std::time::Duration;

use common::*;
use jwt_authenticator::JwtAuthConfig;
use serde_json::json;

#[tokio::test]
async fn test_discovery_then_jwks() {
    let idp = MockIdp::start().await;
    idp.mock_discovery(1).await;
    idp.mock_jwks(&[TestKey::Rsa1.jwk()], 1).await;

    let auth = authenticator(JwtAuthConfig::default().with_openid_connect_url(&idp.discovery_url));

    for user in ["kirk", "spock", "uhura"] {
        let token = sign(TestKey::Rsa1, &json!({"sub": user}));
        let creds = auth.authenticate(Some(&token)).await.unwrap().unwrap();
        assert_eq!(creds.username, user);
    }
}

#[tokio::test]
async fn test_direct_jwks_uri() {
    let idp = MockIdp::start().await;
    idp.mock_discovery(0).await;
    idp.mock_jwks(&[TestKey::Rsa1.jwk()], 1).await;

    let auth = authenticator(JwtAuthConfig::default().with_jwks_uri(&idp.jwks_url));
    let token = sign(TestKey::Rsa1, &json!({"sub": "kirk"}));
    assert!(auth.authenticate(Some(&token)).await.unwrap().is_some());
}

#[tokio::test]
async fn test_key_rotation_picked_up_on_miss() {
    let idp = MockIdp::start().await;
    idp.mock_discovery(1).await;
    idp.mock_jwks(&[TestKey::Rsa1.jwk()], 1).await;

    let auth = authenticator(JwtAuthConfig::default().with_openid_connect_url(&idp.discovery_url));
    let old = sign(TestKey::Rsa1, &json!({"sub": "kirk"}));
    assert!(auth.authenticate(Some(&old)).await.unwrap().is_some());

    // Provider rotates to key X; the discovery document stays cached
    idp.reset().await;
    // One refresh for the new kid, one more when the retired kid misses
    idp.mock_discovery(0).await;
    idp.mock_jwks(&[TestKey::RsaX.jwk()], 2).await;

    let new = sign(TestKey::RsaX, &json!({"sub": "kirk"}));
    assert!(auth.authenticate(Some(&new)).await.unwrap().is_some());

    // Key 1 is gone after the refresh
    assert!(auth.authenticate(Some(&old)).await.unwrap().is_none());
}

#[tokio::test]
async fn test_unknown_kid_refreshes_once_then_rejects() {
    let idp = MockIdp::start().await;
    idp.mock_discovery(1).await;
    // Initial load plus exactly one forced refresh
    idp.mock_jwks(&[TestKey::Rsa1.jwk()], 2).await;

    let auth = authenticator(JwtAuthConfig::default().with_openid_connect_url(&idp.discovery_url));
    let warm = sign(TestKey::Rsa1, &json!({"sub": "kirk"}));
    assert!(auth.authenticate(Some(&warm)).await.unwrap().is_some());

    let unknown = sign(TestKey::RsaX, &json!({"sub": "kirk"}));
    assert!(auth.authenticate(Some(&unknown)).await.unwrap().is_none());
}

#[tokio::test]
async fn test_refreshes_are_rate_limited() {
    let idp = MockIdp::start().await;
    idp.mock_discovery(1).await;
    // Initial load plus two permitted refreshes
    idp.mock_jwks(&[TestKey::Rsa1.jwk()], 3).await;

    let config = JwtAuthConfig::default()
        .with_openid_connect_url(&idp.discovery_url)
        .with_refresh_rate_limit(2, Duration::from_secs(60));
    let auth = authenticator(config);

    let warm = sign(TestKey::Rsa1, &json!({"sub": "kirk"}));
    assert!(auth.authenticate(Some(&warm)).await.unwrap().is_some());

    for i in 0..10 {
        let token = sign_with_kid(TestKey::RsaX, Some(&format!("unknown-{i}")), &json!({"sub": "x"}));
        assert!(auth.authenticate(Some(&token)).await.unwrap().is_none());
    }

    // Known keys keep working while refreshes are throttled
    assert!(auth.authenticate(Some(&warm)).await.unwrap().is_some());
}

#[tokio::test]
async fn test_concurrent_cold_loads_share_one_fetch() {
    let idp = MockIdp::start().await;
    idp.mock_discovery(1).await;
    idp.mock_jwks(&[TestKey::Rsa1.jwk()], 1).await;

    let auth = authenticator(JwtAuthConfig::default().with_openid_connect_url(&idp.discovery_url));
    let token = sign(TestKey::Rsa1, &json!({"sub": "kirk"}));

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let auth = auth.clone();
            let token = token.clone();
            tokio::spawn(async move { auth.authenticate(Some(&token)).await })
        })
        .collect();

    for handle in handles {
        assert!(handle.await.unwrap().unwrap().is_some());
    }
}

#[tokio::test]
async fn test_concurrent_kid_misses_share_one_refresh() {
    let idp = MockIdp::start().await;
    idp.mock_discovery(1).await;
    idp.mock_jwks(&[TestKey::Rsa1.jwk()], 1).await;

    let auth = authenticator(JwtAuthConfig::default().with_openid_connect_url(&idp.discovery_url));
    let warm = sign(TestKey::Rsa1, &json!({"sub": "kirk"}));
    assert!(auth.authenticate(Some(&warm)).await.unwrap().is_some());

    // Key X appears; every concurrent miss must ride on a single refetch
    idp.reset().await;
    idp.mock_discovery(0).await;
    idp.mock_jwks(&[TestKey::Rsa1.jwk(), TestKey::RsaX.jwk()], 1).await;

    let rotated = sign(TestKey::RsaX, &json!({"sub": "spock"}));
    let handles: Vec<_> = (0..16)
        .map(|_| {
            let auth = auth.clone();
            let token = rotated.clone();
            tokio::spawn(async move { auth.authenticate(Some(&token)).await })
        })
        .collect();

    for handle in handles {
        let creds = handle.await.unwrap().unwrap().expect("rotated key resolves");
        assert_eq!(creds.username, "spock");
    }
}

#[tokio::test]
async fn test_jwks_endpoint_failure_is_a_rejection() {
    let idp = MockIdp::start().await;
    idp.mock_discovery(1).await;
    idp.mock_jwks_error(503).await;

    let auth = authenticator(JwtAuthConfig::default().with_openid_connect_url(&idp.discovery_url));
    let token = sign(TestKey::Rsa1, &json!({"sub": "kirk"}));
    assert_eq!(auth.authenticate(Some(&token)).await, Ok(None));
}

#[tokio::test]
async fn test_discovery_without_jwks_uri() {
    let idp = MockIdp::start().await;
    wiremock::Mock::given(wiremock::matchers::path("/.well-known/openid-configuration"))
        .respond_with(
            wiremock::ResponseTemplate::new(200).set_body_json(json!({"issuer": "x"})),
        )
        .mount(&idp.server)
        .await;

    let auth = authenticator(JwtAuthConfig::default().with_openid_connect_url(&idp.discovery_url));
    let token = sign(TestKey::Rsa1, &json!({"sub": "kirk"}));
    assert_eq!(auth.authenticate(Some(&token)).await, Ok(None));
}

#[tokio::test]
async fn test_escaped_kid() {
    let idp = MockIdp::start().await;
    idp.mock_discovery(1).await;
    idp.mock_jwks(&[TestKey::Rsa1.jwk_with_kid("../../kid with spaces?#")], 1)
        .await;

    let auth = authenticator(JwtAuthConfig::default().with_openid_connect_url(&idp.discovery_url));
    let token = sign_with_kid(
        TestKey::Rsa1,
        Some("../../kid with spaces?#"),
        &json!({"sub": "kirk"}),
    );
    assert!(auth.authenticate(Some(&token)).await.unwrap().is_some());
}

#[tokio::test]
async fn test_insecure_discovery_url_rejected_at_fetch() {
    let auth = authenticator(
        JwtAuthConfig::default()
            .with_openid_connect_url("http://idp.example.com/.well-known/openid-configuration"),
    );
    let token = sign(TestKey::Rsa1, &json!({"sub": "kirk"}));
    assert_eq!(auth.authenticate(Some(&token)).await, Ok(None));
}
