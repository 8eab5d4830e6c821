//! Common test utilities for integration tests
//!
//! Signing keys, JWKS documents, token builders and a mock identity
//! provider serving a discovery document and a JWKS endpoint.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use jwt_authenticator::{JwtAuthConfig, JwtAuthenticator};
use serde_json::{Value, json};
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path},
};

/// Key id of the primary RSA key
pub const KID_1: &str = "kid/a";

/// Key id of the secondary RSA key
pub const KID_X: &str = "kid/x";

/// Key id of the shared secret
pub const KID_HMAC: &str = "hmac-1";

/// Shared secret, raw bytes
pub const HMAC_SECRET: &[u8] = b"magic-cookie-magic-cookie-magic-cookie";

const RSA_1_PEM: &[u8] = include_bytes!("../fixtures/rsa_1.pem");
const RSA_1_N: &str = include_str!("../fixtures/rsa_1.n");
const RSA_X_PEM: &[u8] = include_bytes!("../fixtures/rsa_x.pem");
const RSA_X_N: &str = include_str!("../fixtures/rsa_x.n");

/// A signing key paired with its public JWK
#[derive(Clone, Copy)]
pub enum TestKey {
    /// RSA key published as [`KID_1`]
    Rsa1,
    /// RSA key published as [`KID_X`]
    RsaX,
    /// HMAC secret published as [`KID_HMAC`]
    Hmac,
}

impl TestKey {
    pub fn kid(self) -> &'static str {
        match self {
            Self::Rsa1 => KID_1,
            Self::RsaX => KID_X,
            Self::Hmac => KID_HMAC,
        }
    }

    pub fn algorithm(self) -> Algorithm {
        match self {
            Self::Rsa1 | Self::RsaX => Algorithm::RS256,
            Self::Hmac => Algorithm::HS256,
        }
    }

    pub fn encoding_key(self) -> EncodingKey {
        match self {
            Self::Rsa1 => EncodingKey::from_rsa_pem(RSA_1_PEM).expect("rsa_1.pem"),
            Self::RsaX => EncodingKey::from_rsa_pem(RSA_X_PEM).expect("rsa_x.pem"),
            Self::Hmac => EncodingKey::from_secret(HMAC_SECRET),
        }
    }

    /// Public JWK under the key's own id
    pub fn jwk(self) -> Value {
        self.jwk_with_kid(self.kid())
    }

    /// Public JWK under an arbitrary id
    pub fn jwk_with_kid(self, kid: &str) -> Value {
        let modulus = match self {
            Self::Rsa1 => RSA_1_N.trim(),
            Self::RsaX => RSA_X_N.trim(),
            Self::Hmac => "",
        };
        match self {
            Self::Rsa1 | Self::RsaX => json!({
                "kty": "RSA",
                "kid": kid,
                "use": "sig",
                "alg": "RS256",
                "n": modulus,
                "e": "AQAB",
            }),
            Self::Hmac => json!({
                "kty": "oct",
                "kid": kid,
                "alg": "HS256",
                "k": base64_url(HMAC_SECRET),
            }),
        }
    }
}

fn base64_url(bytes: &[u8]) -> String {
    use base64::Engine as _;
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// JWKS document holding the given public keys
pub fn jwks(keys: &[Value]) -> Value {
    json!({ "keys": keys })
}

/// Current Unix timestamp in seconds
pub fn current_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock after epoch")
        .as_secs() as i64
}

/// Sign `claims` with `key`, using the key's own id
pub fn sign(key: TestKey, claims: &Value) -> String {
    sign_with_kid(key, Some(key.kid()), claims)
}

/// Sign `claims` with `key`, placing `kid` in the header
pub fn sign_with_kid(key: TestKey, kid: Option<&str>, claims: &Value) -> String {
    let mut header = Header::new(key.algorithm());
    header.kid = kid.map(str::to_string);
    encode(&header, claims, &key.encoding_key()).expect("token encodes")
}

/// Build a compact token from raw JSON text, signed with the HMAC secret
///
/// Lets tests send claim segments that a JSON serializer would never emit.
pub fn sign_raw_hmac(header_json: &str, claims_json: &str) -> String {
    let signing_input = format!(
        "{}.{}",
        base64_url(header_json.as_bytes()),
        base64_url(claims_json.as_bytes())
    );
    let signature = jsonwebtoken::crypto::sign(
        signing_input.as_bytes(),
        &TestKey::Hmac.encoding_key(),
        Algorithm::HS256,
    )
    .expect("signature");
    format!("{signing_input}.{signature}")
}

/// Config with a static JWKS holding every test key
pub fn static_config() -> JwtAuthConfig {
    JwtAuthConfig::default().with_static_jwks(jwks(&[
        TestKey::Rsa1.jwk(),
        TestKey::Hmac.jwk(),
    ]))
}

/// Build an authenticator, panicking on configuration errors
pub fn authenticator(config: JwtAuthConfig) -> Arc<JwtAuthenticator> {
    Arc::new(JwtAuthenticator::new(config).expect("valid config"))
}

/// Mock identity provider
pub struct MockIdp {
    pub server: MockServer,
    pub discovery_url: String,
    pub jwks_url: String,
}

impl MockIdp {
    /// Start a provider with no routes mounted
    pub async fn start() -> Self {
        let server = MockServer::start().await;
        let base_url = server.uri();

        Self {
            discovery_url: format!("{}/.well-known/openid-configuration", base_url),
            jwks_url: format!("{}/jwks", base_url),
            server,
        }
    }

    /// Serve the discovery document, expecting `times` requests
    pub async fn mock_discovery(&self, times: u64) {
        Mock::given(method("GET"))
            .and(path("/.well-known/openid-configuration"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "issuer": self.server.uri(),
                "jwks_uri": self.jwks_url,
                "response_types_supported": ["code"],
            })))
            .expect(times)
            .mount(&self.server)
            .await;
    }

    /// Serve `keys` from the JWKS endpoint, expecting `times` requests
    pub async fn mock_jwks(&self, keys: &[Value], times: u64) {
        Mock::given(method("GET"))
            .and(path("/jwks"))
            .respond_with(ResponseTemplate::new(200).set_body_json(jwks(keys)))
            .expect(times)
            .mount(&self.server)
            .await;
    }

    /// Make the JWKS endpoint fail with `status`
    pub async fn mock_jwks_error(&self, status: u16) {
        Mock::given(method("GET"))
            .and(path("/jwks"))
            .respond_with(ResponseTemplate::new(status))
            .mount(&self.server)
            .await;
    }

    /// Drop every mounted route, checking expectations first
    pub async fn reset(&self) {
        self.server.verify().await;
        self.server.reset().await;
    }
}
