//! Authenticator Configuration Types
//!
//! Settings arrive already parsed (for example from a YAML or JSON settings
//! file). Field names follow the settings keys of the authentication backend.

use std::collections::BTreeSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::claims::pointer::parse_pointer;
use crate::error::ConfigError;

/// Default header carrying the bearer token
pub const DEFAULT_JWT_HEADER: &str = "Authorization";

/// JWT authenticator configuration
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JwtAuthConfig {
    /// OpenID Connect discovery document URL
    pub openid_connect_url: Option<String>,
    /// JWKS endpoint URL, used without discovery
    pub jwks_uri: Option<String>,
    /// Static JWKS document
    pub jwks: Option<serde_json::Value>,
    /// Issuer every token must carry
    pub required_issuer: Option<String>,
    /// Comma separated audiences; a token must name at least one
    pub required_audience: Option<String>,
    /// Claim holding the username (default `sub`)
    pub subject_key: Option<String>,
    /// Top-level claim holding roles
    pub roles_key: Option<String>,
    /// JSON Pointer to an array of roles
    pub roles_pointer: Option<String>,
    /// Clock skew tolerance applied to `exp` and `nbf`
    pub jwt_clock_skew_tolerance_seconds: u64,
    /// Request header consulted by `authenticate_headers`
    pub jwt_header: String,
    /// Timeout for discovery and JWKS requests
    pub jwks_request_timeout_ms: u64,
    /// Lifetime of a fetched key set
    pub jwks_cache_ttl_seconds: u64,
    /// Window for counting forced refreshes
    pub refresh_rate_limit_time_window_ms: u64,
    /// Forced refreshes allowed per window
    pub refresh_rate_limit_count: u32,
    /// Upper bound on discovery and JWKS response bodies
    pub max_response_bytes: usize,
}

impl Default for JwtAuthConfig {
    fn default() -> Self {
        Self {
            openid_connect_url: None,
            jwks_uri: None,
            jwks: None,
            required_issuer: None,
            required_audience: None,
            subject_key: None,
            roles_key: None,
            roles_pointer: None,
            jwt_clock_skew_tolerance_seconds: 0,
            jwt_header: DEFAULT_JWT_HEADER.to_string(),
            jwks_request_timeout_ms: 5_000,
            jwks_cache_ttl_seconds: 600,
            refresh_rate_limit_time_window_ms: 10_000,
            refresh_rate_limit_count: 10,
            max_response_bytes: 64 * 1024,
        }
    }
}

// Manual Debug impl so symmetric keys in a static JWKS never reach the logs
impl std::fmt::Debug for JwtAuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtAuthConfig")
            .field("openid_connect_url", &self.openid_connect_url)
            .field("jwks_uri", &self.jwks_uri)
            .field("jwks", &self.jwks.as_ref().map(|_| "<redacted>"))
            .field("required_issuer", &self.required_issuer)
            .field("required_audience", &self.required_audience)
            .field("subject_key", &self.subject_key)
            .field("roles_key", &self.roles_key)
            .field("roles_pointer", &self.roles_pointer)
            .field(
                "jwt_clock_skew_tolerance_seconds",
                &self.jwt_clock_skew_tolerance_seconds,
            )
            .field("jwt_header", &self.jwt_header)
            .field("jwks_request_timeout_ms", &self.jwks_request_timeout_ms)
            .field("jwks_cache_ttl_seconds", &self.jwks_cache_ttl_seconds)
            .finish_non_exhaustive()
    }
}

/// Where verification keys come from
#[derive(Debug, Clone)]
pub enum KeySource {
    /// JWKS document supplied inline, indexed once
    Static(serde_json::Value),
    /// Discovery document URL pointing at a JWKS endpoint
    OpenIdConnect(String),
    /// JWKS endpoint URL
    JwksUri(String),
}

/// Limits applied to forced key refreshes and outbound fetches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchPolicy {
    /// Per-request timeout
    pub request_timeout: Duration,
    /// Key set lifetime
    pub cache_ttl: Duration,
    /// Rate limit window for forced refreshes
    pub refresh_window: Duration,
    /// Forced refreshes per window
    pub refresh_limit: u32,
    /// Body size cap
    pub max_response_bytes: usize,
}

impl JwtAuthConfig {
    /// Configure OpenID Connect discovery
    pub fn with_openid_connect_url(mut self, url: impl Into<String>) -> Self {
        self.openid_connect_url = Some(url.into());
        self
    }

    /// Configure a JWKS endpoint without discovery
    pub fn with_jwks_uri(mut self, url: impl Into<String>) -> Self {
        self.jwks_uri = Some(url.into());
        self
    }

    /// Configure a static JWKS document
    pub fn with_static_jwks(mut self, jwks: serde_json::Value) -> Self {
        self.jwks = Some(jwks);
        self
    }

    /// Require an exact issuer
    pub fn with_required_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.required_issuer = Some(issuer.into());
        self
    }

    /// Require one of a comma separated list of audiences
    pub fn with_required_audience(mut self, audience: impl Into<String>) -> Self {
        self.required_audience = Some(audience.into());
        self
    }

    /// Read the username from a claim other than `sub`
    pub fn with_subject_key(mut self, key: impl Into<String>) -> Self {
        self.subject_key = Some(key.into());
        self
    }

    /// Read roles from a top-level claim
    pub fn with_roles_key(mut self, key: impl Into<String>) -> Self {
        self.roles_key = Some(key.into());
        self
    }

    /// Read roles through a JSON Pointer
    pub fn with_roles_pointer(mut self, pointer: impl Into<String>) -> Self {
        self.roles_pointer = Some(pointer.into());
        self
    }

    /// Set clock skew tolerance in seconds
    pub fn with_clock_skew(mut self, seconds: u64) -> Self {
        self.jwt_clock_skew_tolerance_seconds = seconds;
        self
    }

    /// Set the key set lifetime
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.jwks_cache_ttl_seconds = ttl.as_secs();
        self
    }

    /// Set the forced refresh budget
    pub fn with_refresh_rate_limit(mut self, count: u32, window: Duration) -> Self {
        self.refresh_rate_limit_count = count;
        self.refresh_rate_limit_time_window_ms = window.as_millis() as u64;
        self
    }

    /// Resolve the configured key source
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::AmbiguousKeySource`] if more than one source is
    /// set and [`ConfigError::InvalidJwks`] if the static document has no
    /// `keys` array. Individual unusable entries are skipped when indexed.
    /// No source at all is `Ok(None)`.
    pub fn key_source(&self) -> Result<Option<KeySource>, ConfigError> {
        let mut configured = Vec::new();
        if self.jwks.is_some() {
            configured.push("jwks");
        }
        if self.openid_connect_url.is_some() {
            configured.push("openid_connect_url");
        }
        if self.jwks_uri.is_some() {
            configured.push("jwks_uri");
        }
        if configured.len() > 1 {
            return Err(ConfigError::AmbiguousKeySource(configured.join(", ")));
        }

        if let Some(doc) = &self.jwks {
            // Entries are vetted one by one when indexed, as for fetched sets
            if !doc.get("keys").is_some_and(serde_json::Value::is_array) {
                return Err(ConfigError::InvalidJwks(
                    "`keys` is missing or not an array".to_string(),
                ));
            }
            return Ok(Some(KeySource::Static(doc.clone())));
        }
        if let Some(url) = &self.openid_connect_url {
            return Ok(Some(KeySource::OpenIdConnect(check_url(url)?)));
        }
        if let Some(url) = &self.jwks_uri {
            return Ok(Some(KeySource::JwksUri(check_url(url)?)));
        }
        Ok(None)
    }

    /// Required audiences, trimmed, empty entries dropped
    pub fn required_audiences(&self) -> BTreeSet<String> {
        self.required_audience
            .as_deref()
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|a| !a.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Validate role extraction settings
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidRolesPointer`] if the pointer is not
    /// valid JSON Pointer syntax.
    pub fn validate_roles(&self) -> Result<(), ConfigError> {
        if let Some(pointer) = &self.roles_pointer {
            parse_pointer(pointer)?;
            if self.roles_key.is_some() {
                warn!(
                    roles_pointer = %pointer,
                    "Both roles_key and roles_pointer configured, roles_pointer takes precedence"
                );
            }
        }
        Ok(())
    }

    /// Outbound fetch limits
    pub fn fetch_policy(&self) -> FetchPolicy {
        FetchPolicy {
            request_timeout: Duration::from_millis(self.jwks_request_timeout_ms),
            cache_ttl: Duration::from_secs(self.jwks_cache_ttl_seconds),
            refresh_window: Duration::from_millis(self.refresh_rate_limit_time_window_ms),
            refresh_limit: self.refresh_rate_limit_count,
            max_response_bytes: self.max_response_bytes,
        }
    }
}

fn check_url(raw: &str) -> Result<String, ConfigError> {
    url::Url::parse(raw).map_err(|e| ConfigError::InvalidUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;
    Ok(raw.to_string())
}
