//! Outbound fetching of discovery documents and JWKS
//!
//! - HTTPS required (plain HTTP only for loopback hosts)
//! - Redirects are not followed
//! - Request timeout and response size cap from [`FetchPolicy`]

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, error};

use crate::config::FetchPolicy;
use crate::error::{ConfigError, FetchError};

/// Fetches JSON documents for the key resolver
#[async_trait]
pub trait KeySetFetcher: Send + Sync + std::fmt::Debug {
    /// GET `url` and parse the body as JSON
    async fn fetch_json(&self, url: &str) -> Result<Value, FetchError>;
}

/// `reqwest` backed fetcher
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    max_response_bytes: usize,
}

impl HttpFetcher {
    /// Create a fetcher honoring the timeout and size limits of `policy`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::HttpClient`] if the HTTP client cannot be built
    pub fn new(policy: &FetchPolicy) -> Result<Self, ConfigError> {
        let client = reqwest::Client::builder()
            .timeout(policy.request_timeout)
            .user_agent(concat!("jwt-authenticator/", env!("CARGO_PKG_VERSION")))
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;

        Ok(Self {
            client,
            max_response_bytes: policy.max_response_bytes,
        })
    }
}

#[async_trait]
impl KeySetFetcher for HttpFetcher {
    async fn fetch_json(&self, url: &str) -> Result<Value, FetchError> {
        check_url_safety(url)?;
        debug!(url = %url, "Fetching key document");

        let mut response = self.client.get(url).send().await.map_err(|e| {
            error!(url = %url, error = %e, "Key document request failed");
            if e.is_timeout() {
                FetchError::Timeout(url.to_string())
            } else {
                FetchError::Http(e.to_string())
            }
        })?;

        if !response.status().is_success() {
            error!(url = %url, status = %response.status(), "Key document endpoint returned error status");
            return Err(FetchError::Status {
                status: response.status().as_u16(),
                url: url.to_string(),
            });
        }

        if let Some(content_length) = response.content_length()
            && content_length > self.max_response_bytes as u64
        {
            return Err(FetchError::ResponseTooLarge);
        }

        let read_error = |e: reqwest::Error| {
            if e.is_timeout() {
                FetchError::Timeout(url.to_string())
            } else {
                FetchError::Http(format!("Failed to read response: {e}"))
            }
        };

        // Content-Length may be absent (chunked), so the cap is enforced per chunk
        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(read_error)? {
            if body.len() + chunk.len() > self.max_response_bytes {
                error!(url = %url, limit = self.max_response_bytes, "Key document exceeds size limit");
                return Err(FetchError::ResponseTooLarge);
            }
            body.extend_from_slice(&chunk);
        }

        serde_json::from_slice(&body).map_err(|e| FetchError::InvalidJson(e.to_string()))
    }
}

/// Reject URLs that are not https, unless they point at a loopback host
///
/// # Errors
///
/// Returns [`FetchError::InvalidUrl`] or [`FetchError::InsecureUrl`]
pub fn check_url_safety(raw: &str) -> Result<(), FetchError> {
    let url = url::Url::parse(raw).map_err(|e| FetchError::InvalidUrl(format!("{raw}: {e}")))?;
    match url.scheme() {
        "https" => Ok(()),
        "http" if is_loopback(&url) => Ok(()),
        _ => Err(FetchError::InsecureUrl(raw.to_string())),
    }
}

fn is_loopback(url: &url::Url) -> bool {
    match url.host() {
        Some(url::Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
        Some(url::Host::Ipv4(ip)) => ip.is_loopback(),
        Some(url::Host::Ipv6(ip)) => ip.is_loopback(),
        None => false,
    }
}
