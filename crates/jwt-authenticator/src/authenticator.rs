//! Authenticator façade
//!
//! Runs parse → key resolution → signature and time checks → claims
//! projection for one bearer token. Every rejection collapses to `Ok(None)`;
//! only a missing key source is surfaced, as [`BackendFailure`].

use std::sync::Arc;

use http::HeaderMap;
use tracing::{debug, error, warn};

use crate::claims::{ClaimsProjector, Credentials, RolesObserver};
use crate::config::JwtAuthConfig;
use crate::error::{AuthError, BackendFailure, ConfigError};
use crate::jwks::{HttpFetcher, KeyResolver, KeySetFetcher};
use crate::jwt;

/// Turns bearer tokens into [`Credentials`]
///
/// Cheap to share behind an `Arc`; all methods take `&self`.
#[derive(Debug)]
pub struct JwtAuthenticator {
    resolver: KeyResolver,
    projector: ClaimsProjector,
    skew_seconds: u64,
    header_name: String,
}

impl JwtAuthenticator {
    /// Create an authenticator that fetches remote keys over HTTP
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for conflicting key sources, a static JWKS
    /// without a `keys` array, an invalid URL or roles pointer, or if the
    /// HTTP client cannot be built.
    pub fn new(config: JwtAuthConfig) -> Result<Self, ConfigError> {
        let fetcher = HttpFetcher::new(&config.fetch_policy())?;
        Self::with_fetcher(config, Arc::new(fetcher))
    }

    /// Create an authenticator with a custom key set fetcher
    ///
    /// # Errors
    ///
    /// See [`JwtAuthenticator::new`].
    pub fn with_fetcher(
        config: JwtAuthConfig,
        fetcher: Arc<dyn KeySetFetcher>,
    ) -> Result<Self, ConfigError> {
        let source = config.key_source()?;
        config.validate_roles()?;

        if source.is_none() {
            warn!("No JWKS or discovery URL configured, every token will fail");
        }

        Ok(Self {
            resolver: KeyResolver::new(source, fetcher, config.fetch_policy()),
            projector: ClaimsProjector::from_config(&config),
            skew_seconds: config.jwt_clock_skew_tolerance_seconds,
            header_name: config.jwt_header.clone(),
        })
    }

    /// Report role extraction outcomes to `observer`
    pub fn with_roles_observer(mut self, observer: Arc<dyn RolesObserver>) -> Self {
        self.projector = self.projector.with_observer(observer);
        self
    }

    /// Authenticate a raw `Authorization` header value
    ///
    /// `None` input and every validation failure yield `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns [`BackendFailure`] when no key source is configured.
    pub async fn authenticate(
        &self,
        header_value: Option<&str>,
    ) -> Result<Option<Credentials>, BackendFailure> {
        let Some(raw) = header_value else {
            return Ok(None);
        };

        match self.try_authenticate(raw).await {
            Ok(credentials) => {
                debug!(
                    username = %credentials.username,
                    role_count = credentials.backend_roles.len(),
                    "Token authenticated"
                );
                Ok(Some(credentials))
            }
            Err(e) if e.is_fatal() => {
                error!(error = %e, "JWT authentication backend misconfigured");
                Err(BackendFailure)
            }
            Err(e @ AuthError::FetchFailed(_)) => {
                warn!(error = %e, "Token rejected");
                Ok(None)
            }
            Err(e) => {
                debug!(error = %e, "Token rejected");
                Ok(None)
            }
        }
    }

    /// Authenticate from request headers, reading the configured header
    ///
    /// A missing or non-UTF-8 header value is treated as no token.
    ///
    /// # Errors
    ///
    /// See [`JwtAuthenticator::authenticate`].
    pub async fn authenticate_headers(
        &self,
        headers: &HeaderMap,
    ) -> Result<Option<Credentials>, BackendFailure> {
        let value = headers
            .get(self.header_name.as_str())
            .and_then(|v| v.to_str().ok());
        self.authenticate(value).await
    }

    async fn try_authenticate(&self, raw: &str) -> Result<Credentials, AuthError> {
        // Fatal regardless of token content
        if !self.resolver.is_configured() {
            return Err(AuthError::NoKeySource);
        }

        let parsed = jwt::parse(raw)?;
        let key = self.resolver.resolve(parsed.header.kid.as_deref()).await?;
        let claims = jwt::validate(parsed, &key, self.skew_seconds)?;
        self.projector.project(claims)
    }
}
