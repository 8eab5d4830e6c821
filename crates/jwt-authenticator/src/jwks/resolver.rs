//! Key resolution with caching and refresh-on-miss
//!
//! Static key sets are indexed once. Remote key sets (OIDC discovery or a
//! direct JWKS endpoint) are fetched lazily, cached for a TTL, and refreshed
//! once when a token names an unknown key id, which picks up key rotation
//! without a restart.
//!
//! # Concurrency
//!
//! The cached key set is swapped whole behind a `RwLock`, so readers never
//! see a partially updated index. Fetches are serialized by a `Mutex`; every
//! cache update bumps a generation counter, and a caller that observed an
//! older generation before queuing on the mutex reuses the newer key set
//! instead of fetching again.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use super::fetcher::{KeySetFetcher, check_url_safety};
use super::key::{KeyIndex, VerificationKey, sanitize_key_id};
use crate::config::{FetchPolicy, KeySource};
use crate::error::{AuthError, FetchError};

/// Resolves verification keys by key id
#[derive(Debug)]
pub struct KeyResolver {
    source: Source,
}

#[derive(Debug)]
enum Source {
    Unconfigured,
    Static(KeyIndex),
    Remote(RemoteKeys),
}

#[derive(Debug, Clone)]
enum Location {
    Discovery(String),
    Jwks(String),
}

#[derive(Debug, Clone)]
struct CachedKeys {
    index: Arc<KeyIndex>,
    fetched_at: Instant,
}

#[derive(Debug, Default)]
struct CacheState {
    keys: Option<CachedKeys>,
    generation: u64,
}

#[derive(Debug)]
struct RefreshBudget {
    window_start: Instant,
    used: u32,
}

#[derive(Debug)]
struct RemoteKeys {
    location: Location,
    fetcher: Arc<dyn KeySetFetcher>,
    policy: FetchPolicy,
    state: RwLock<CacheState>,
    discovered_jwks_uri: RwLock<Option<String>>,
    refresh: Mutex<RefreshBudget>,
}

/// Why a fetch is attempted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trigger {
    /// Nothing cached yet, or the cached set outlived its TTL
    Load,
    /// Token named a key id the current set does not hold
    Miss,
}

impl KeyResolver {
    /// Create a resolver for `source`; `None` resolves to `NoKeySource`
    pub fn new(
        source: Option<KeySource>,
        fetcher: Arc<dyn KeySetFetcher>,
        policy: FetchPolicy,
    ) -> Self {
        let source = match source {
            None => Source::Unconfigured,
            Some(KeySource::Static(doc)) => {
                let index = KeyIndex::from_document(&doc);
                info!(key_count = index.len(), "Loaded static JWKS");
                Source::Static(index)
            }
            Some(KeySource::OpenIdConnect(url)) => {
                Source::Remote(RemoteKeys::new(Location::Discovery(url), fetcher, policy))
            }
            Some(KeySource::JwksUri(url)) => {
                Source::Remote(RemoteKeys::new(Location::Jwks(url), fetcher, policy))
            }
        };
        Self { source }
    }

    /// Whether any key source is configured
    pub fn is_configured(&self) -> bool {
        !matches!(self.source, Source::Unconfigured)
    }

    /// Resolve the key for a token header's key id
    ///
    /// # Errors
    ///
    /// - [`AuthError::NoKeySource`] if nothing is configured
    /// - [`AuthError::KeyNotFound`] if no key matches after at most one refresh
    /// - [`AuthError::FetchFailed`] if the key set cannot be retrieved
    pub async fn resolve(&self, key_id: Option<&str>) -> Result<VerificationKey, AuthError> {
        let key_id = key_id.map(sanitize_key_id).transpose()?;
        match &self.source {
            Source::Unconfigured => Err(AuthError::NoKeySource),
            Source::Static(index) => index
                .lookup(key_id.as_deref())
                .ok_or_else(|| not_found(key_id.as_deref())),
            Source::Remote(remote) => remote.resolve(key_id.as_deref()).await,
        }
    }
}

fn not_found(key_id: Option<&str>) -> AuthError {
    AuthError::KeyNotFound(key_id.unwrap_or("<none>").to_string())
}

impl RemoteKeys {
    fn new(location: Location, fetcher: Arc<dyn KeySetFetcher>, policy: FetchPolicy) -> Self {
        Self {
            location,
            fetcher,
            policy,
            state: RwLock::new(CacheState::default()),
            discovered_jwks_uri: RwLock::new(None),
            refresh: Mutex::new(RefreshBudget {
                window_start: Instant::now(),
                used: 0,
            }),
        }
    }

    async fn resolve(&self, key_id: Option<&str>) -> Result<VerificationKey, AuthError> {
        let (cached, generation) = {
            let state = self.state.read().await;
            (state.keys.clone(), state.generation)
        };

        let index = match cached {
            Some(cached) if cached.fetched_at.elapsed() < self.policy.cache_ttl => {
                if let Some(key) = cached.index.lookup(key_id) {
                    return Ok(key);
                }
                // Key miss against a live cache, one forced refresh
                debug!(key_id = ?key_id, "Key id not in cached JWKS, refreshing");
                self.refresh(generation, Trigger::Miss).await?
            }
            _ => self.refresh(generation, Trigger::Load).await?,
        };

        index.lookup(key_id).ok_or_else(|| {
            warn!(key_id = ?key_id, "Key id not found in JWKS");
            not_found(key_id)
        })
    }

    /// Fetch a fresh key set unless another caller already did since `observed`
    async fn refresh(&self, observed: u64, trigger: Trigger) -> Result<Arc<KeyIndex>, AuthError> {
        let mut budget = self.refresh.lock().await;

        let stale = {
            let state = self.state.read().await;
            if state.generation != observed
                && let Some(keys) = &state.keys
            {
                debug!("JWKS refreshed by a concurrent request, reusing");
                return Ok(Arc::clone(&keys.index));
            }
            state.keys.clone()
        };

        if trigger == Trigger::Miss && !self.take_refresh_slot(&mut budget) {
            warn!(
                limit = self.policy.refresh_limit,
                window_ms = self.policy.refresh_window.as_millis() as u64,
                "JWKS refresh rate limited"
            );
            return match stale {
                Some(keys) => Ok(keys.index),
                None => Err(AuthError::KeyNotFound("refresh rate limited".to_string())),
            };
        }

        match self.fetch_index().await {
            Ok(index) => {
                let index = Arc::new(index);
                let mut state = self.state.write().await;
                state.keys = Some(CachedKeys {
                    index: Arc::clone(&index),
                    fetched_at: Instant::now(),
                });
                state.generation += 1;
                info!(key_count = index.len(), "JWKS cache updated");
                Ok(index)
            }
            Err(e) => match (trigger, stale) {
                // Serve the expired set while the endpoint is down; back off one TTL
                (Trigger::Load, Some(stale)) => {
                    warn!(error = %e, "JWKS refetch failed, serving stale keys");
                    let mut state = self.state.write().await;
                    state.keys = Some(CachedKeys {
                        index: Arc::clone(&stale.index),
                        fetched_at: Instant::now(),
                    });
                    state.generation += 1;
                    Ok(stale.index)
                }
                _ => Err(AuthError::FetchFailed(e)),
            },
        }
    }

    fn take_refresh_slot(&self, budget: &mut RefreshBudget) -> bool {
        if budget.window_start.elapsed() >= self.policy.refresh_window {
            budget.window_start = Instant::now();
            budget.used = 0;
        }
        if budget.used >= self.policy.refresh_limit {
            return false;
        }
        budget.used += 1;
        true
    }

    async fn fetch_index(&self) -> Result<KeyIndex, FetchError> {
        let jwks_uri = self.jwks_uri().await?;
        match self.fetcher.fetch_json(&jwks_uri).await {
            Ok(doc) => {
                let index = KeyIndex::from_document(&doc);
                if index.is_empty() {
                    warn!(jwks_uri = %jwks_uri, "JWKS contains no usable signing keys");
                }
                Ok(index)
            }
            Err(e) => {
                // Endpoint may have moved, rediscover next time
                if matches!(self.location, Location::Discovery(_)) {
                    *self.discovered_jwks_uri.write().await = None;
                }
                Err(e)
            }
        }
    }

    async fn jwks_uri(&self) -> Result<String, FetchError> {
        let discovery_url = match &self.location {
            Location::Jwks(uri) => return Ok(uri.clone()),
            Location::Discovery(url) => url,
        };

        if let Some(uri) = self.discovered_jwks_uri.read().await.clone() {
            return Ok(uri);
        }

        let doc = self.fetcher.fetch_json(discovery_url).await?;
        let uri = doc
            .get("jwks_uri")
            .and_then(serde_json::Value::as_str)
            .ok_or(FetchError::MissingJwksUri)?
            .to_string();
        check_url_safety(&uri)?;

        info!(discovery_url = %discovery_url, jwks_uri = %uri, "Discovered JWKS URI");
        *self.discovered_jwks_uri.write().await = Some(uri.clone());
        Ok(uri)
    }
}
