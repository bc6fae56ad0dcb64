//! JSON Web Key Set fetch and cache.
//!
//! The auth provider publishes its public signing keys at a well-known JWKS
//! endpoint (`<base>/auth/v1/.well-known/jwks.json`). [`KeySetCache`] fetches
//! that document once and serves it from memory afterwards; an optional TTL
//! bounds the cache lifetime, and [`KeySetCache::refresh`] forces a refetch so
//! long-running processes can pick up rotated keys.
//!
//! The cache is an explicitly constructed service object owned by the
//! composition root — there is no process-global state. Fetch failures are
//! never cached: the next call retries.
//!
//! # Concurrency
//!
//! Concurrent cache misses are collapsed into a single network call by a
//! fetch mutex. Holding that mutex across the HTTP request is deliberate —
//! it is the one place in this crate where a lock spans a network call, and
//! it only contends on cold or expired caches.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Deserialize;
use tokio::sync::{Mutex, RwLock};

use crate::error::AuthError;

/// One public key record in the standard JSON Web Key shape.
///
/// Only the fields this crate consumes are modeled; RSA records carry `n`/`e`
/// and elliptic-curve records carry `crv`/`x`/`y`. Unknown fields are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct Jwk {
    #[serde(default)]
    pub kid: Option<String>,
    pub kty: String,
    #[serde(default)]
    pub alg: Option<String>,
    // RSA components (base64url).
    #[serde(default)]
    pub n: Option<String>,
    #[serde(default)]
    pub e: Option<String>,
    // Elliptic-curve components (base64url).
    #[serde(default)]
    pub crv: Option<String>,
    #[serde(default)]
    pub x: Option<String>,
    #[serde(default)]
    pub y: Option<String>,
}

/// The provider's published key set: `{"keys": [...]}`.
///
/// Key ids are unique within one fetch (provider invariant).
#[derive(Debug, Clone, Deserialize)]
pub struct KeySet {
    #[serde(default)]
    pub keys: Vec<Jwk>,
}

impl KeySet {
    /// Find the key record with the given key id.
    pub fn find(&self, kid: &str) -> Option<&Jwk> {
        self.keys.iter().find(|k| k.kid.as_deref() == Some(kid))
    }
}

struct CachedKeySet {
    keys: Arc<KeySet>,
    fetched_at: Instant,
}

/// Minimum age of the cached set before an unknown key id may force a
/// refetch. Bounds the outbound fetch rate a stream of tokens bearing
/// fabricated key ids can drive.
pub const DEFAULT_REFRESH_COOLDOWN: Duration = Duration::from_secs(10);

/// Process-wide cache over the provider's JWKS endpoint.
pub struct KeySetCache {
    http: reqwest::Client,
    jwks_url: String,
    ttl: Option<Duration>,
    refresh_cooldown: Duration,
    cached: RwLock<Option<CachedKeySet>>,
    fetch_guard: Mutex<()>,
}

impl KeySetCache {
    /// Create a cache over the given JWKS URL.
    ///
    /// `ttl = None` caches the first successful fetch for the process
    /// lifetime (a refetch still happens via [`refresh`](Self::refresh)).
    pub fn new(http: reqwest::Client, jwks_url: impl Into<String>, ttl: Option<Duration>) -> Self {
        Self {
            http,
            jwks_url: jwks_url.into(),
            ttl,
            refresh_cooldown: DEFAULT_REFRESH_COOLDOWN,
            cached: RwLock::new(None),
            fetch_guard: Mutex::new(()),
        }
    }

    /// Override [`DEFAULT_REFRESH_COOLDOWN`]. `Duration::ZERO` lets every
    /// unknown key id force a refetch.
    pub fn with_refresh_cooldown(mut self, cooldown: Duration) -> Self {
        self.refresh_cooldown = cooldown;
        self
    }

    /// Create a cache primed with a fixed key set.
    ///
    /// `get` never touches the network; `refresh` will fail. Intended for
    /// tests and for deployments that pin keys out of band.
    pub fn preloaded(keys: KeySet) -> Self {
        Self {
            http: reqwest::Client::new(),
            jwks_url: String::new(),
            ttl: None,
            refresh_cooldown: DEFAULT_REFRESH_COOLDOWN,
            cached: RwLock::new(Some(CachedKeySet {
                keys: Arc::new(keys),
                fetched_at: Instant::now(),
            })),
            fetch_guard: Mutex::new(()),
        }
    }

    /// Return the cached key set, fetching it on a cold or expired cache.
    ///
    /// # Errors
    ///
    /// [`AuthError::KeyFetch`] if the endpoint is unreachable, returns a
    /// non-success status, or returns something that is not a JWKS document.
    /// Failures are not cached.
    pub async fn get(&self) -> Result<Arc<KeySet>, AuthError> {
        if let Some(keys) = self.fresh().await {
            return Ok(keys);
        }

        let _guard = self.fetch_guard.lock().await;
        // Another task may have fetched while we waited for the guard.
        if let Some(keys) = self.fresh().await {
            return Ok(keys);
        }
        self.fetch_and_store().await
    }

    /// Drop whatever is cached and fetch the key set again.
    ///
    /// Used by the key resolver when a token names a key id the cached set
    /// does not contain, so a rotated key becomes visible without waiting
    /// for the TTL.
    pub async fn refresh(&self) -> Result<Arc<KeySet>, AuthError> {
        let _guard = self.fetch_guard.lock().await;
        self.fetch_and_store().await
    }

    /// Like [`refresh`](Self::refresh), but serves the cached set unchanged
    /// when it is younger than the refresh cooldown.
    ///
    /// This is the variant the key resolver uses on an unknown key id: a
    /// genuine rotation is picked up after at most one cooldown interval,
    /// while a flood of tokens with fabricated key ids costs at most one
    /// outbound fetch per interval.
    pub async fn refresh_throttled(&self) -> Result<Arc<KeySet>, AuthError> {
        let _guard = self.fetch_guard.lock().await;
        {
            let cached = self.cached.read().await;
            if let Some(c) = cached.as_ref() {
                if c.fetched_at.elapsed() < self.refresh_cooldown {
                    tracing::debug!("JWKS refetch skipped inside cooldown");
                    return Ok(Arc::clone(&c.keys));
                }
            }
        }
        self.fetch_and_store().await
    }

    async fn fresh(&self) -> Option<Arc<KeySet>> {
        let cached = self.cached.read().await;
        cached.as_ref().and_then(|c| match self.ttl {
            Some(ttl) if c.fetched_at.elapsed() >= ttl => None,
            _ => Some(Arc::clone(&c.keys)),
        })
    }

    async fn fetch_and_store(&self) -> Result<Arc<KeySet>, AuthError> {
        tracing::debug!(url = %self.jwks_url, "fetching JWKS");

        let response = self
            .http
            .get(&self.jwks_url)
            .send()
            .await
            .map_err(|e| AuthError::KeyFetch(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AuthError::KeyFetch(format!(
                "JWKS endpoint returned {}",
                status
            )));
        }

        let keys: KeySet = response
            .json()
            .await
            .map_err(|e| AuthError::KeyFetch(format!("invalid JWKS document: {}", e)))?;

        tracing::info!(count = keys.keys.len(), "JWKS fetched");

        let keys = Arc::new(keys);
        let mut cached = self.cached.write().await;
        *cached = Some(CachedKeySet {
            keys: Arc::clone(&keys),
            fetched_at: Instant::now(),
        });
        Ok(keys)
    }
}
