use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::errors::AuthError;

pub const DEFAULT_KEY_TTL: Duration = Duration::from_secs(3600);
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(2);

/// One public key as published by the identity provider's JWKS endpoint.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct JwkKey {
    pub kid: String,
    #[serde(default)]
    pub alg: Option<String>,
    #[serde(default)]
    pub kty: String,
    #[serde(default)]
    pub n: Option<String>,
    #[serde(default)]
    pub e: Option<String>,
    #[serde(default)]
    pub k: Option<String>,
}

/// Immutable snapshot of the provider's key set. Replaced wholesale on
/// refresh; keys keep the provider's publication order.
#[derive(Clone, Debug)]
pub struct SigningKeySet {
    keys: Vec<JwkKey>,
    pub fetched_at: Instant,
    pub expires_at: Option<Instant>,
}

impl SigningKeySet {
    fn new(keys: Vec<JwkKey>, ttl: Option<Duration>) -> Self {
        let now = Instant::now();
        Self {
            keys,
            fetched_at: now,
            expires_at: ttl.map(|ttl| now + ttl),
        }
    }

    pub fn find(&self, kid: &str) -> Option<&JwkKey> {
        self.keys.iter().find(|key| key.kid == kid)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn is_fresh(&self, now: Instant) -> bool {
        match self.expires_at {
            Some(expires_at) => now < expires_at,
            None => true,
        }
    }
}

#[async_trait]
pub trait KeyFetcher: Send + Sync {
    async fn fetch_keys(&self) -> Result<Vec<JwkKey>, AuthError>;
}

#[derive(Deserialize)]
struct JwkSetPayload {
    keys: Vec<JwkKey>,
}

/// Fetches the provider's published JWKS document over HTTPS.
pub struct HttpKeyFetcher {
    client: reqwest::Client,
    uri: String,
}

impl HttpKeyFetcher {
    pub fn new(uri: impl Into<String>) -> Result<Self, AuthError> {
        Self::with_timeout(uri, DEFAULT_FETCH_TIMEOUT)
    }

    pub fn with_timeout(uri: impl Into<String>, timeout: Duration) -> Result<Self, AuthError> {
        let client = reqwest::Client::builder()
            .use_rustls_tls()
            .timeout(timeout)
            .build()
            .map_err(|err| {
                AuthError::internal(&format!("failed to build jwks http client: {err}"))
            })?;
        Ok(Self {
            client,
            uri: uri.into(),
        })
    }
}

#[async_trait]
impl KeyFetcher for HttpKeyFetcher {
    async fn fetch_keys(&self) -> Result<Vec<JwkKey>, AuthError> {
        let response = self
            .client
            .get(&self.uri)
            .send()
            .await
            .map_err(|err| AuthError::provider_unavailable(&format!("jwks fetch error: {err}")))?;
        if response.status() != StatusCode::OK {
            return Err(AuthError::provider_unavailable(&format!(
                "jwks fetch status: {}",
                response.status()
            )));
        }
        let payload: JwkSetPayload = response
            .json()
            .await
            .map_err(|err| AuthError::provider_unavailable(&format!("jwks decode error: {err}")))?;
        Ok(payload.keys)
    }
}

/// Static key set for tests and deployments that pin provider keys.
pub struct StaticKeyFetcher {
    keys: Vec<JwkKey>,
}

impl StaticKeyFetcher {
    pub fn new(keys: Vec<JwkKey>) -> Self {
        Self { keys }
    }
}

#[async_trait]
impl KeyFetcher for StaticKeyFetcher {
    async fn fetch_keys(&self) -> Result<Vec<JwkKey>, AuthError> {
        Ok(self.keys.clone())
    }
}

/// Process-wide cache of the provider's signing keys.
///
/// Refreshes are single-flight: callers that arrive while a refresh is in
/// flight wait on the refresh mutex and pick up its result instead of issuing
/// their own fetch. The current set is swapped atomically behind the RwLock,
/// so readers never observe a partially updated set.
pub struct KeySetCache {
    fetcher: Arc<dyn KeyFetcher>,
    ttl: Option<Duration>,
    current: RwLock<Option<Arc<SigningKeySet>>>,
    refresh: tokio::sync::Mutex<()>,
    stale_served: AtomicU64,
}

impl KeySetCache {
    pub fn new(fetcher: Arc<dyn KeyFetcher>, ttl: Option<Duration>) -> Self {
        Self {
            fetcher,
            ttl,
            current: RwLock::new(None),
            refresh: tokio::sync::Mutex::new(()),
            stale_served: AtomicU64::new(0),
        }
    }

    /// Static sets never expire and never refresh.
    pub fn static_keys(keys: Vec<JwkKey>) -> Self {
        Self::new(Arc::new(StaticKeyFetcher::new(keys)), None)
    }

    /// Returns the current key set, refreshing first when the cached one is
    /// missing or past its TTL.
    pub async fn get(&self) -> Result<Arc<SigningKeySet>, AuthError> {
        if let Some(set) = self.fresh() {
            return Ok(set);
        }

        let _guard = self.refresh.lock().await;
        // A refresh that completed while we waited satisfies this call.
        if let Some(set) = self.fresh() {
            return Ok(set);
        }
        self.refresh_locked().await
    }

    /// Unconditionally refetches, for key-rotation misses. Still serialized
    /// behind the refresh mutex and still falls back to the previous set when
    /// the provider is unreachable.
    pub async fn force_refresh(&self) -> Result<Arc<SigningKeySet>, AuthError> {
        let _guard = self.refresh.lock().await;
        self.refresh_locked().await
    }

    /// Number of times an expired set was served because a refresh failed.
    pub fn stale_served(&self) -> u64 {
        self.stale_served.load(Ordering::Relaxed)
    }

    fn fresh(&self) -> Option<Arc<SigningKeySet>> {
        let guard = self.current.read();
        guard
            .as_ref()
            .filter(|set| set.is_fresh(Instant::now()))
            .cloned()
    }

    async fn refresh_locked(&self) -> Result<Arc<SigningKeySet>, AuthError> {
        match self.fetcher.fetch_keys().await {
            Ok(keys) => {
                debug!(key_count = keys.len(), "signing key set refreshed");
                let set = Arc::new(SigningKeySet::new(keys, self.ttl));
                *self.current.write() = Some(set.clone());
                Ok(set)
            }
            Err(err) => {
                let previous = self.current.read().clone();
                match previous {
                    Some(set) => {
                        self.stale_served.fetch_add(1, Ordering::Relaxed);
                        warn!(error = %err, "key refresh failed, serving stale key set");
                        Ok(set)
                    }
                    None => Err(err),
                }
            }
        }
    }
}
