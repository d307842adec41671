//! Signing key set sources and the process-wide key cache.
//!
//! The cache starts empty, is populated on the first lookup miss and is only
//! refreshed on later misses. A rotated provider key therefore costs one
//! extra round trip rather than an outage. Refreshes are single-flight:
//! concurrent missers queue on one refresh and re-check the cache instead of
//! fetching again.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use jsonwebtoken::DecodingKey;
use jsonwebtoken::jwk::JwkSet;
use log::{debug, info, warn};
use tokio::sync::{Mutex, RwLock};

use super::AuthError;

/// Where verification keys come from.
#[async_trait]
pub trait KeySetSource: Send + Sync {
    async fn fetch(&self) -> Result<JwkSet, AuthError>;
}

/// Fetches a JWKS document over HTTP.
#[derive(Debug, Clone)]
pub struct HttpKeySet {
    client: reqwest::Client,
    url: String,
}

impl HttpKeySet {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, AuthError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AuthError::KeySetUnavailable(format!("building HTTP client: {e}")))?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl KeySetSource for HttpKeySet {
    async fn fetch(&self) -> Result<JwkSet, AuthError> {
        debug!("Fetching signing keys from {}", self.url);
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| AuthError::KeySetUnavailable(format!("{}: {}", self.url, e)))?;

        if !response.status().is_success() {
            return Err(AuthError::KeySetUnavailable(format!(
                "{} returned {}",
                self.url,
                response.status()
            )));
        }

        response
            .json::<JwkSet>()
            .await
            .map_err(|e| AuthError::KeySetUnavailable(format!("parsing key set: {e}")))
    }
}

/// A fixed key set, loaded once from JSON.
#[derive(Debug, Clone)]
pub struct StaticKeySet {
    keys: JwkSet,
}

impl StaticKeySet {
    pub fn new(keys: JwkSet) -> Self {
        Self { keys }
    }

    /// Load a JWKS document from disk.
    pub fn from_file(path: &Path) -> Result<Self, AuthError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            AuthError::KeySetUnavailable(format!("reading {}: {}", path.display(), e))
        })?;
        let keys = serde_json::from_str(&raw).map_err(|e| {
            AuthError::KeySetUnavailable(format!("parsing {}: {}", path.display(), e))
        })?;
        Ok(Self { keys })
    }
}

#[async_trait]
impl KeySetSource for StaticKeySet {
    async fn fetch(&self) -> Result<JwkSet, AuthError> {
        Ok(self.keys.clone())
    }
}

/// Verification keys indexed by key id.
pub struct KeyCache {
    source: Arc<dyn KeySetSource>,
    keys: RwLock<HashMap<String, DecodingKey>>,
    /// Bumped after every successful refresh.
    generation: AtomicU64,
    refresh: Mutex<()>,
}

impl KeyCache {
    pub fn new(source: Arc<dyn KeySetSource>) -> Self {
        Self {
            source,
            keys: RwLock::new(HashMap::new()),
            generation: AtomicU64::new(0),
            refresh: Mutex::new(()),
        }
    }

    /// Number of successful refreshes so far.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Look up a key, refreshing the set at most once on a miss.
    pub async fn get(&self, kid: &str) -> Result<DecodingKey, AuthError> {
        if let Some(key) = self.keys.read().await.get(kid) {
            return Ok(key.clone());
        }

        let seen = self.generation();
        self.refresh_after(seen).await?;

        self.keys
            .read()
            .await
            .get(kid)
            .cloned()
            .ok_or_else(|| AuthError::KeyNotFound(kid.to_string()))
    }

    async fn refresh_after(&self, seen: u64) -> Result<(), AuthError> {
        let _guard = self.refresh.lock().await;

        // Someone else refreshed while we waited for the guard.
        if self.generation() != seen {
            return Ok(());
        }

        let set = self.source.fetch().await?;
        let mut parsed = HashMap::with_capacity(set.keys.len());
        for jwk in &set.keys {
            let Some(kid) = jwk.common.key_id.clone() else {
                debug!("Skipping signing key without kid");
                continue;
            };
            match DecodingKey::from_jwk(jwk) {
                Ok(key) => {
                    parsed.insert(kid, key);
                }
                Err(e) => warn!("Skipping unusable signing key '{}': {}", kid, e),
            }
        }

        info!("Loaded {} signing key(s)", parsed.len());
        *self.keys.write().await = parsed;
        self.generation.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }
}
