// Result cache: memoizes facet computations and reference lists with a TTL.
//
// The store behind it is injected. Store failures are logged and the value is
// computed directly; they never reach the caller.

use crate::error::CacheError;
use async_trait::async_trait;
use cached::{Cached, SizedCache};
use serde::{de::DeserializeOwned, Serialize};
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Returns the value stored under `key` unless it has expired.
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError>;
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: String,
    expires_at: Instant,
}

impl CacheEntry {
    fn is_expired(&self) -> bool {
        self.expires_at <= Instant::now()
    }
}

/// Bounded process-local store; least recently used entries are evicted first.
pub struct MemoryCacheStore {
    entries: Mutex<SizedCache<String, CacheEntry>>,
}

impl MemoryCacheStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(SizedCache::with_size(capacity.max(1))),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, SizedCache<String, CacheEntry>>, CacheError> {
        self.entries
            .lock()
            .map_err(|_| CacheError::Unavailable("memory cache lock poisoned".into()))
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let key = key.to_string();
        let mut entries = self.lock()?;
        let expired = match entries.cache_get(&key) {
            Some(entry) if !entry.is_expired() => return Ok(Some(entry.value.clone())),
            Some(_) => true,
            None => false,
        };
        if expired {
            entries.cache_remove(&key);
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        let entry = CacheEntry {
            value,
            expires_at: Instant::now() + ttl,
        };
        self.lock()?.cache_set(key.to_string(), entry);
        Ok(())
    }
}

/// Deterministic cache key for a value of `kind` computed over `context`.
pub fn fingerprint<C: Serialize>(kind: &str, context: &C) -> Result<String, CacheError> {
    Ok(format!("{kind}:{}", serde_json::to_string(context)?))
}

#[derive(Clone)]
pub struct ResultCache {
    store: Arc<dyn CacheStore>,
}

impl ResultCache {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self { store }
    }

    /// Returns the cached value for `key`, or computes, stores and returns it.
    /// Concurrent misses may both compute; the last write wins.
    pub async fn get_or_compute<T, E, F, Fut>(&self, key: &str, ttl: Duration, compute: F) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        match self.store.get(key).await {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(value) => {
                    tracing::debug!(key, "Cache hit");
                    return Ok(value);
                }
                Err(e) => tracing::warn!(key, error = %e, "Discarding undecodable cache entry"),
            },
            Ok(None) => tracing::debug!(key, "Cache miss"),
            Err(e) => tracing::warn!(key, error = %e, "Cache unavailable, computing directly"),
        }

        let value = compute().await?;

        match serde_json::to_string(&value) {
            Ok(raw) => {
                if let Err(e) = self.store.set(key, raw, ttl).await {
                    tracing::warn!(key, error = %e, "Failed to store computed value in cache");
                }
            }
            Err(e) => tracing::warn!(key, error = %e, "Failed to serialize value for cache"),
        }
        Ok(value)
    }

    /// [`get_or_compute`](Self::get_or_compute) keyed by [`fingerprint`].
    pub async fn get_or_compute_for<C, T, E, F, Fut>(
        &self,
        kind: &str,
        context: &C,
        ttl: Duration,
        compute: F,
    ) -> Result<T, E>
    where
        C: Serialize,
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        match fingerprint(kind, context) {
            Ok(key) => self.get_or_compute(&key, ttl, compute).await,
            Err(e) => {
                tracing::warn!(kind, error = %e, "Failed to build cache key, computing directly");
                compute().await
            }
        }
    }
}
