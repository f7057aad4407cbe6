//! Cache-aside read path.
//!
//! A hit returns the stored JSON verbatim; assembly and visibility checks are
//! not re-run. A miss computes the page, stores it and returns it. Store
//! failures are logged and never fail the request. Concurrent misses on the
//! same key each compute and each write; the last write wins.

use std::{future::Future, sync::Arc, time::Duration};

use serde::Serialize;
use serde_json::value::RawValue;

use super::{
    keys::{CacheKey, CacheKeyBuilder, KeyRequest},
    store::CacheStore,
};

#[derive(Clone)]
pub struct ReadThroughCache {
    store: Arc<dyn CacheStore>,
    keys: CacheKeyBuilder,
}

impl ReadThroughCache {
    pub fn new(store: Arc<dyn CacheStore>, keys: CacheKeyBuilder) -> Self {
        Self { store, keys }
    }

    pub fn key(&self, request: &KeyRequest<'_>) -> Option<CacheKey> {
        self.keys.build(request)
    }

    /// The stored payload, or `None` on a miss.
    ///
    /// Backend errors and payloads that are not valid JSON count as misses.
    pub async fn fetch(&self, key: &CacheKey) -> Option<Box<RawValue>> {
        let bytes = match self.store.get(key).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                tracing::debug!(key = %key, "Cache miss");
                return None;
            }
            Err(e) => {
                tracing::warn!(key = %key, "Cache get failed, reading through: {}", e);
                return None;
            }
        };

        match serde_json::from_slice::<Box<RawValue>>(&bytes) {
            Ok(payload) => {
                tracing::debug!(key = %key, "Cache hit");
                Some(payload)
            }
            Err(e) => {
                tracing::warn!(key = %key, "Discarding undecodable cache entry: {}", e);
                None
            }
        }
    }

    /// Writes `payload` under `key`. Failures are logged and swallowed.
    pub async fn store(&self, key: &CacheKey, payload: &RawValue, ttl: Duration) {
        let bytes = payload.get().as_bytes().to_vec();
        if let Err(e) = self.store.set(key, bytes, ttl).await {
            tracing::warn!(key = %key, "Cache set failed: {}", e);
        }
    }

    /// Serves `request` from the cache, or runs `compute` and caches its result.
    ///
    /// Requests that map to no key always run `compute` and are never stored.
    pub async fn get_or_compute<T, E, F, Fut>(
        &self,
        request: &KeyRequest<'_>,
        ttl: Duration,
        compute: F,
    ) -> Result<Box<RawValue>, E>
    where
        T: Serialize,
        E: From<serde_json::Error>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let key = self.key(request);

        if let Some(key) = &key {
            if let Some(payload) = self.fetch(key).await {
                return Ok(payload);
            }
        }

        let value = compute().await?;
        let payload = serde_json::value::to_raw_value(&value)?;

        if let Some(key) = &key {
            self.store(key, &payload, ttl).await;
        }

        Ok(payload)
    }
}
