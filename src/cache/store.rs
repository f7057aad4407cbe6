//! Response cache storage.

use std::{
    num::NonZeroUsize,
    sync::Mutex,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use lru::LruCache;
use thiserror::Error;

use super::{keys::CacheKey, lock::mutex_lock};

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache backend error: {0}")]
    Backend(String),
}

/// Key/value store holding serialized page envelopes.
///
/// Implementations must tolerate concurrent callers; the read path does no
/// coordination of its own.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &CacheKey) -> Result<Option<Vec<u8>>, CacheError>;

    async fn set(&self, key: &CacheKey, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError>;
}

struct Entry {
    payload: Vec<u8>,
    expires_at: Instant,
}

/// In-process LRU store with per-entry expiry.
pub struct MemoryCache {
    entries: Mutex<LruCache<CacheKey, Entry>>,
}

impl MemoryCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn len(&self) -> usize {
        mutex_lock(&self.entries, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn get(&self, key: &CacheKey) -> Result<Option<Vec<u8>>, CacheError> {
        let mut entries = mutex_lock(&self.entries, "get");
        let expired = match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => {
                return Ok(Some(entry.payload.clone()));
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            entries.pop(key);
        }
        Ok(None)
    }

    async fn set(&self, key: &CacheKey, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError> {
        let entry = Entry {
            payload: value,
            expires_at: Instant::now() + ttl,
        };
        mutex_lock(&self.entries, "set").put(key.clone(), entry);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        cache::keys::{CacheKeyBuilder, KeyRequest},
        config::KeyPrefixes,
        models::query::CommentStyle,
        services::pagination::PageRequest,
    };

    fn key(post_id: i64) -> CacheKey {
        CacheKeyBuilder::new(KeyPrefixes::default())
            .build(&KeyRequest::Thread {
                post_id,
                style: CommentStyle::Default,
                page: PageRequest::new(1, 20),
            })
            .unwrap()
    }

    #[tokio::test]
    async fn returns_what_was_stored() {
        let cache = MemoryCache::new(8);
        cache
            .set(&key(1), b"payload".to_vec(), Duration::from_secs(60))
            .await
            .unwrap();

        assert_eq!(cache.get(&key(1)).await.unwrap(), Some(b"payload".to_vec()));
        assert_eq!(cache.get(&key(2)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn entries_expire_after_their_ttl() {
        let cache = MemoryCache::new(8);
        cache
            .set(&key(1), b"payload".to_vec(), Duration::from_millis(20))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;

        assert_eq!(cache.get(&key(1)).await.unwrap(), None);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn evicts_least_recently_used_beyond_capacity() {
        let cache = MemoryCache::new(2);
        let ttl = Duration::from_secs(60);
        cache.set(&key(1), b"1".to_vec(), ttl).await.unwrap();
        cache.set(&key(2), b"2".to_vec(), ttl).await.unwrap();
        cache.get(&key(1)).await.unwrap();
        cache.set(&key(3), b"3".to_vec(), ttl).await.unwrap();

        assert!(cache.get(&key(1)).await.unwrap().is_some());
        assert!(cache.get(&key(2)).await.unwrap().is_none());
        assert_eq!(cache.len(), 2);
    }
}
