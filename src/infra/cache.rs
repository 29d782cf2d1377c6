//! In-process comment cache used when no Redis endpoint is configured.

use std::{
    num::NonZeroUsize,
    sync::Arc,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use bytes::Bytes;
use lru::LruCache;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::application::stores::{CacheError, CommentCache};
use crate::domain::entities::CommentRecord;

/// Serialized comment snapshots with per-entry expiry and LRU eviction.
///
/// Entries are stored encoded so the cache never hands out shared state and
/// behaves like the networked backend with respect to snapshots. Once
/// `capacity` entries are held, inserting evicts the least recently used one.
#[derive(Clone)]
pub struct ProcessCache {
    entries: Arc<RwLock<LruCache<Uuid, CachedSnapshot>>>,
}

#[derive(Clone)]
struct CachedSnapshot {
    payload: Bytes,
    expires_at: Instant,
}

impl CachedSnapshot {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at > now
    }
}

impl ProcessCache {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            entries: Arc::new(RwLock::new(LruCache::new(capacity))),
        }
    }

    pub async fn capacity(&self) -> NonZeroUsize {
        self.entries.read().await.cap()
    }

    /// Number of unexpired entries.
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        let guard = self.entries.read().await;
        guard.iter().filter(|(_, entry)| entry.is_live(now)).count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn contains(&self, id: Uuid) -> bool {
        let guard = self.entries.read().await;
        guard
            .peek(&id)
            .is_some_and(|entry| entry.is_live(Instant::now()))
    }

    /// Entries held, expired ones included.
    #[cfg(test)]
    async fn occupied(&self) -> usize {
        self.entries.read().await.len()
    }
}

#[async_trait]
impl CommentCache for ProcessCache {
    async fn get(&self, id: Uuid) -> Result<Option<CommentRecord>, CacheError> {
        let payload = {
            let now = Instant::now();
            let mut guard = self.entries.write().await;
            match guard
                .get(&id)
                .map(|entry| entry.is_live(now).then(|| entry.payload.clone()))
            {
                Some(Some(payload)) => Some(payload),
                Some(None) => {
                    guard.pop(&id);
                    None
                }
                None => None,
            }
        };

        match payload {
            Some(payload) => Ok(Some(serde_json::from_slice(&payload)?)),
            None => Ok(None),
        }
    }

    async fn set(&self, record: &CommentRecord, ttl: Duration) -> Result<(), CacheError> {
        let expires_at = Instant::now()
            .checked_add(ttl)
            .ok_or(CacheError::TtlOutOfRange(ttl))?;
        let entry = CachedSnapshot {
            payload: Bytes::from(serde_json::to_vec(record)?),
            expires_at,
        };

        let mut guard = self.entries.write().await;
        guard.put(record.id, entry);
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<(), CacheError> {
        let mut guard = self.entries.write().await;
        guard.pop(&id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use time::OffsetDateTime;

    use super::*;

    fn record() -> CommentRecord {
        let now = OffsetDateTime::now_utc();
        CommentRecord {
            id: Uuid::new_v4(),
            tweet_id: Uuid::new_v4(),
            author_id: Uuid::new_v4(),
            text: "cached".into(),
            image_name: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn cache_with_capacity(capacity: usize) -> ProcessCache {
        ProcessCache::new(NonZeroUsize::new(capacity).expect("non-zero capacity"))
    }

    #[tokio::test]
    async fn stores_and_returns_snapshots() {
        let cache = cache_with_capacity(16);
        let record = record();

        cache
            .set(&record, Duration::from_secs(60))
            .await
            .expect("set");

        let cached = cache.get(record.id).await.expect("get");
        assert_eq!(cached, Some(record));
    }

    #[tokio::test]
    async fn expired_entries_read_as_misses() {
        let cache = cache_with_capacity(16);
        let record = record();

        cache.set(&record, Duration::ZERO).await.expect("set");

        assert_eq!(cache.get(record.id).await.expect("get"), None);
        assert!(!cache.contains(record.id).await);
        assert_eq!(cache.occupied().await, 0);
    }

    #[tokio::test]
    async fn unread_entries_are_bounded_by_capacity() {
        let cache = cache_with_capacity(32);

        for _ in 0..10_000 {
            cache.set(&record(), Duration::ZERO).await.expect("set");
        }

        assert_eq!(cache.occupied().await, 32);
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn least_recently_used_entry_is_evicted_at_capacity() {
        let cache = cache_with_capacity(2);
        let ttl = Duration::from_secs(60);
        let first = record();
        let second = record();
        let third = record();

        cache.set(&first, ttl).await.expect("set first");
        cache.set(&second, ttl).await.expect("set second");
        assert!(cache.get(first.id).await.expect("touch first").is_some());
        cache.set(&third, ttl).await.expect("set third");

        assert!(cache.contains(first.id).await);
        assert!(!cache.contains(second.id).await);
        assert!(cache.contains(third.id).await);
        assert_eq!(cache.len().await, 2);
    }

    #[tokio::test]
    async fn unrepresentable_ttl_is_an_error_not_a_panic() {
        let cache = cache_with_capacity(4);
        let record = record();

        let err = cache
            .set(&record, Duration::MAX)
            .await
            .expect_err("ttl overflow");

        assert!(matches!(err, CacheError::TtlOutOfRange(ttl) if ttl == Duration::MAX));
        assert!(!cache.contains(record.id).await);
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let cache = cache_with_capacity(16);
        let record = record();
        cache
            .set(&record, Duration::from_secs(60))
            .await
            .expect("set");

        cache.delete(record.id).await.expect("first delete");
        cache.delete(record.id).await.expect("second delete");

        assert!(cache.is_empty().await);
    }
}
