//! Cache storage: the backend trait and the in-memory LRU implementation.

use std::num::NonZeroUsize;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use lru::LruCache;
use metrics::counter;
use thiserror::Error;
use time::{Duration, OffsetDateTime};

use crate::domain::rows::Row;
use crate::infra::clock::Clock;

use super::lock::{rw_read, rw_write};

const DEFAULT_CAPACITY: usize = 4_096;

/// One cached snapshot: the serialized rows plus the instant they were
/// computed. `set_at` drives both the day-boundary freshness check and the
/// `today` refresh-count probe.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedRows {
    pub rows: Vec<Row>,
    pub set_at: OffsetDateTime,
}

#[derive(Debug, Error)]
pub enum CacheError {
    /// Backend failure. The engine swallows this and treats the lookup as
    /// a miss; it never surfaces to callers.
    #[error("cache backend error: {0}")]
    Backend(String),
}

/// Key/value cache over serialized row snapshots.
#[async_trait]
pub trait TopicListCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<CachedRows>, CacheError>;

    async fn set(&self, key: &str, value: CachedRows, ttl: Duration) -> Result<(), CacheError>;

    async fn delete(&self, key: &str) -> Result<(), CacheError>;
}

struct StoredEntry {
    value: CachedRows,
    expires_at: OffsetDateTime,
}

/// In-process cache backend: LRU-bounded map with per-entry expiry checked
/// on read. Expiry uses the injected clock so tests can pin time.
pub struct MemoryCache {
    entries: RwLock<LruCache<String, StoredEntry>>,
    clock: Arc<dyn Clock>,
}

impl MemoryCache {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_capacity(clock, DEFAULT_CAPACITY)
    }

    pub fn with_capacity(clock: Arc<dyn Clock>, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: RwLock::new(LruCache::new(capacity)),
            clock,
        }
    }

    pub fn len(&self) -> usize {
        rw_read(&self.entries, "cache.len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl TopicListCache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<CachedRows>, CacheError> {
        let now = self.clock.now();
        let mut entries = rw_write(&self.entries, "cache.get");
        match entries.get(key) {
            Some(entry) if entry.expires_at > now => {
                counter!("leftframe_cache_hits_total").increment(1);
                Ok(Some(entry.value.clone()))
            }
            Some(_) => {
                entries.pop(key);
                counter!("leftframe_cache_misses_total").increment(1);
                Ok(None)
            }
            None => {
                counter!("leftframe_cache_misses_total").increment(1);
                Ok(None)
            }
        }
    }

    async fn set(&self, key: &str, value: CachedRows, ttl: Duration) -> Result<(), CacheError> {
        let expires_at = self.clock.now() + ttl;
        let evicted = rw_write(&self.entries, "cache.set").push(
            key.to_owned(),
            StoredEntry { value, expires_at },
        );
        counter!("leftframe_cache_stores_total").increment(1);
        if let Some((evicted_key, _)) = evicted {
            if evicted_key != key {
                counter!("leftframe_cache_evictions_total").increment(1);
            }
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        rw_write(&self.entries, "cache.delete").pop(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use crate::infra::clock::FixedClock;

    use super::*;

    fn snapshot(at: OffsetDateTime) -> CachedRows {
        CachedRows {
            rows: vec![Row::topic("rust", "rust", 3)],
            set_at: at,
        }
    }

    #[tokio::test]
    async fn get_after_set_round_trips() {
        let clock = Arc::new(FixedClock::at(datetime!(2024-06-15 10:00 UTC)));
        let cache = MemoryCache::new(clock.clone());

        let value = snapshot(clock.now());
        cache
            .set("global_agenda", value.clone(), Duration::seconds(90))
            .await
            .expect("set succeeds");

        let cached = cache.get("global_agenda").await.expect("get succeeds");
        assert_eq!(cached, Some(value));
    }

    #[tokio::test]
    async fn entries_expire_by_ttl() {
        let clock = Arc::new(FixedClock::at(datetime!(2024-06-15 10:00 UTC)));
        let cache = MemoryCache::new(clock.clone());

        cache
            .set("global_agenda", snapshot(clock.now()), Duration::seconds(90))
            .await
            .expect("set succeeds");

        clock.advance(Duration::seconds(91));
        let cached = cache.get("global_agenda").await.expect("get succeeds");
        assert_eq!(cached, None);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn delete_removes_the_entry() {
        let clock = Arc::new(FixedClock::at(datetime!(2024-06-15 10:00 UTC)));
        let cache = MemoryCache::new(clock.clone());

        cache
            .set("pri_uid_1_today", snapshot(clock.now()), Duration::minutes(5))
            .await
            .expect("set succeeds");
        cache.delete("pri_uid_1_today").await.expect("delete succeeds");

        assert_eq!(
            cache.get("pri_uid_1_today").await.expect("get succeeds"),
            None
        );
    }

    #[tokio::test]
    async fn lru_evicts_the_oldest_key() {
        let clock = Arc::new(FixedClock::at(datetime!(2024-06-15 10:00 UTC)));
        let cache = MemoryCache::with_capacity(clock.clone(), 2);

        for key in ["a", "b", "c"] {
            cache
                .set(key, snapshot(clock.now()), Duration::minutes(5))
                .await
                .expect("set succeeds");
        }

        assert_eq!(cache.get("a").await.expect("get succeeds"), None);
        assert!(cache.get("b").await.expect("get succeeds").is_some());
        assert!(cache.get("c").await.expect("get succeeds").is_some());
    }
}
