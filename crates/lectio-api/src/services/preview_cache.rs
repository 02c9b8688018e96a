//! Bounded TTL cache for preview responses.
//!
//! Capacity is enforced by evicting the entry with the fewest reads,
//! so one-off lookups make room before popular videos do. Expired
//! entries are dropped lazily on read and in bulk by the sweeper.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;

use crate::config::{PREVIEW_CACHE_CAPACITY, PREVIEW_CACHE_TTL};

#[derive(Debug)]
struct CacheEntry<T> {
    value: T,
    created_at: Instant,
    access_count: u64,
}

/// In-memory cache keyed by video id.
#[derive(Clone)]
pub struct PreviewCache<T> {
    entries: Arc<RwLock<HashMap<String, CacheEntry<T>>>>,
    capacity: usize,
    ttl: Duration,
}

impl<T: Clone> Default for PreviewCache<T> {
    fn default() -> Self {
        Self::new(PREVIEW_CACHE_CAPACITY, PREVIEW_CACHE_TTL)
    }
}

impl<T: Clone> PreviewCache<T> {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            capacity,
            ttl,
        }
    }

    /// Look up a fresh entry, counting the read. Expired entries are
    /// removed and reported as a miss.
    pub async fn get(&self, key: &str) -> Option<T> {
        let mut entries = self.entries.write().await;
        match entries.get_mut(key) {
            Some(entry) if entry.created_at.elapsed() <= self.ttl => {
                entry.access_count += 1;
                metrics::counter!("gateway_preview_cache_total", "result" => "hit").increment(1);
                Some(entry.value.clone())
            }
            Some(_) => {
                entries.remove(key);
                metrics::counter!("gateway_preview_cache_total", "result" => "expired")
                    .increment(1);
                None
            }
            None => {
                metrics::counter!("gateway_preview_cache_total", "result" => "miss").increment(1);
                None
            }
        }
    }

    /// Insert or replace an entry, evicting the least-read entry when
    /// the cache would exceed capacity. The insert itself counts as
    /// the first access.
    pub async fn insert(&self, key: &str, value: T) {
        let mut entries = self.entries.write().await;
        entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                created_at: Instant::now(),
                access_count: 1,
            },
        );

        if entries.len() > self.capacity {
            let coldest = entries
                .iter()
                .min_by_key(|(_, e)| e.access_count)
                .map(|(k, _)| k.clone());
            if let Some(key) = coldest {
                entries.remove(&key);
            }
        }
    }

    /// Drop all expired entries. Returns how many were removed.
    pub async fn sweep(&self) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, e| e.created_at.elapsed() <= self.ttl);
        before - entries.len()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }
}
