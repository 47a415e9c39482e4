//! Page storage with per-entry expiry and LRU eviction.

use std::sync::RwLock;
use std::time::Duration;

use bytes::Bytes;
use lru::LruCache;
use metrics::counter;
use tokio::time::Instant;

use super::config::PageCacheConfig;
use super::keys::PageKey;
use super::lock::{rw_read, rw_write};

const SOURCE: &str = "cache::store";

/// Cached HTTP response.
#[derive(Debug, Clone)]
pub struct CachedResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

struct Entry {
    response: CachedResponse,
    stored_at: Instant,
}

pub struct PageStore {
    ttl: Duration,
    entries: RwLock<LruCache<PageKey, Entry>>,
}

impl PageStore {
    pub fn new(config: &PageCacheConfig) -> Self {
        Self {
            ttl: config.ttl,
            entries: RwLock::new(LruCache::new(config.capacity_non_zero())),
        }
    }

    /// Fetch a page that is still within its time-to-live. Expired entries
    /// are dropped on the way.
    pub fn get(&self, key: &PageKey) -> Option<CachedResponse> {
        let mut entries = rw_write(&self.entries, SOURCE, "get");
        let fresh = match entries.get(key) {
            Some(entry) => entry.stored_at.elapsed() < self.ttl,
            None => {
                counter!("yatube_page_cache_miss_total").increment(1);
                return None;
            }
        };

        if fresh {
            counter!("yatube_page_cache_hit_total").increment(1);
            entries.get(key).map(|entry| entry.response.clone())
        } else {
            entries.pop(key);
            counter!("yatube_page_cache_expired_total").increment(1);
            counter!("yatube_page_cache_miss_total").increment(1);
            None
        }
    }

    /// Store a page, returning the key that had to make room for it.
    pub fn set(&self, key: PageKey, response: CachedResponse) -> Option<PageKey> {
        let entry = Entry {
            response,
            stored_at: Instant::now(),
        };
        let mut entries = rw_write(&self.entries, SOURCE, "set");
        let evicted = entries
            .push(key.clone(), entry)
            .map(|(old_key, _)| old_key)
            .filter(|old_key| *old_key != key);
        if evicted.is_some() {
            counter!("yatube_page_cache_evict_total").increment(1);
        }
        evicted
    }

    /// Drop every stored page.
    pub fn invalidate_all(&self) {
        rw_write(&self.entries, SOURCE, "invalidate_all").clear();
        counter!("yatube_page_cache_clear_total").increment(1);
    }

    pub fn len(&self) -> usize {
        rw_read(&self.entries, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
