//! Expiring LRU caches for signed URLs and bucket listings
//!
//! Both caches are created once at startup, bundled in [`ImageCaches`] and
//! shared by `Arc`. Expiry is checked when an entry is read; nothing runs in
//! the background. An entry is dead at its `expires_at`, not one tick later.

use crate::clock::Clock;
use crate::config::StorageConfig;
use chrono::{DateTime, Duration, Utc};
use lru::LruCache;
use parking_lot::Mutex;
use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tracing::debug;

/// Listing caches hold one entry per prefix; the site uses a handful
const KEY_LIST_CAPACITY: usize = 64;

#[derive(Debug, Clone)]
struct Entry<V> {
    value: V,
    expires_at: DateTime<Utc>,
}

/// LRU cache whose entries expire after a fixed lifetime
pub struct TtlCache<K: Hash + Eq, V: Clone> {
    entries: Mutex<LruCache<K, Entry<V>>>,
    lifetime: Duration,
    clock: Arc<dyn Clock>,
}

impl<K: Hash + Eq, V: Clone> TtlCache<K, V> {
    /// Create a cache holding at most `capacity` entries (minimum 1)
    pub fn new(capacity: usize, lifetime: Duration, clock: Arc<dyn Clock>) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        TtlCache {
            entries: Mutex::new(LruCache::new(capacity)),
            lifetime,
            clock,
        }
    }

    /// Live value for `key`. Expired entries are dropped on the way out.
    pub fn get(&self, key: &K) -> Option<V> {
        let now = self.clock.now();
        let mut entries = self.entries.lock();

        let expired = match entries.get(key) {
            Some(entry) if now < entry.expires_at => return Some(entry.value.clone()),
            Some(_) => true,
            None => false,
        };
        if expired {
            entries.pop(key);
        }
        None
    }

    /// Current time on the cache's clock
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Store `value` for the cache's lifetime; returns its expiry
    pub fn insert(&self, key: K, value: V) -> DateTime<Utc> {
        self.insert_at(key, value, self.clock.now())
    }

    /// Store `value` with its lifetime counted from `issued_at`.
    ///
    /// An expiry past the representable range never expires.
    pub fn insert_at(&self, key: K, value: V, issued_at: DateTime<Utc>) -> DateTime<Utc> {
        let expires_at = issued_at
            .checked_add_signed(self.lifetime)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        self.entries.lock().put(key, Entry { value, expires_at });
        expires_at
    }

    /// Expiry of a cached entry, live or not
    pub fn expires_at(&self, key: &K) -> Option<DateTime<Utc>> {
        self.entries.lock().peek(key).map(|e| e.expires_at)
    }

    pub fn remove(&self, key: &K) -> Option<V> {
        self.entries.lock().pop(key).map(|e| e.value)
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Entries currently stored, including expired ones not yet read
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }
}

/// Signed URLs keyed by object key
pub type SignedUrlCache = TtlCache<String, String>;

/// Bucket key lists keyed by listing prefix
pub type KeyListCache = TtlCache<String, Arc<Vec<String>>>;

/// Process-wide caches, created at startup and injected where needed
pub struct ImageCaches {
    pub signed_urls: SignedUrlCache,
    pub key_lists: KeyListCache,
}

impl ImageCaches {
    pub fn new(config: &StorageConfig, clock: Arc<dyn Clock>) -> Self {
        ImageCaches {
            signed_urls: TtlCache::new(
                config.signed_url_cache_capacity,
                config.signed_url_cache_lifetime(),
                clock.clone(),
            ),
            key_lists: TtlCache::new(KEY_LIST_CAPACITY, config.key_list_ttl(), clock),
        }
    }

    /// Drop everything; the next request refetches
    pub fn clear(&self) {
        let urls = self.signed_urls.len();
        let lists = self.key_lists.len();
        self.signed_urls.clear();
        self.key_lists.clear();
        debug!(signed_urls = urls, key_lists = lists, "image caches cleared");
    }
}
