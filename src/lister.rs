//! Bucket key listing
//!
//! [`BucketLister`] is stateless: one provider round trip (or a bounded run
//! of them with pagination enabled) per call. [`CachedLister`] puts the
//! key-list cache in front of it for the facade and the HTTP surface.

use crate::cache::ImageCaches;
use crate::config::StorageConfig;
use crate::error::{log_suppressed, ProviderError};
use crate::provider::StorageProvider;
use std::sync::Arc;
use tracing::{debug, warn};

/// Fetches the full set of keys from the provider
pub struct BucketLister {
    provider: Arc<dyn StorageProvider>,
    max_keys: usize,
    follow_pagination: bool,
    max_pages: usize,
}

impl BucketLister {
    pub fn new(config: &StorageConfig, provider: Arc<dyn StorageProvider>) -> Self {
        BucketLister {
            provider,
            max_keys: config.max_keys.max(1),
            follow_pagination: config.follow_pagination,
            max_pages: config.max_pages.max(1),
        }
    }

    pub fn provider(&self) -> &Arc<dyn StorageProvider> {
        &self.provider
    }

    /// Keys under `prefix`; empty on any provider error.
    ///
    /// An empty result means "nothing can match", not "the bucket is empty".
    pub async fn list_keys(&self, prefix: &str) -> Vec<String> {
        match self.try_list_keys(prefix).await {
            Ok(keys) => keys,
            Err(e) => {
                log_suppressed("lister", "list", prefix, &e);
                Vec::new()
            }
        }
    }

    /// Keys under `prefix`, keeping provider errors visible
    pub async fn try_list_keys(&self, prefix: &str) -> Result<Vec<String>, ProviderError> {
        let mut keys = Vec::new();
        let mut continuation: Option<String> = None;
        let mut pages = 0;

        loop {
            let page = self
                .provider
                .list(prefix, self.max_keys, continuation.as_deref())
                .await?;
            pages += 1;
            keys.extend(page.objects.into_iter().map(|o| o.key));

            let Some(next) = page.next_continuation else {
                break;
            };

            if !self.follow_pagination {
                warn!(
                    provider = self.provider.name(),
                    prefix,
                    max_keys = self.max_keys,
                    "bucket listing truncated at the key ceiling; keys past it cannot be matched"
                );
                break;
            }
            if pages >= self.max_pages {
                warn!(
                    provider = self.provider.name(),
                    prefix,
                    pages,
                    keys = keys.len(),
                    "bucket listing stopped at the page limit"
                );
                break;
            }
            continuation = Some(next);
        }

        debug!(provider = self.provider.name(), prefix, pages, keys = keys.len(), "bucket listed");
        Ok(keys)
    }
}

/// [`BucketLister`] behind the key-list cache
pub struct CachedLister {
    lister: BucketLister,
    caches: Arc<ImageCaches>,
}

impl CachedLister {
    pub fn new(lister: BucketLister, caches: Arc<ImageCaches>) -> Self {
        CachedLister { lister, caches }
    }

    pub fn lister(&self) -> &BucketLister {
        &self.lister
    }

    /// Cached keys under `prefix`, refetched once the listing goes stale.
    ///
    /// Failed listings come back empty and are not cached, so the next call
    /// tries the provider again.
    pub async fn keys(&self, prefix: &str) -> Arc<Vec<String>> {
        let cache_key = prefix.to_string();
        if let Some(keys) = self.caches.key_lists.get(&cache_key) {
            debug!(prefix, keys = keys.len(), "key list cache hit");
            return keys;
        }

        match self.lister.try_list_keys(prefix).await {
            Ok(keys) => {
                let keys = Arc::new(keys);
                self.caches.key_lists.insert(cache_key, keys.clone());
                keys
            }
            Err(e) => {
                log_suppressed("lister", "list", prefix, &e);
                Arc::new(Vec::new())
            }
        }
    }

    /// Drop the cached listing for `prefix`
    pub fn invalidate(&self, prefix: &str) {
        self.caches.key_lists.remove(&prefix.to_string());
    }
}
