//! Image loader facade
//!
//! The single entry point for presentation code. It never fails: every
//! path through [`ImageLoader::load_image`] ends in a string the page can
//! put in an `<img src>`, even if that string is the original (possibly
//! broken) reference and the browser's `onError` swap has to take over.

use crate::cache::ImageCaches;
use crate::clock::{Clock, SystemClock};
use crate::config::{StorageConfig, UrlStrategy};
use crate::error::{log_suppressed, ImageError};
use crate::lister::{BucketLister, CachedLister};
use crate::matcher::find_key;
use crate::normalize::is_absolute_url;
use crate::provider::StorageProvider;
use crate::resolver::UrlResolver;
use std::sync::Arc;
use tracing::{debug, info};

/// Lister, matcher and resolver wired to one provider and one set of caches
pub struct ImageLoader {
    enabled: bool,
    fallback_image: String,
    lister: CachedLister,
    resolver: UrlResolver,
    caches: Arc<ImageCaches>,
}

impl ImageLoader {
    /// Build a loader on the wall clock
    pub fn new(config: &StorageConfig, provider: Arc<dyn StorageProvider>) -> Self {
        Self::with_clock(config, provider, Arc::new(SystemClock))
    }

    /// Build a loader whose caches read `clock`
    pub fn with_clock(
        config: &StorageConfig,
        provider: Arc<dyn StorageProvider>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let caches = Arc::new(ImageCaches::new(config, clock));
        Self::with_caches(config, provider, caches)
    }

    /// Build a loader around caches created elsewhere
    pub fn with_caches(
        config: &StorageConfig,
        provider: Arc<dyn StorageProvider>,
        caches: Arc<ImageCaches>,
    ) -> Self {
        for problem in config.validate() {
            log_suppressed("loader", "configure", provider.name(), &ImageError::Config(problem));
        }
        info!(
            enabled = config.use_object_storage,
            provider = provider.name(),
            bucket = config.bucket_name.as_str(),
            "image loader ready"
        );

        let lister = CachedLister::new(BucketLister::new(config, provider.clone()), caches.clone());
        let resolver = UrlResolver::new(config, provider, caches.clone());

        ImageLoader {
            enabled: config.use_object_storage,
            fallback_image: config.fallback_image_path.clone(),
            lister,
            resolver,
            caches,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn fallback_image(&self) -> &str {
        &self.fallback_image
    }

    pub fn strategy(&self) -> &UrlStrategy {
        self.resolver.strategy()
    }

    pub fn caches(&self) -> &Arc<ImageCaches> {
        &self.caches
    }

    pub fn lister(&self) -> &CachedLister {
        &self.lister
    }

    pub fn resolver(&self) -> &UrlResolver {
        &self.resolver
    }

    /// Resolve `requested` against an already-fetched key list.
    ///
    /// - empty path: the fallback image
    /// - absolute URL: unchanged
    /// - storage disabled or no key list: unchanged
    /// - no matching key, or the key cannot be resolved: unchanged
    pub async fn load_image(&self, requested: &str, key_list: Option<&[String]>) -> String {
        if requested.trim().is_empty() {
            return self.fallback_image.clone();
        }
        if is_absolute_url(requested) {
            return requested.to_string();
        }

        let keys = match key_list {
            Some(keys) if self.enabled => keys,
            _ => return requested.to_string(),
        };

        let Some(key) = find_key(requested, keys) else {
            debug!(path = requested, keys = keys.len(), "no bucket key for path");
            return requested.to_string();
        };

        match self.resolver.resolve(&key).await {
            Ok(url) => url,
            Err(e) => {
                log_suppressed("loader", "resolve", &key, &e);
                requested.to_string()
            }
        }
    }

    /// Resolve `requested` using the cached bucket listing
    pub async fn load(&self, requested: &str) -> String {
        if !self.enabled {
            return self.load_image(requested, None).await;
        }
        let keys = self.lister.keys("").await;
        self.load_image(requested, Some(keys.as_slice())).await
    }

    /// Resolve several paths against one listing, preserving order
    pub async fn load_many<S: AsRef<str>>(&self, paths: &[S]) -> Vec<String> {
        let keys = if self.enabled {
            Some(self.lister.keys("").await)
        } else {
            None
        };

        let mut urls = Vec::with_capacity(paths.len());
        for path in paths {
            let url = self
                .load_image(path.as_ref(), keys.as_ref().map(|k| k.as_slice()))
                .await;
            urls.push(url);
        }
        urls
    }

    /// Bucket key for `requested`, using the cached listing
    pub async fn match_key(&self, requested: &str) -> Option<String> {
        let keys = self.lister.keys("").await;
        find_key(requested, &keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryProvider;

    fn public_config() -> StorageConfig {
        StorageConfig {
            use_object_storage: true,
            use_signed_urls: false,
            public_base_url: Some("https://cdn.example.com".to_string()),
            bucket_name: "b".to_string(),
            ..StorageConfig::default()
        }
    }

    fn loader(config: &StorageConfig, keys: &[&str]) -> (ImageLoader, Arc<InMemoryProvider>) {
        let provider = Arc::new(InMemoryProvider::with_keys("b", keys.iter().copied()));
        (ImageLoader::new(config, provider.clone()), provider)
    }

    fn owned(keys: &[&str]) -> Vec<String> {
        keys.iter().map(|k| k.to_string()).collect()
    }

    #[tokio::test]
    async fn test_empty_path_returns_fallback() {
        let (loader, _) = loader(&public_config(), &[]);
        assert_eq!(loader.load_image("", Some(&[] as &[String])).await, "/images/fallback.jpg");
        assert_eq!(loader.load_image("  ", None).await, "/images/fallback.jpg");
    }

    #[tokio::test]
    async fn test_absolute_url_passes_through() {
        let (loader, _) = loader(&public_config(), &[]);
        let url = "https://example.org/a.jpg";
        assert_eq!(loader.load_image(url, Some(owned(&["a.jpg"]).as_slice())).await, url);
    }

    #[tokio::test]
    async fn test_disabled_or_missing_list_degrades_to_original() {
        let disabled = StorageConfig {
            use_object_storage: false,
            ..public_config()
        };
        let (loader, provider) = loader(&disabled, &["a.jpg"]);
        let keys = owned(&["a.jpg"]);
        assert_eq!(loader.load_image("/images/a.jpg", Some(keys.as_slice())).await, "/images/a.jpg");
        assert_eq!(loader.load("/images/a.jpg").await, "/images/a.jpg");
        assert_eq!(provider.list_calls(), 0);

        let (loader, _) = self::loader(&public_config(), &["a.jpg"]);
        assert_eq!(loader.load_image("/images/a.jpg", None).await, "/images/a.jpg");
    }

    #[tokio::test]
    async fn test_public_end_to_end() {
        let (loader, _) = loader(&public_config(), &[]);
        let keys = owned(&["ASCELOGO/ASCE.png"]);
        assert_eq!(
            loader.load_image("/images/ASCELOGO/ASCE.png", Some(keys.as_slice())).await,
            "https://cdn.example.com/ASCELOGO/ASCE.png"
        );
    }

    #[tokio::test]
    async fn test_empty_key_list_degrades_to_original() {
        let (loader, _) = loader(&public_config(), &[]);
        assert_eq!(
            loader.load_image("/images/ASCELOGO/ASCE.png", Some(&[] as &[String])).await,
            "/images/ASCELOGO/ASCE.png"
        );
    }

    #[tokio::test]
    async fn test_resolution_error_degrades_to_original() {
        let config = StorageConfig {
            use_signed_urls: true,
            ..public_config()
        };
        let (loader, _) = loader(&config, &[]);
        let keys = owned(&["a.jpg"]);
        assert_eq!(loader.load_image("/images/a.jpg", Some(keys.as_slice())).await, "/images/a.jpg");
    }

    #[tokio::test]
    async fn test_load_uses_cached_listing() {
        let (loader, provider) = loader(&public_config(), &["Tabling/booth.jpg", "logo.png"]);

        let urls = loader
            .load_many(&["/images/Photos/Tabling/booth.jpg", "/images/logo.png", "/images/none.jpg"])
            .await;
        assert_eq!(
            urls,
            vec![
                "https://cdn.example.com/Tabling/booth.jpg".to_string(),
                "https://cdn.example.com/logo.png".to_string(),
                "/images/none.jpg".to_string(),
            ]
        );

        loader.load("/images/logo.png").await;
        assert_eq!(provider.list_calls(), 1);
        assert_eq!(
            loader.match_key("/images/Photos/Tabling/booth.jpg").await.as_deref(),
            Some("Tabling/booth.jpg")
        );
    }
}
