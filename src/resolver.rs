//! Turns a matched bucket key into a URL the browser can load
//!
//! The strategy is fixed at construction from [`StorageConfig`]:
//!
//! - **Signed** - ask the provider for a time-limited URL, cached per key
//!   until shortly before it expires
//! - **Public** - `{base}/{key}`, no network call
//! - **Unavailable** - configuration cannot support either; every resolve
//!   fails and callers fall back

use crate::cache::ImageCaches;
use crate::config::{StorageConfig, UrlStrategy};
use crate::error::{log_suppressed, ImageError, ProviderError, Result};
use crate::provider::StorageProvider;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Resolves keys to URLs using the configured strategy
pub struct UrlResolver {
    strategy: UrlStrategy,
    provider: Arc<dyn StorageProvider>,
    caches: Arc<ImageCaches>,
    signed_url_ttl: std::time::Duration,
    fallback_image: String,
}

impl UrlResolver {
    pub fn new(
        config: &StorageConfig,
        provider: Arc<dyn StorageProvider>,
        caches: Arc<ImageCaches>,
    ) -> Self {
        let strategy = config.url_strategy();
        match &strategy {
            UrlStrategy::Signed => info!(provider = provider.name(), "resolving images with signed URLs"),
            UrlStrategy::Public { base_url } => {
                info!(provider = provider.name(), base_url = base_url.as_str(), "resolving images with public URLs")
            }
            UrlStrategy::Unavailable { reason } if config.use_object_storage => {
                error!(provider = provider.name(), reason = reason.as_str(), "image URL resolution is misconfigured")
            }
            UrlStrategy::Unavailable { .. } => {}
        }

        UrlResolver {
            strategy,
            provider,
            caches,
            signed_url_ttl: config.signed_url_ttl(),
            fallback_image: config.fallback_image_path.clone(),
        }
    }

    pub fn strategy(&self) -> &UrlStrategy {
        &self.strategy
    }

    /// URL for `key`, or the reason none can be produced
    pub async fn resolve(&self, key: &str) -> Result<String> {
        match &self.strategy {
            UrlStrategy::Public { base_url } => Ok(build_public_url(base_url, key)),
            UrlStrategy::Signed => self.resolve_signed(key).await,
            UrlStrategy::Unavailable { reason } => Err(ImageError::Config(reason.clone())),
        }
    }

    /// URL for `key`, or the fallback image when resolution fails
    pub async fn resolve_or_fallback(&self, key: &str) -> String {
        match self.resolve(key).await {
            Ok(url) => url,
            Err(e) => {
                log_suppressed("resolver", "resolve", key, &e);
                self.fallback_image.clone()
            }
        }
    }

    async fn resolve_signed(&self, key: &str) -> Result<String> {
        let cache_key = key.to_string();
        if let Some(url) = self.caches.signed_urls.get(&cache_key) {
            debug!(key, "signed URL cache hit");
            return Ok(url);
        }

        // The provider's TTL runs from the request, not from the response
        let issued_at = self.caches.signed_urls.now();
        let url = match self.provider.sign(key, self.signed_url_ttl).await {
            Ok(url) => url,
            Err(e @ ProviderError::MissingCredentials(_)) => {
                error!(provider = self.provider.name(), key, error = %e, "cannot sign URL without credentials");
                return Err(e.into());
            }
            Err(e) => return Err(e.into()),
        };

        let expires_at = self
            .caches
            .signed_urls
            .insert_at(cache_key, url.clone(), issued_at);
        debug!(key, %expires_at, "signed URL generated");
        Ok(url)
    }
}

/// `{base}/{key}` with surplus slashes at the seam removed
///
/// ```
/// use chapter_images::resolver::build_public_url;
///
/// assert_eq!(
///     build_public_url("https://cdn.example.com/", "ASCELOGO/ASCE.png"),
///     "https://cdn.example.com/ASCELOGO/ASCE.png"
/// );
/// ```
pub fn build_public_url(base: &str, key: &str) -> String {
    format!(
        "{}/{}",
        base.trim().trim_end_matches('/'),
        key.trim_start_matches('/')
    )
}
