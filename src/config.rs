//! Storage configuration
//!
//! Loaded from TOML, overlaid by `CHAPTER_IMAGES_*` environment variables,
//! then validated. Validation never panics; it reports every problem so the
//! resolver can degrade to the fallback image and say why in the log.
//!
//! ```
//! use chapter_images::config::{StorageConfig, UrlStrategy};
//!
//! let config = StorageConfig::from_toml_str(r#"
//!     use_object_storage = true
//!     bucket_name = "chapter-photos"
//!     public_base_url = "https://cdn.example.com/"
//! "#).unwrap();
//!
//! assert!(config.validate().is_empty());
//! assert!(matches!(config.url_strategy(), UrlStrategy::Public { .. }));
//! ```

use crate::error::{ImageError, Result};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default image served when nothing better resolves
pub const DEFAULT_FALLBACK_IMAGE: &str = "/images/fallback.jpg";

/// Signed URL validity requested from the provider (6 hours)
pub const DEFAULT_SIGNED_URL_TTL_SECS: u64 = 6 * 60 * 60;

/// Subtracted from the signed URL TTL before caching (5 minutes)
pub const DEFAULT_SIGNED_URL_SAFETY_MARGIN_SECS: u64 = 5 * 60;

/// Freshness window for a cached bucket listing (5 minutes)
pub const DEFAULT_KEY_LIST_TTL_SECS: u64 = 5 * 60;

/// Longest TTL any cache or signed URL accepts (10 years)
pub const MAX_TTL_SECS: u64 = 10 * 365 * 24 * 60 * 60;

/// Provider list ceiling per page
pub const DEFAULT_MAX_KEYS: usize = 1000;

/// Environment variable prefix for overrides
pub const ENV_PREFIX: &str = "CHAPTER_IMAGES_";

/// Which public base URL to use
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeployMode {
    #[default]
    Production,
    Development,
}

impl DeployMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "production" | "prod" => Some(DeployMode::Production),
            "development" | "dev" => Some(DeployMode::Development),
            _ => None,
        }
    }
}

/// Account credentials for signing
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
}

impl Credentials {
    pub fn is_complete(&self) -> bool {
        !self.access_key_id.trim().is_empty() && !self.secret_access_key.trim().is_empty()
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .finish()
    }
}

/// How resolved keys become URLs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UrlStrategy {
    /// Time-limited URLs from the provider
    Signed,
    /// `{base_url}/{key}`
    Public { base_url: String },
    /// Neither strategy can work; the reason goes to the log
    Unavailable { reason: String },
}

/// Configuration for the resolution layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Master switch
    pub use_object_storage: bool,

    /// Signed URLs instead of public ones
    pub use_signed_urls: bool,

    /// Required when `use_signed_urls` is false
    pub public_base_url: Option<String>,

    /// Used instead of `public_base_url` in development mode
    pub dev_public_base_url: Option<String>,

    pub mode: DeployMode,

    /// Required whenever storage is enabled
    pub bucket_name: String,

    pub fallback_image_path: String,

    pub credentials: Option<Credentials>,

    pub signed_url_ttl_secs: u64,
    pub signed_url_safety_margin_secs: u64,
    pub signed_url_cache_capacity: usize,

    pub key_list_ttl_secs: u64,
    pub max_keys: usize,

    /// Follow continuation tokens past the first page
    pub follow_pagination: bool,
    pub max_pages: usize,

    pub request_timeout_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            use_object_storage: false,
            use_signed_urls: false,
            public_base_url: None,
            dev_public_base_url: None,
            mode: DeployMode::Production,
            bucket_name: String::new(),
            fallback_image_path: DEFAULT_FALLBACK_IMAGE.to_string(),
            credentials: None,
            signed_url_ttl_secs: DEFAULT_SIGNED_URL_TTL_SECS,
            signed_url_safety_margin_secs: DEFAULT_SIGNED_URL_SAFETY_MARGIN_SECS,
            signed_url_cache_capacity: 4096,
            key_list_ttl_secs: DEFAULT_KEY_LIST_TTL_SECS,
            max_keys: DEFAULT_MAX_KEYS,
            follow_pagination: false,
            max_pages: 10,
            request_timeout_secs: 10,
        }
    }
}

impl StorageConfig {
    /// Parse a TOML document
    pub fn from_toml_str(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| ImageError::Config(format!("invalid TOML: {}", e)))
    }

    /// Read and parse a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| ImageError::Config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_toml_str(&text)
    }

    /// Overlay `CHAPTER_IMAGES_*` variables from the process environment
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(std::env::vars())
    }

    /// Overlay `CHAPTER_IMAGES_*` variables from any key/value source.
    ///
    /// Unknown variables under the prefix are ignored. A value that fails to
    /// parse is a configuration error.
    pub fn apply_overrides<I, K, V>(&mut self, vars: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (key, value) in vars {
            let Some(name) = key.as_ref().strip_prefix(ENV_PREFIX) else {
                continue;
            };
            let value = value.as_ref().trim();

            match name {
                "USE_OBJECT_STORAGE" => self.use_object_storage = parse_bool(name, value)?,
                "USE_SIGNED_URLS" => self.use_signed_urls = parse_bool(name, value)?,
                "PUBLIC_BASE_URL" => self.public_base_url = non_empty(value),
                "DEV_PUBLIC_BASE_URL" => self.dev_public_base_url = non_empty(value),
                "MODE" => {
                    self.mode = DeployMode::parse(value).ok_or_else(|| {
                        ImageError::Config(format!("{}{}: unknown mode '{}'", ENV_PREFIX, name, value))
                    })?
                }
                "BUCKET" | "BUCKET_NAME" => self.bucket_name = value.to_string(),
                "FALLBACK_IMAGE" => self.fallback_image_path = value.to_string(),
                "ACCESS_KEY_ID" => {
                    self.credentials.get_or_insert_with(Credentials::default).access_key_id =
                        value.to_string()
                }
                "SECRET_ACCESS_KEY" => {
                    self.credentials
                        .get_or_insert_with(Credentials::default)
                        .secret_access_key = value.to_string()
                }
                "SIGNED_URL_TTL_SECS" => self.signed_url_ttl_secs = parse_num(name, value)?,
                "KEY_LIST_TTL_SECS" => self.key_list_ttl_secs = parse_num(name, value)?,
                "MAX_KEYS" => self.max_keys = parse_num(name, value)?,
                "FOLLOW_PAGINATION" => self.follow_pagination = parse_bool(name, value)?,
                "REQUEST_TIMEOUT_SECS" => self.request_timeout_secs = parse_num(name, value)?,
                _ => {}
            }
        }
        Ok(())
    }

    /// Check the configuration; an empty vector means it is usable
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();

        if self.fallback_image_path.trim().is_empty() {
            problems.push("fallback_image_path is empty".to_string());
        }
        if self.max_keys == 0 {
            problems.push("max_keys must be at least 1".to_string());
        }
        for (name, secs) in [
            ("signed_url_ttl_secs", self.signed_url_ttl_secs),
            ("signed_url_safety_margin_secs", self.signed_url_safety_margin_secs),
            ("key_list_ttl_secs", self.key_list_ttl_secs),
        ] {
            if secs > MAX_TTL_SECS {
                problems.push(format!("{} ({}) exceeds the maximum of {}", name, secs, MAX_TTL_SECS));
            }
        }
        if self.signed_url_safety_margin_secs >= self.signed_url_ttl_secs {
            problems.push(format!(
                "signed_url_safety_margin_secs ({}) must be below signed_url_ttl_secs ({})",
                self.signed_url_safety_margin_secs, self.signed_url_ttl_secs
            ));
        }

        if !self.use_object_storage {
            return problems;
        }

        if self.bucket_name.trim().is_empty() {
            problems.push("bucket_name is required when object storage is enabled".to_string());
        }
        if let UrlStrategy::Unavailable { reason } = self.url_strategy() {
            problems.push(reason);
        }

        problems
    }

    /// Like [`validate`](Self::validate) but as a `Result`
    pub fn ensure_valid(&self) -> Result<()> {
        let problems = self.validate();
        if problems.is_empty() {
            Ok(())
        } else {
            Err(ImageError::Config(problems.join("; ")))
        }
    }

    /// Pick the URL strategy this configuration supports
    pub fn url_strategy(&self) -> UrlStrategy {
        if self.use_signed_urls {
            return match &self.credentials {
                Some(creds) if creds.is_complete() => UrlStrategy::Signed,
                _ => UrlStrategy::Unavailable {
                    reason: "signed URLs require access_key_id and secret_access_key".to_string(),
                },
            };
        }

        match self.active_public_base_url() {
            Some(base) => UrlStrategy::Public {
                base_url: base.to_string(),
            },
            None => UrlStrategy::Unavailable {
                reason: "public_base_url is required when use_signed_urls is false".to_string(),
            },
        }
    }

    /// Base URL for the current mode; development falls back to production
    pub fn active_public_base_url(&self) -> Option<&str> {
        let dev = match self.mode {
            DeployMode::Development => self.dev_public_base_url.as_deref(),
            DeployMode::Production => None,
        };
        dev.or(self.public_base_url.as_deref())
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// TTL requested from the provider when signing
    pub fn signed_url_ttl(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.signed_url_ttl_secs)
    }

    /// How long a signed URL stays in the cache, capped at [`MAX_TTL_SECS`]
    pub fn signed_url_cache_lifetime(&self) -> Duration {
        let secs = self
            .signed_url_ttl_secs
            .saturating_sub(self.signed_url_safety_margin_secs);
        capped_seconds(secs)
    }

    /// Freshness window of a cached listing, capped at [`MAX_TTL_SECS`]
    pub fn key_list_ttl(&self) -> Duration {
        capped_seconds(self.key_list_ttl_secs)
    }

    pub fn request_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.request_timeout_secs)
    }
}

fn capped_seconds(secs: u64) -> Duration {
    Duration::try_seconds(secs.min(MAX_TTL_SECS) as i64).unwrap_or(Duration::zero())
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ImageError::Config(format!(
            "{}{}: expected a boolean, got '{}'",
            ENV_PREFIX, name, value
        ))),
    }
}

fn parse_num<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value.parse().map_err(|_| {
        ImageError::Config(format!(
            "{}{}: expected a number, got '{}'",
            ENV_PREFIX, name, value
        ))
    })
}
