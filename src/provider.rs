//! Storage provider interface
//!
//! R2, B2 and Drive each used to carry their own copy of the matching and
//! caching logic. The resolution layer now depends only on the three
//! operations below, and each backend is an adapter implementing them.

use crate::error::ProviderError;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One entry from a bucket listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectInfo {
    pub key: String,
    pub size: u64,
    pub last_modified: Option<DateTime<Utc>>,
}

impl ObjectInfo {
    pub fn new(key: impl Into<String>, size: u64) -> Self {
        ObjectInfo {
            key: key.into(),
            size,
            last_modified: None,
        }
    }
}

/// One page of a listing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListPage {
    pub objects: Vec<ObjectInfo>,
    /// Set when the provider has more keys past this page
    pub next_continuation: Option<String>,
}

impl ListPage {
    pub fn is_truncated(&self) -> bool {
        self.next_continuation.is_some()
    }
}

/// Object bytes with the metadata needed to serve them
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectBody {
    pub bytes: Bytes,
    pub content_type: String,
    pub size: u64,
}

/// Operations the resolution layer needs from a storage backend
#[async_trait]
pub trait StorageProvider: Send + Sync {
    /// Short name for logs ("r2", "b2", "drive", ...)
    fn name(&self) -> &str;

    /// List up to `max_keys` objects under `prefix`, starting after
    /// `continuation` when given.
    async fn list(
        &self,
        prefix: &str,
        max_keys: usize,
        continuation: Option<&str>,
    ) -> Result<ListPage, ProviderError>;

    /// Fetch one object
    async fn get(&self, key: &str) -> Result<ObjectBody, ProviderError>;

    /// Produce a URL granting read access to `key` for `ttl`
    async fn sign(&self, key: &str, ttl: Duration) -> Result<String, ProviderError>;
}

/// Guess a content type from a key's extension
pub fn content_type_for(key: &str) -> &'static str {
    let ext = key
        .rsplit('.')
        .next()
        .filter(|ext| ext.len() < key.len())
        .map(|ext| ext.to_ascii_lowercase());

    match ext.as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("avif") => "image/avif",
        Some("svg") => "image/svg+xml",
        Some("heic") => "image/heic",
        Some("mp4") => "video/mp4",
        Some("webm") => "video/webm",
        _ => "application/octet-stream",
    }
}
