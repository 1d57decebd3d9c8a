//! Server configuration file
//!
//! ```toml
//! [storage]
//! use_object_storage = true
//! bucket_name = "chapter-photos"
//! public_base_url = "https://photos.example.org"
//!
//! [provider]
//! kind = "r2"
//! account_id = "0123456789abcdef"
//!
//! [listen]
//! host = "0.0.0.0"
//! port = 8787
//! ```

use crate::error::{ServerError, ServerResult};
use chapter_images::StorageConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Which adapter backs the bucket
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Cloudflare R2 (S3 API)
    R2,
    /// Backblaze B2 (S3 API)
    B2,
    /// Any other S3-compatible endpoint, or AWS itself
    S3,
    /// Google Drive folder tree
    Drive,
    /// In-process map, optionally seeded from a directory
    #[default]
    Memory,
}

impl ProviderKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "r2" | "cloudflare" => Some(ProviderKind::R2),
            "b2" | "backblaze" => Some(ProviderKind::B2),
            "s3" => Some(ProviderKind::S3),
            "drive" | "gdrive" | "google-drive" => Some(ProviderKind::Drive),
            "memory" | "mem" => Some(ProviderKind::Memory),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ProviderKind::R2 => "r2",
            ProviderKind::B2 => "b2",
            ProviderKind::S3 => "s3",
            ProviderKind::Drive => "drive",
            ProviderKind::Memory => "memory",
        }
    }
}

/// Adapter-specific settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    pub kind: ProviderKind,
    /// Overrides the endpoint preset for R2/B2
    pub endpoint: Option<String>,
    /// B2 region such as `us-west-004`; AWS region for `s3`
    pub region: Option<String>,
    /// Cloudflare account id for the R2 endpoint
    pub account_id: Option<String>,
    pub drive_folder_id: Option<String>,
    pub drive_api_key: Option<String>,
    /// Files under this directory become objects of the memory provider
    pub seed_dir: Option<PathBuf>,
}

impl ProviderSettings {
    /// Endpoint URL for the S3-compatible kinds
    pub fn s3_endpoint(&self) -> ServerResult<Option<String>> {
        if let Some(endpoint) = self.endpoint.as_deref().filter(|e| !e.trim().is_empty()) {
            return Ok(Some(endpoint.trim().trim_end_matches('/').to_string()));
        }

        match self.kind {
            ProviderKind::R2 => {
                let account = self.account_id.as_deref().ok_or_else(|| {
                    ServerError::Config("r2 requires provider.account_id or provider.endpoint".to_string())
                })?;
                Ok(Some(format!("https://{}.r2.cloudflarestorage.com", account)))
            }
            ProviderKind::B2 => {
                let region = self.region.as_deref().ok_or_else(|| {
                    ServerError::Config("b2 requires provider.region or provider.endpoint".to_string())
                })?;
                Ok(Some(format!("https://s3.{}.backblazeb2.com", region)))
            }
            _ => Ok(None),
        }
    }

    /// Signing region for the S3-compatible kinds
    pub fn s3_region(&self) -> String {
        match (self.kind, self.region.as_deref()) {
            (ProviderKind::R2, _) => "auto".to_string(),
            (_, Some(region)) => region.to_string(),
            (_, None) => "us-east-1".to_string(),
        }
    }
}

/// Bind address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListenSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ListenSettings {
    fn default() -> Self {
        ListenSettings {
            host: "127.0.0.1".to_string(),
            port: 8787,
        }
    }
}

/// Everything the server binary reads at startup
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub storage: StorageConfig,
    pub provider: ProviderSettings,
    pub listen: ListenSettings,
}

impl ServerConfig {
    pub fn from_toml_str(s: &str) -> ServerResult<Self> {
        toml::from_str(s).map_err(|e| ServerError::Config(format!("invalid TOML: {}", e)))
    }

    pub fn from_file(path: impl AsRef<Path>) -> ServerResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| ServerError::Config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_toml_str(&text)
    }
}
