//! Storage adapters selected by `[provider] kind`

pub mod drive;
pub mod s3;

pub use drive::DriveProvider;
pub use s3::S3CompatibleProvider;

use crate::config::{ProviderKind, ProviderSettings};
use crate::error::{ServerError, ServerResult};
use chapter_images::{InMemoryProvider, StorageConfig, StorageProvider};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};
use walkdir::WalkDir;

/// Build the adapter the settings ask for
pub async fn connect(
    settings: &ProviderSettings,
    storage: &StorageConfig,
) -> ServerResult<Arc<dyn StorageProvider>> {
    match settings.kind {
        ProviderKind::R2 | ProviderKind::B2 | ProviderKind::S3 => {
            Ok(Arc::new(S3CompatibleProvider::connect(settings, storage).await?))
        }
        ProviderKind::Drive => {
            let folder = settings.drive_folder_id.as_deref().ok_or_else(|| {
                ServerError::Config("drive requires provider.drive_folder_id".to_string())
            })?;
            let key = settings.drive_api_key.as_deref().ok_or_else(|| {
                ServerError::Config("drive requires provider.drive_api_key".to_string())
            })?;
            info!(folder, "Google Drive provider ready");
            Ok(Arc::new(DriveProvider::new(folder, key, storage.request_timeout())?))
        }
        ProviderKind::Memory => {
            let provider = InMemoryProvider::new(storage.bucket_name.clone());
            if let Some(dir) = &settings.seed_dir {
                let count = seed_from_dir(&provider, dir)?;
                info!(dir = %dir.display(), objects = count, "seeded memory provider");
            }
            Ok(Arc::new(provider))
        }
    }
}

/// Insert every regular file under `dir`, keyed by its relative path with
/// `/` separators. Returns the number of objects inserted.
pub fn seed_from_dir(provider: &InMemoryProvider, dir: &Path) -> ServerResult<usize> {
    let mut count = 0;
    for entry in WalkDir::new(dir).follow_links(true).sort_by_file_name() {
        let entry = entry.map_err(|e| ServerError::Config(format!("cannot walk {}: {}", dir.display(), e)))?;
        if !entry.file_type().is_file() {
            continue;
        }

        let Ok(relative) = entry.path().strip_prefix(dir) else {
            continue;
        };
        let key = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        let data = std::fs::read(entry.path())?;
        debug!(key = %key, size = data.len(), "seeding object");
        provider.insert(key, data);
        count += 1;
    }
    Ok(count)
}
