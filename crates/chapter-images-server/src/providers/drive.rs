//! Google Drive adapter
//!
//! Drive has no flat key space. The adapter crawls the configured folder
//! tree and names each file by its folder path (`FGM Pics/a.JPG`), which
//! gives the resolution layer the same shape of key it gets from a bucket.
//! Drive cannot sign URLs; deployments serve it in public mode through the
//! server's `/objects` route.

use crate::error::{ServerError, ServerResult};
use async_trait::async_trait;
use bytes::Bytes;
use chapter_images::provider::content_type_for;
use chapter_images::{ListPage, ObjectBody, ObjectInfo, ProviderError, StorageProvider};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Deserialize;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const DRIVE_API_BASE: &str = "https://www.googleapis.com/drive/v3";

const FOLDER_MIME: &str = "application/vnd.google-apps.folder";
const PAGE_SIZE: &str = "1000";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveFile {
    id: String,
    name: String,
    mime_type: String,
    /// Drive returns sizes as decimal strings
    #[serde(default)]
    size: Option<String>,
    #[serde(default)]
    modified_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileList {
    #[serde(default)]
    next_page_token: Option<String>,
    #[serde(default)]
    files: Vec<DriveFile>,
}

/// Crawled file with its path-style key
#[derive(Debug, Clone)]
struct IndexedFile {
    id: String,
    info: ObjectInfo,
    mime_type: String,
}

/// Key-ordered snapshot of the folder tree
#[derive(Debug, Default)]
struct DriveIndex {
    files: Vec<IndexedFile>,
    by_key: HashMap<String, usize>,
}

impl DriveIndex {
    fn new(mut files: Vec<IndexedFile>) -> Self {
        files.sort_by(|a, b| a.info.key.cmp(&b.info.key));
        files.dedup_by(|a, b| a.info.key == b.info.key);
        let by_key = files
            .iter()
            .enumerate()
            .map(|(i, f)| (f.info.key.clone(), i))
            .collect();
        DriveIndex { files, by_key }
    }

    /// Page of keys under `prefix`, resuming after `continuation`
    fn page(&self, prefix: &str, max_keys: usize, continuation: Option<&str>) -> ListPage {
        let mut matching = self
            .files
            .iter()
            .filter(|f| f.info.key.starts_with(prefix))
            .filter(|f| continuation.map_or(true, |after| f.info.key.as_str() > after));

        let objects: Vec<ObjectInfo> = matching.by_ref().take(max_keys).map(|f| f.info.clone()).collect();
        let next_continuation = match (matching.next(), objects.last()) {
            (Some(_), Some(last)) => Some(last.key.clone()),
            _ => None,
        };

        ListPage {
            objects,
            next_continuation,
        }
    }

    fn lookup(&self, key: &str) -> Option<&IndexedFile> {
        self.by_key.get(key).map(|&i| &self.files[i])
    }
}

/// Folder tree in Google Drive, read with an API key
pub struct DriveProvider {
    client: reqwest::Client,
    api_base: String,
    folder_id: String,
    api_key: String,
    index: RwLock<Option<Arc<DriveIndex>>>,
}

impl DriveProvider {
    pub fn new(folder_id: impl Into<String>, api_key: impl Into<String>, timeout: Duration) -> ServerResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ServerError::Config(format!("failed to create HTTP client: {}", e)))?;

        Ok(DriveProvider {
            client,
            api_base: DRIVE_API_BASE.to_string(),
            folder_id: folder_id.into(),
            api_key: api_key.into(),
            index: RwLock::new(None),
        })
    }

    /// Point the adapter at another API root
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    /// Walk the folder tree breadth-first and rebuild the key index
    async fn crawl(&self) -> Result<Arc<DriveIndex>, ProviderError> {
        let mut pending = VecDeque::from([(self.folder_id.clone(), String::new())]);
        let mut files = Vec::new();

        while let Some((folder_id, path)) = pending.pop_front() {
            let mut page_token: Option<String> = None;
            loop {
                let page = self.list_children(&folder_id, page_token.as_deref()).await?;
                for file in page.files {
                    let key = if path.is_empty() {
                        file.name.clone()
                    } else {
                        format!("{}/{}", path, file.name)
                    };

                    if file.mime_type == FOLDER_MIME {
                        pending.push_back((file.id, key));
                        continue;
                    }

                    files.push(IndexedFile {
                        info: ObjectInfo {
                            key,
                            size: file.size.as_deref().and_then(|s| s.parse().ok()).unwrap_or(0),
                            last_modified: file.modified_time,
                        },
                        id: file.id,
                        mime_type: file.mime_type,
                    });
                }

                match page.next_page_token {
                    Some(token) => page_token = Some(token),
                    None => break,
                }
            }
        }

        let index = Arc::new(DriveIndex::new(files));
        info!(folder = %self.folder_id, files = index.files.len(), "crawled drive folder");
        *self.index.write() = Some(index.clone());
        Ok(index)
    }

    async fn list_children(&self, folder_id: &str, page_token: Option<&str>) -> Result<FileList, ProviderError> {
        let q = format!("'{}' in parents and trashed=false", folder_id);
        let mut query: Vec<(&str, &str)> = vec![
            ("q", q.as_str()),
            ("fields", "nextPageToken,files(id,name,mimeType,size,modifiedTime)"),
            ("pageSize", PAGE_SIZE),
            ("key", self.api_key.as_str()),
        ];
        if let Some(token) = page_token {
            query.push(("pageToken", token));
        }

        let resp = self
            .client
            .get(format!("{}/files", self.api_base))
            .query(&query)
            .send()
            .await
            .map_err(map_transport_error)?;

        let resp = check_status(resp, folder_id).await?;
        resp.json::<FileList>()
            .await
            .map_err(|e| ProviderError::Other(format!("invalid drive listing: {}", e)))
    }

    /// Current index, crawling when none exists yet
    async fn current_index(&self) -> Result<Arc<DriveIndex>, ProviderError> {
        let existing = self.index.read().clone();
        match existing {
            Some(index) => Ok(index),
            None => self.crawl().await,
        }
    }
}

fn map_transport_error(err: reqwest::Error) -> ProviderError {
    if err.is_timeout() || err.is_connect() {
        ProviderError::Network(err.to_string())
    } else {
        ProviderError::Other(err.to_string())
    }
}

async fn check_status(resp: reqwest::Response, subject: &str) -> Result<reqwest::Response, ProviderError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let body = resp.text().await.unwrap_or_default();
    Err(match status.as_u16() {
        404 => ProviderError::NotFound {
            bucket: "drive".to_string(),
            key: subject.to_string(),
        },
        401 | 403 => ProviderError::AccessDenied {
            bucket: "drive".to_string(),
            key: subject.to_string(),
            message: body,
        },
        code => ProviderError::Other(format!("drive api status={} body={}", code, body)),
    })
}

#[async_trait]
impl StorageProvider for DriveProvider {
    fn name(&self) -> &str {
        "drive"
    }

    async fn list(
        &self,
        prefix: &str,
        max_keys: usize,
        continuation: Option<&str>,
    ) -> Result<ListPage, ProviderError> {
        // A fresh listing recrawls; follow-up pages read the same snapshot
        let index = match continuation {
            None => self.crawl().await?,
            Some(_) => self.current_index().await?,
        };
        Ok(index.page(prefix, max_keys, continuation))
    }

    async fn get(&self, key: &str) -> Result<ObjectBody, ProviderError> {
        let index = self.current_index().await?;
        let file = index.lookup(key).cloned().ok_or_else(|| ProviderError::NotFound {
            bucket: "drive".to_string(),
            key: key.to_string(),
        })?;

        debug!(key, id = %file.id, "fetching drive file");
        let resp = self
            .client
            .get(format!("{}/files/{}", self.api_base, file.id))
            .query(&[("alt", "media"), ("key", self.api_key.as_str())])
            .send()
            .await
            .map_err(map_transport_error)?;

        let resp = check_status(resp, key).await?;
        let bytes: Bytes = resp.bytes().await.map_err(map_transport_error)?;

        let content_type = if file.mime_type.starts_with("image/") || file.mime_type.starts_with("video/") {
            file.mime_type
        } else {
            content_type_for(key).to_string()
        };

        Ok(ObjectBody {
            size: bytes.len() as u64,
            bytes,
            content_type,
        })
    }

    async fn sign(&self, key: &str, _ttl: Duration) -> Result<String, ProviderError> {
        warn!(key, "drive cannot sign URLs; configure public mode");
        Err(ProviderError::Unsupported {
            provider: "drive".to_string(),
            operation: "sign".to_string(),
        })
    }
}
