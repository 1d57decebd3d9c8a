//! S3-compatible adapter (Cloudflare R2, Backblaze B2, AWS S3, MinIO)

use crate::config::{ProviderKind, ProviderSettings};
use crate::error::ServerResult;
use async_trait::async_trait;
use aws_sdk_s3::config::timeout::TimeoutConfig;
use aws_sdk_s3::config::{BehaviorVersion, Region};
use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::Client;
use chapter_images::provider::content_type_for;
use chapter_images::{ListPage, ObjectBody, ObjectInfo, ProviderError, StorageConfig, StorageProvider};
use chrono::{DateTime, Utc};
use std::time::Duration;
use tracing::{debug, info};

/// Bucket behind the S3 API
pub struct S3CompatibleProvider {
    client: Client,
    bucket: String,
    name: &'static str,
    endpoint: Option<String>,
}

impl std::fmt::Debug for S3CompatibleProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3CompatibleProvider")
            .field("name", &self.name)
            .field("bucket", &self.bucket)
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

impl S3CompatibleProvider {
    /// Build a client for `settings.kind`.
    ///
    /// Static credentials from the storage config are used when complete;
    /// otherwise the AWS default chain (env, profile, instance role) applies.
    pub async fn connect(settings: &ProviderSettings, storage: &StorageConfig) -> ServerResult<Self> {
        let endpoint = settings.s3_endpoint()?;
        let region = Region::new(settings.s3_region());
        let timeouts = TimeoutConfig::builder()
            .operation_timeout(storage.request_timeout())
            .build();

        let mut builder = match storage.credentials.as_ref().filter(|c| c.is_complete()) {
            Some(creds) => aws_sdk_s3::config::Builder::new()
                .behavior_version(BehaviorVersion::latest())
                .region(region)
                .credentials_provider(aws_sdk_s3::config::Credentials::new(
                    creds.access_key_id.clone(),
                    creds.secret_access_key.clone(),
                    None,
                    None,
                    "chapter-images-config",
                )),
            None => {
                let shared = aws_config::defaults(BehaviorVersion::latest())
                    .region(region)
                    .load()
                    .await;
                aws_sdk_s3::config::Builder::from(&shared)
            }
        };

        builder = builder.timeout_config(timeouts);
        if let Some(endpoint) = &endpoint {
            // R2 and B2 only serve path-style requests reliably
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        let name = match settings.kind {
            ProviderKind::R2 => "r2",
            ProviderKind::B2 => "b2",
            _ => "s3",
        };

        info!(
            provider = name,
            bucket = %storage.bucket_name,
            endpoint = endpoint.as_deref().unwrap_or("aws"),
            "S3-compatible provider ready"
        );

        Ok(S3CompatibleProvider {
            client: Client::from_conf(builder.build()),
            bucket: storage.bucket_name.clone(),
            name,
            endpoint,
        })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

/// Classify an SDK failure by HTTP status and transport failure kind
fn map_sdk_error<E>(err: SdkError<E>, bucket: &str, key: &str) -> ProviderError
where
    E: std::error::Error + Send + Sync + 'static,
{
    let message = DisplayErrorContext(&err).to_string();
    match &err {
        SdkError::ServiceError(service_err) => match service_err.raw().status().as_u16() {
            404 => ProviderError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            },
            401 | 403 => ProviderError::AccessDenied {
                bucket: bucket.to_string(),
                key: key.to_string(),
                message,
            },
            _ => ProviderError::Other(message),
        },
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) => ProviderError::Network(message),
        _ if message.contains("credentials") => ProviderError::MissingCredentials(message),
        _ => ProviderError::Other(message),
    }
}

fn to_chrono(dt: &aws_sdk_s3::primitives::DateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(dt.secs(), dt.subsec_nanos())
}

#[async_trait]
impl StorageProvider for S3CompatibleProvider {
    fn name(&self) -> &str {
        self.name
    }

    async fn list(
        &self,
        prefix: &str,
        max_keys: usize,
        continuation: Option<&str>,
    ) -> Result<ListPage, ProviderError> {
        let mut request = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .max_keys(i32::try_from(max_keys).unwrap_or(i32::MAX));

        if !prefix.is_empty() {
            request = request.prefix(prefix);
        }
        if let Some(token) = continuation {
            request = request.continuation_token(token);
        }

        let output = request
            .send()
            .await
            .map_err(|e| map_sdk_error(e, &self.bucket, prefix))?;

        let objects: Vec<ObjectInfo> = output
            .contents()
            .iter()
            .filter_map(|obj| {
                obj.key().map(|key| ObjectInfo {
                    key: key.to_string(),
                    size: obj.size().unwrap_or(0).max(0) as u64,
                    last_modified: obj.last_modified().and_then(to_chrono),
                })
            })
            .collect();

        let next_continuation = if output.is_truncated() == Some(true) {
            output.next_continuation_token().map(|s| s.to_string())
        } else {
            None
        };

        debug!(
            provider = self.name,
            prefix,
            count = objects.len(),
            truncated = next_continuation.is_some(),
            "listed page"
        );

        Ok(ListPage {
            objects,
            next_continuation,
        })
    }

    async fn get(&self, key: &str) -> Result<ObjectBody, ProviderError> {
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| map_sdk_error(e, &self.bucket, key))?;

        let content_type = output
            .content_type()
            .filter(|ct| !ct.is_empty() && *ct != "application/octet-stream")
            .map(|ct| ct.to_string())
            .unwrap_or_else(|| content_type_for(key).to_string());

        let bytes = output
            .body
            .collect()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?
            .into_bytes();

        Ok(ObjectBody {
            size: bytes.len() as u64,
            bytes,
            content_type,
        })
    }

    async fn sign(&self, key: &str, ttl: Duration) -> Result<String, ProviderError> {
        let presign = PresigningConfig::expires_in(ttl)
            .map_err(|e| ProviderError::Other(format!("invalid presign config: {}", e)))?;

        let presigned = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(presign)
            .await
            .map_err(|e| map_sdk_error(e, &self.bucket, key))?;

        Ok(presigned.uri().to_string())
    }
}
