//! In-memory storage provider
//!
//! Backs tests and local development. Counts every call so cache behavior
//! can be asserted, and can be told to fail on demand.

use crate::error::ProviderError;
use crate::provider::{content_type_for, ListPage, ObjectBody, ObjectInfo, StorageProvider};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

/// Map-backed provider
pub struct InMemoryProvider {
    bucket: String,
    objects: RwLock<BTreeMap<String, ObjectBody>>,
    signing_enabled: bool,
    fail_list: AtomicBool,
    fail_sign: AtomicBool,
    list_calls: AtomicUsize,
    get_calls: AtomicUsize,
    sign_calls: AtomicUsize,
}

impl InMemoryProvider {
    pub fn new(bucket: impl Into<String>) -> Self {
        InMemoryProvider {
            bucket: bucket.into(),
            objects: RwLock::new(BTreeMap::new()),
            signing_enabled: true,
            fail_list: AtomicBool::new(false),
            fail_sign: AtomicBool::new(false),
            list_calls: AtomicUsize::new(0),
            get_calls: AtomicUsize::new(0),
            sign_calls: AtomicUsize::new(0),
        }
    }

    /// Provider with one empty-bodied object per key
    pub fn with_keys<I, S>(bucket: impl Into<String>, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let provider = Self::new(bucket);
        for key in keys {
            provider.insert(key, Bytes::new());
        }
        provider
    }

    /// Behave like a provider that was configured without credentials
    pub fn without_credentials(mut self) -> Self {
        self.signing_enabled = false;
        self
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Store an object, replacing any existing one
    pub fn insert(&self, key: impl Into<String>, data: impl Into<Bytes>) {
        let key = key.into();
        let bytes = data.into();
        let body = ObjectBody {
            content_type: content_type_for(&key).to_string(),
            size: bytes.len() as u64,
            bytes,
        };
        self.objects.write().insert(key, body);
    }

    pub fn remove(&self, key: &str) -> bool {
        self.objects.write().remove(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }

    /// Make every following `list` call fail
    pub fn set_fail_list(&self, fail: bool) {
        self.fail_list.store(fail, Ordering::SeqCst);
    }

    /// Make every following `sign` call fail
    pub fn set_fail_sign(&self, fail: bool) {
        self.fail_sign.store(fail, Ordering::SeqCst);
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn get_calls(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }

    pub fn sign_calls(&self) -> usize {
        self.sign_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StorageProvider for InMemoryProvider {
    fn name(&self) -> &str {
        "memory"
    }

    async fn list(
        &self,
        prefix: &str,
        max_keys: usize,
        continuation: Option<&str>,
    ) -> Result<ListPage, ProviderError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_list.load(Ordering::SeqCst) {
            return Err(ProviderError::Network("injected list failure".to_string()));
        }

        let objects = self.objects.read();
        let mut page = ListPage::default();
        let matching = objects
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .filter(|(key, _)| continuation.map_or(true, |after| key.as_str() > after));

        for (key, body) in matching {
            if page.objects.len() == max_keys {
                // Continuation is the last key handed out
                page.next_continuation = page.objects.last().map(|o| o.key.clone());
                break;
            }
            page.objects.push(ObjectInfo::new(key.clone(), body.size));
        }

        Ok(page)
    }

    async fn get(&self, key: &str) -> Result<ObjectBody, ProviderError> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        self.objects
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| ProviderError::NotFound {
                bucket: self.bucket.clone(),
                key: key.to_string(),
            })
    }

    async fn sign(&self, key: &str, ttl: Duration) -> Result<String, ProviderError> {
        let call = self.sign_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if !self.signing_enabled {
            return Err(ProviderError::MissingCredentials(self.name().to_string()));
        }
        if self.fail_sign.load(Ordering::SeqCst) {
            return Err(ProviderError::Network("injected sign failure".to_string()));
        }

        let ttl_secs = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
        let expires = Utc::now().timestamp().saturating_add(ttl_secs);
        Ok(format!(
            "memory://{}/{}?expires={}&signature={}",
            self.bucket, key, expires, call
        ))
    }
}
