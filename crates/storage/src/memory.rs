use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::StorageError;
use crate::{AssetStore, RETRIEVAL_URL_TTL};

#[derive(Debug, Clone)]
struct StoredAsset {
    bytes: Vec<u8>,
    content_type: String,
}

/// In-process asset store. Signed URLs use the `memory://` scheme and are
/// only meaningful to this process.
#[derive(Debug)]
pub struct MemoryAssetStore {
    bucket: String,
    objects: RwLock<HashMap<String, StoredAsset>>,
    signing: AtomicBool,
    signed_fetches: AtomicUsize,
}

impl MemoryAssetStore {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            objects: RwLock::new(HashMap::new()),
            signing: AtomicBool::new(true),
            signed_fetches: AtomicUsize::new(0),
        }
    }

    /// Toggle URL signing, to exercise the unsignable paths.
    pub fn set_signing(&self, enabled: bool) {
        self.signing.store(enabled, Ordering::SeqCst);
    }

    pub async fn contains(&self, key: &str) -> bool {
        self.objects.read().await.contains_key(key)
    }

    pub async fn content_type(&self, key: &str) -> Option<String> {
        self.objects
            .read()
            .await
            .get(key)
            .map(|asset| asset.content_type.clone())
    }

    pub async fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.objects.read().await.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Number of [`fetch`](AssetStore::fetch) calls served through a signed URL.
    pub fn signed_fetches(&self) -> usize {
        self.signed_fetches.load(Ordering::SeqCst)
    }
}

impl Default for MemoryAssetStore {
    fn default() -> Self {
        Self::new("photos")
    }
}

#[async_trait]
impl AssetStore for MemoryAssetStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<(), StorageError> {
        let mut objects = self.objects.write().await;
        if objects.contains_key(key) {
            return Err(StorageError::AlreadyExists(key.to_string()));
        }
        objects.insert(
            key.to_string(),
            StoredAsset {
                bytes,
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        self.objects
            .read()
            .await
            .get(key)
            .map(|asset| asset.bytes.clone())
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    async fn signed_url(&self, key: &str, ttl: Duration) -> Result<String, StorageError> {
        if !self.signing.load(Ordering::SeqCst) {
            return Err(StorageError::SigningUnavailable("signing disabled".into()));
        }
        let expires = chrono::Utc::now().timestamp() + ttl.as_secs() as i64;
        Ok(format!("memory://{}/{key}?expires={expires}", self.bucket))
    }

    async fn fetch(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        match self.signed_url(key, RETRIEVAL_URL_TTL).await {
            Ok(_) => {
                self.signed_fetches.fetch_add(1, Ordering::SeqCst);
                self.get(key).await
            }
            Err(StorageError::SigningUnavailable(_)) => self.get(key).await,
            Err(err) => Err(err),
        }
    }
}
