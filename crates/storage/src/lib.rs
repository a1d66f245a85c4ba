//! Asset store: user-scoped blob storage with time-limited signed URLs.
//!
//! [`AssetStore`] is the seam; [`s3::S3AssetStore`] is the production
//! backend and [`memory::MemoryAssetStore`] backs local development and
//! tests.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

pub mod config;
pub mod error;
pub mod memory;
pub mod s3;

pub use config::{StorageBackendKind, StorageConfig};
pub use error::StorageError;
pub use memory::MemoryAssetStore;
pub use s3::S3AssetStore;

/// Lifetime of URLs handed to clients.
pub const CLIENT_URL_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Lifetime of URLs the pipeline uses to fetch its own inputs.
pub const RETRIEVAL_URL_TTL: Duration = Duration::from_secs(60 * 60);

/// Cache lifetime advertised on uploaded objects.
pub const UPLOAD_CACHE_CONTROL: &str = "max-age=3600";

#[async_trait]
pub trait AssetStore: Send + Sync {
    /// Bucket name, needed to strip it from URL-shaped paths.
    fn bucket(&self) -> &str;

    /// Store bytes under `key`. Never overwrites an existing object.
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<(), StorageError>;

    /// Privileged direct read.
    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError>;

    /// Time-limited URL granting read access to `key`.
    async fn signed_url(&self, key: &str, ttl: Duration) -> Result<String, StorageError>;

    /// Pipeline read: through a [`RETRIEVAL_URL_TTL`] signed URL, falling
    /// back to [`get`](Self::get) only when the backend cannot sign.
    async fn fetch(&self, key: &str) -> Result<Vec<u8>, StorageError>;
}

/// Build the configured backend.
pub async fn build_asset_store(config: &StorageConfig) -> Arc<dyn AssetStore> {
    match config.backend {
        StorageBackendKind::S3 => {
            tracing::info!(bucket = %config.bucket, "Using S3 asset store");
            Arc::new(S3AssetStore::connect(config).await)
        }
        StorageBackendKind::Memory => {
            tracing::warn!(bucket = %config.bucket, "Using in-memory asset store; assets are not persisted");
            Arc::new(MemoryAssetStore::new(config.bucket.clone()))
        }
    }
}
