/// Which [`AssetStore`](crate::AssetStore) implementation to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackendKind {
    S3,
    Memory,
}

/// Asset store configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub backend: StorageBackendKind,
    pub bucket: String,
    /// Custom S3-compatible endpoint (MinIO, LocalStack). Enables
    /// path-style addressing.
    pub endpoint: Option<String>,
}

impl StorageConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var           | Default  |
    /// |-------------------|----------|
    /// | `STORAGE_BACKEND` | `memory` |
    /// | `S3_BUCKET`       | `photos` |
    /// | `S3_ENDPOINT`     | (none)   |
    ///
    /// AWS credentials and region come from the standard AWS environment.
    pub fn from_env() -> Self {
        let backend = match std::env::var("STORAGE_BACKEND")
            .unwrap_or_else(|_| "memory".into())
            .to_ascii_lowercase()
            .as_str()
        {
            "s3" => StorageBackendKind::S3,
            "memory" => StorageBackendKind::Memory,
            other => panic!("STORAGE_BACKEND must be 's3' or 'memory', got '{other}'"),
        };
        let bucket = std::env::var("S3_BUCKET").unwrap_or_else(|_| "photos".into());
        let endpoint = std::env::var("S3_ENDPOINT").ok().filter(|s| !s.trim().is_empty());

        Self {
            backend,
            bucket,
            endpoint,
        }
    }

    pub fn memory(bucket: impl Into<String>) -> Self {
        Self {
            backend: StorageBackendKind::Memory,
            bucket: bucket.into(),
            endpoint: None,
        }
    }
}
