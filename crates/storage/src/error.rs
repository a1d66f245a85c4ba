#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Asset not found: {0}")]
    NotFound(String),

    #[error("Asset already exists: {0}")]
    AlreadyExists(String),

    /// The backend cannot produce signed URLs (credentials, configuration).
    #[error("Signing unavailable: {0}")]
    SigningUnavailable(String),

    #[error("Storage backend error: {0}")]
    Backend(String),

    #[error("Asset download failed: {0}")]
    Http(#[from] reqwest::Error),
}

impl StorageError {
    /// Whether retrying the same call may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Backend(_) | Self::Http(_))
    }
}
