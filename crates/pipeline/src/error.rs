use printframe_adapters::AdapterError;
use printframe_core::asset_key::AssetKeyError;
use printframe_core::error::CoreError;
use printframe_db::StoreError;
use printframe_imaging::RenderError;
use printframe_storage::StorageError;

/// Failure of a single step attempt.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StepError {
    /// Retried with backoff until the attempt bound.
    #[error("{0}")]
    Transient(String),

    /// Fails the step immediately.
    #[error("{0}")]
    Permanent(String),
}

impl StepError {
    pub fn message(&self) -> &str {
        match self {
            Self::Transient(m) | Self::Permanent(m) => m,
        }
    }
}

impl From<StoreError> for StepError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Database(_) => Self::Transient(err.to_string()),
            StoreError::Corrupt(_) => Self::Permanent(err.to_string()),
        }
    }
}

impl From<StorageError> for StepError {
    fn from(err: StorageError) -> Self {
        if err.is_transient() {
            Self::Transient(err.to_string())
        } else {
            Self::Permanent(err.to_string())
        }
    }
}

impl From<AdapterError> for StepError {
    fn from(err: AdapterError) -> Self {
        if err.is_transient() {
            Self::Transient(err.to_string())
        } else {
            Self::Permanent(err.to_string())
        }
    }
}

impl From<AssetKeyError> for StepError {
    fn from(err: AssetKeyError) -> Self {
        Self::Permanent(err.to_string())
    }
}

impl From<RenderError> for StepError {
    fn from(err: RenderError) -> Self {
        Self::Permanent(err.to_string())
    }
}

impl From<CoreError> for StepError {
    fn from(err: CoreError) -> Self {
        Self::Permanent(err.to_string())
    }
}

/// Failure inside a workflow body, before the catch-all handles it.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    /// A step failed permanently or ran out of attempts.
    #[error("{message}")]
    Step { step: String, message: String },

    /// The step cache itself could not be read or written.
    #[error("Step cache error: {0}")]
    Cache(#[from] StoreError),

    #[error("Cached output of step '{step}' is unusable: {message}")]
    CorruptStep { step: String, message: String },
}

/// How a workflow run ended when it did not succeed.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RunError {
    /// The failure is durably recorded; the run is finished.
    #[error("{0}")]
    Terminal(String),

    /// The failure could not be recorded; the run should be retried.
    #[error("{0}")]
    Unrecorded(String),
}

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("Unknown workflow event: {0}")]
    UnknownEvent(String),

    #[error("Invalid workflow payload: {0}")]
    Payload(#[from] serde_json::Error),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Errors returned by [`EnhancementService`](crate::service::EnhancementService).
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Queue(#[from] QueueError),

    /// A dependency needed to answer truthfully is down.
    #[error("Service unavailable: {0}")]
    Unavailable(String),
}

impl From<AssetKeyError> for ServiceError {
    fn from(err: AssetKeyError) -> Self {
        match err {
            AssetKeyError::NotOwned { .. } => {
                CoreError::Forbidden("Asset belongs to another user".into()).into()
            }
            other => CoreError::Validation(other.to_string()).into(),
        }
    }
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(errors: validator::ValidationErrors) -> Self {
        Self::Core(errors.into())
    }
}
