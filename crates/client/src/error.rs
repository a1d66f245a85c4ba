/// Errors surfaced by the client crate.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The API answered with a non-2xx status and an error body.
    #[error("API error ({status}, {code}): {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Malformed payload: {0}")]
    Decode(#[from] serde_json::Error),

    /// The push channel could not be opened, refused the subscription or
    /// dropped.
    #[error("Push channel error: {0}")]
    Push(String),

    #[error("Preview render failed: {0}")]
    Render(#[from] printframe_imaging::RenderError),

    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl ClientError {
    /// True for failures worth retrying as-is (transport and 5xx).
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Request(_) | Self::Push(_) => true,
            Self::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_errors_are_transient_client_errors_are_not() {
        let unavailable = ClientError::Api {
            status: 503,
            code: "SERVICE_UNAVAILABLE".into(),
            message: "signing down".into(),
        };
        let missing = ClientError::Api {
            status: 404,
            code: "NOT_FOUND".into(),
            message: "Job 1 not found".into(),
        };
        assert!(unavailable.is_transient());
        assert!(!missing.is_transient());
        assert!(ClientError::Push("closed".into()).is_transient());
    }
}
