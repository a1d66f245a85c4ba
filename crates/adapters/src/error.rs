/// Errors from the remote enhancement services.
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout).
    #[error("{0}")]
    Request(#[from] reqwest::Error),

    /// The service answered with a non-2xx status.
    #[error("{operation} error: {status_text} - {body}")]
    Api {
        operation: &'static str,
        status: u16,
        status_text: String,
        body: String,
    },

    /// The service answered 2xx but the payload could not be used.
    #[error("Invalid {service} response: {message}")]
    InvalidResponse {
        service: &'static str,
        message: String,
    },
}

impl AdapterError {
    /// Remote failures are worth retrying; malformed payloads are not.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Request(_) | Self::Api { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_error_message_carries_status_and_body() {
        let err = AdapterError::Api {
            operation: "Sharpen",
            status: 502,
            status_text: "502 Bad Gateway".into(),
            body: "upstream timeout".into(),
        };
        assert_eq!(err.to_string(), "Sharpen error: 502 Bad Gateway - upstream timeout");
        assert!(err.is_transient());
    }

    #[test]
    fn invalid_response_is_permanent() {
        let err = AdapterError::InvalidResponse {
            service: "vision",
            message: "no candidates".into(),
        };
        assert!(!err.is_transient());
    }
}
