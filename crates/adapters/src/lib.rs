//! Clients for the remote enhancement services.
//!
//! Both services are opaque: the pipeline only relies on the call and
//! response contracts expressed by [`UpscaleService`] and [`VisionService`].

pub mod error;
pub mod gemini;
pub mod topaz;

pub use error::AdapterError;
pub use gemini::{GeminiClient, VisionService};
pub use topaz::{EnhanceOptions, TopazClient, UpscaleService};

/// Turn a non-2xx response into [`AdapterError::Api`], keeping the body
/// for the error message.
pub(crate) async fn ensure_success(
    operation: &'static str,
    response: reqwest::Response,
) -> Result<reqwest::Response, AdapterError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<unreadable body>".to_string());
    Err(AdapterError::Api {
        operation,
        status: status.as_u16(),
        status_text: status.to_string(),
        body,
    })
}
