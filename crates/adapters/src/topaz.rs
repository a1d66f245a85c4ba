//! Client for the remote upscale/sharpen service.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};

use crate::error::AdapterError;
use crate::ensure_success;

/// Production endpoint.
pub const DEFAULT_TOPAZ_URL: &str = "https://api.topazlabs.com";

/// Parameters of the enhance (upscale) call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnhanceOptions {
    pub output_width: u32,
    pub crop_to_fill: bool,
    pub output_format: &'static str,
}

impl Default for EnhanceOptions {
    fn default() -> Self {
        Self {
            output_width: 3840,
            crop_to_fill: false,
            output_format: "jpeg",
        }
    }
}

#[async_trait]
pub trait UpscaleService: Send + Sync {
    async fn sharpen(&self, image: Vec<u8>) -> Result<Vec<u8>, AdapterError>;

    async fn enhance(&self, image: Vec<u8>, options: &EnhanceOptions) -> Result<Vec<u8>, AdapterError>;
}

/// HTTP client for the Topaz image API.
pub struct TopazClient {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
}

impl TopazClient {
    pub fn new(api_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), api_url, api_key)
    }

    /// Reuse an existing [`reqwest::Client`] for connection pooling.
    pub fn with_client(
        client: reqwest::Client,
        api_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            client,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    fn image_part(image: Vec<u8>) -> Result<Part, AdapterError> {
        Ok(Part::bytes(image).file_name("image.jpg").mime_str("image/jpeg")?)
    }

    async fn post_image(
        &self,
        operation: &'static str,
        path: &str,
        form: Form,
    ) -> Result<Vec<u8>, AdapterError> {
        let response = self
            .client
            .post(format!("{}{path}", self.api_url))
            .header("X-API-Key", &self.api_key)
            .header(reqwest::header::ACCEPT, "image/jpeg")
            .multipart(form)
            .send()
            .await?;

        let bytes = ensure_success(operation, response).await?.bytes().await?;
        if bytes.is_empty() {
            return Err(AdapterError::InvalidResponse {
                service: "upscale",
                message: format!("{operation} returned an empty image"),
            });
        }
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl UpscaleService for TopazClient {
    async fn sharpen(&self, image: Vec<u8>) -> Result<Vec<u8>, AdapterError> {
        let size = image.len();
        let form = Form::new().part("image", Self::image_part(image)?);
        let out = self.post_image("Sharpen", "/image/v1/sharpen", form).await?;
        tracing::debug!(input_bytes = size, output_bytes = out.len(), "Sharpen finished");
        Ok(out)
    }

    async fn enhance(&self, image: Vec<u8>, options: &EnhanceOptions) -> Result<Vec<u8>, AdapterError> {
        let size = image.len();
        let form = Form::new()
            .part("image", Self::image_part(image)?)
            .text("output_width", options.output_width.to_string())
            .text("crop_to_fill", options.crop_to_fill.to_string())
            .text("output_format", options.output_format);
        let out = self.post_image("Enhance", "/image/v1/enhance", form).await?;
        tracing::debug!(input_bytes = size, output_bytes = out.len(), "Enhance finished");
        Ok(out)
    }
}
