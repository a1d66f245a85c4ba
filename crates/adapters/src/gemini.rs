//! Vision analysis client: asks a multimodal model for adjustment
//! recommendations as schema-constrained JSON.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use printframe_core::adjustments::AdjustmentParameters;
use serde::Deserialize;
use validator::Validate;

use crate::error::AdapterError;
use crate::ensure_success;

pub const DEFAULT_GEMINI_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";

const MAX_OUTPUT_TOKENS: u32 = 1000;

const ANALYSIS_INSTRUCTIONS: &str = "\
Analyze this photograph and recommend specific adjustments to improve its visual quality.

Consider:
- Brightness: overall exposure (-100 very dark, 0 normal, +100 very bright)
- Contrast: difference between highlights and shadows (-100 low, 0 normal, +100 high)
- Saturation: color intensity (-100 desaturated, 0 normal, +100 very saturated)
- Sharpness: clarity and definition of detail (0 none, 100 maximum)
- Vibrance: selective saturation that protects skin tones (-100 to +100)
- Temperature: white balance (-100 very cool/blue, 0 neutral, +100 very warm/yellow)

Give precise numeric values and a short, clear explanation of why each adjustment improves the image.";

#[async_trait]
pub trait VisionService: Send + Sync {
    /// Recommend adjustments for an image. The result is always in range.
    async fn analyze(&self, image: &[u8], content_type: &str) -> Result<AdjustmentParameters, AdapterError>;
}

pub struct GeminiClient {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
}

impl GeminiClient {
    pub fn new(api_url: impl Into<String>, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: api_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    fn request_body(image: &[u8], content_type: &str) -> serde_json::Value {
        serde_json::json!({
            "contents": [{
                "role": "user",
                "parts": [
                    { "text": ANALYSIS_INSTRUCTIONS },
                    { "inline_data": { "mime_type": content_type, "data": BASE64.encode(image) } },
                ],
            }],
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": response_schema(),
                "maxOutputTokens": MAX_OUTPUT_TOKENS,
            },
        })
    }
}

/// JSON schema the model's output must follow.
fn response_schema() -> serde_json::Value {
    let signed = |description: &str| {
        serde_json::json!({ "type": "NUMBER", "minimum": -100, "maximum": 100, "description": description })
    };
    serde_json::json!({
        "type": "OBJECT",
        "properties": {
            "brightness": signed("Recommended brightness adjustment (-100 to 100)"),
            "contrast": signed("Recommended contrast adjustment (-100 to 100)"),
            "saturation": signed("Recommended saturation adjustment (-100 to 100)"),
            "sharpness": {
                "type": "NUMBER", "minimum": 0, "maximum": 100,
                "description": "Recommended sharpness adjustment (0 to 100)",
            },
            "vibrance": signed("Recommended vibrance adjustment (-100 to 100)"),
            "temperature": signed("Recommended color temperature adjustment (-100 to 100)"),
            "explanation": {
                "type": "STRING",
                "description": "Short explanation of the recommended adjustments",
            },
        },
        "required": ["brightness", "contrast", "saturation", "sharpness", "vibrance", "temperature", "explanation"],
    })
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

fn invalid(message: impl Into<String>) -> AdapterError {
    AdapterError::InvalidResponse {
        service: "vision",
        message: message.into(),
    }
}

/// Pull the structured recommendation out of a model response, clamping
/// out-of-range values.
fn parse_recommendation(response: GenerateContentResponse) -> Result<AdjustmentParameters, AdapterError> {
    let text: String = response
        .candidates
        .into_iter()
        .find_map(|c| c.content)
        .map(|content| content.parts.into_iter().filter_map(|p| p.text).collect())
        .ok_or_else(|| invalid("no candidates"))?;

    let params: AdjustmentParameters =
        serde_json::from_str(text.trim()).map_err(|e| invalid(format!("malformed recommendation: {e}")))?;

    if let Err(errors) = params.validate() {
        tracing::warn!(error = %errors, "Vision output out of range, clamping");
        return Ok(params.clamped());
    }
    Ok(params)
}

#[async_trait]
impl VisionService for GeminiClient {
    async fn analyze(&self, image: &[u8], content_type: &str) -> Result<AdjustmentParameters, AdapterError> {
        let response = self
            .client
            .post(format!("{}/v1beta/models/{}:generateContent", self.api_url, self.model))
            .header("x-goog-api-key", &self.api_key)
            .json(&Self::request_body(image, content_type))
            .send()
            .await?;

        let body: GenerateContentResponse = ensure_success("Analysis", response).await?.json().await?;
        let params = parse_recommendation(body)?;
        tracing::info!(model = %self.model, "Vision analysis finished");
        Ok(params)
    }
}
