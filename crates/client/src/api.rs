//! REST client for the Printframe HTTP API.
//!
//! Every successful response is wrapped in a `{ "data": ... }` envelope and
//! every failure carries `{ "error", "code" }`; [`ApiClient`] unwraps both.

use async_trait::async_trait;
use printframe_core::adjustments::AdjustmentParameters;
use printframe_core::photo::Photo;
use printframe_core::types::DbId;
use printframe_core::upscale_job::{JobStatusSnapshot, JobSubmission};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::ClientError;

/// Anything that can produce an authoritative status snapshot for a job.
///
/// The polling observer and the reconciler's confirmation fetch both go
/// through this seam.
#[async_trait]
pub trait StatusSource: Send + Sync {
    async fn get_status(&self, job_id: DbId) -> Result<JobStatusSnapshot, ClientError>;
}

#[derive(Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
    #[serde(default)]
    code: String,
}

/// Response of the two queueing endpoints.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedRun {
    pub run_id: DbId,
    pub status: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignedUrl {
    signed_url: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SubmitUpscale<'a> {
    photo_id: DbId,
    source_path: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ApplyEnhancements<'a> {
    photo_id: DbId,
    adjustments: &'a AdjustmentParameters,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeImage<'a> {
    photo_id: DbId,
    image_url: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SignRequest<'a> {
    file_path: &'a str,
}

/// Authenticated HTTP client bound to one API origin and one bearer token.
#[derive(Clone)]
#[cfg_attr(test, derive(Debug))]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
    token: String,
}

impl ApiClient {
    /// * `base_url` - API origin, e.g. `https://api.example.com`.
    /// * `token`    - bearer token issued by the identity provider.
    pub fn new(base_url: &str, token: impl Into<String>) -> Result<Self, ClientError> {
        Self::with_client(reqwest::Client::new(), base_url, token)
    }

    /// Reuse an existing [`reqwest::Client`] connection pool.
    pub fn with_client(
        http: reqwest::Client,
        base_url: &str,
        token: impl Into<String>,
    ) -> Result<Self, ClientError> {
        Ok(Self {
            http,
            base_url: Url::parse(base_url)?,
            token: token.into(),
        })
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    /// Push channel endpoint on the same origin (`ws`/`wss` scheme).
    pub fn ws_url(&self) -> Result<Url, ClientError> {
        let mut url = self.endpoint("/api/v1/ws")?;
        let scheme = if url.scheme() == "https" { "wss" } else { "ws" };
        url.set_scheme(scheme)
            .map_err(|()| ClientError::Push(format!("cannot derive push URL from {}", self.base_url)))?;
        Ok(url)
    }

    pub async fn list_photos(&self) -> Result<Vec<Photo>, ClientError> {
        let response = self.get("/api/v1/photos").await?;
        Self::parse_data(response).await
    }

    pub async fn get_photo(&self, photo_id: DbId) -> Result<Photo, ClientError> {
        let response = self.get(&format!("/api/v1/photos/{photo_id}")).await?;
        Self::parse_data(response).await
    }

    /// Submit (or join) the photo's upscale job.
    pub async fn submit_upscale(&self, photo_id: DbId, source_path: &str) -> Result<JobSubmission, ClientError> {
        let body = SubmitUpscale { photo_id, source_path };
        let response = self.post("/api/v1/enhancement-jobs", &body).await?;
        Self::parse_data(response).await
    }

    pub async fn job_status(&self, job_id: DbId) -> Result<JobStatusSnapshot, ClientError> {
        let response = self.get(&format!("/api/v1/job-status/{job_id}")).await?;
        Self::parse_data(response).await
    }

    /// Most recent job of a photo, `None` if it was never upscaled.
    pub async fn latest_job(&self, photo_id: DbId) -> Result<Option<JobStatusSnapshot>, ClientError> {
        let response = self.get(&format!("/api/v1/photos/{photo_id}/latest-job")).await?;
        Self::parse_data(response).await
    }

    pub async fn apply_enhancements(
        &self,
        photo_id: DbId,
        adjustments: &AdjustmentParameters,
    ) -> Result<QueuedRun, ClientError> {
        let body = ApplyEnhancements { photo_id, adjustments };
        let response = self.post("/api/v1/apply-enhancements", &body).await?;
        Self::parse_data(response).await
    }

    pub async fn analyze_image(&self, photo_id: DbId, image_url: &str) -> Result<QueuedRun, ClientError> {
        let body = AnalyzeImage { photo_id, image_url };
        let response = self.post("/api/v1/analyze-image", &body).await?;
        Self::parse_data(response).await
    }

    pub async fn signed_url(&self, file_path: &str) -> Result<String, ClientError> {
        let response = self.post("/api/v1/assets/signed-url", &SignRequest { file_path }).await?;
        let signed: SignedUrl = Self::parse_data(response).await?;
        Ok(signed.signed_url)
    }

    /// Raw bytes of an owned asset, fetched through the API origin.
    pub async fn fetch_asset(&self, path: &str) -> Result<Vec<u8>, ClientError> {
        let mut url = self.endpoint("/api/v1/assets/proxy")?;
        url.query_pairs_mut().append_pair("path", path);
        let response = self.http.get(url).bearer_auth(&self.token).send().await?;
        let response = Self::ensure_success(response).await?;
        Ok(response.bytes().await?.to_vec())
    }

    // ---- private helpers ----

    fn endpoint(&self, path: &str) -> Result<Url, ClientError> {
        Ok(self.base_url.join(path)?)
    }

    async fn get(&self, path: &str) -> Result<reqwest::Response, ClientError> {
        let url = self.endpoint(path)?;
        Ok(self.http.get(url).bearer_auth(&self.token).send().await?)
    }

    async fn post<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<reqwest::Response, ClientError> {
        let url = self.endpoint(path)?;
        Ok(self
            .http
            .post(url)
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await?)
    }

    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, ClientError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(api_error(status.as_u16(), &body))
    }

    async fn parse_data<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ClientError> {
        let response = Self::ensure_success(response).await?;
        let bytes = response.bytes().await?;
        let envelope: Envelope<T> = serde_json::from_slice(&bytes)?;
        Ok(envelope.data)
    }
}

#[async_trait]
impl StatusSource for ApiClient {
    async fn get_status(&self, job_id: DbId) -> Result<JobStatusSnapshot, ClientError> {
        self.job_status(job_id).await
    }
}

/// Build a [`ClientError::Api`] from a failed response body. Bodies that
/// are not the JSON error shape are kept verbatim as the message.
fn api_error(status: u16, body: &str) -> ClientError {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(parsed) => ClientError::Api {
            status,
            code: parsed.code,
            message: parsed.error,
        },
        Err(_) => ClientError::Api {
            status,
            code: String::new(),
            message: body.to_string(),
        },
    }
}
