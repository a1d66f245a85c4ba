use std::sync::Arc;
use std::time::Duration;

use printframe_adapters::gemini::{DEFAULT_GEMINI_MODEL, DEFAULT_GEMINI_URL};
use printframe_adapters::topaz::DEFAULT_TOPAZ_URL;
use printframe_adapters::{GeminiClient, TopazClient, UpscaleService, VisionService};

use crate::retry::RetryPolicy;

/// Orchestrator and remote adapter configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Absent means every upscale fails fast with a configuration error.
    pub topaz_api_key: Option<String>,
    pub topaz_api_url: String,
    pub gemini_api_key: Option<String>,
    pub gemini_api_url: String,
    pub gemini_model: String,
    pub poll_interval: Duration,
    pub retry: RetryPolicy,
    pub max_concurrency: usize,
    /// Times a run may be re-invoked after a failure that could not be recorded.
    pub max_run_attempts: i32,
    /// Runs whose claim has not been refreshed for this long are considered
    /// abandoned and requeued.
    pub stale_after: Duration,
    /// How often an executing run refreshes its claim. Kept well below
    /// `stale_after` by the dispatcher.
    pub heartbeat_interval: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            topaz_api_key: None,
            topaz_api_url: DEFAULT_TOPAZ_URL.to_string(),
            gemini_api_key: None,
            gemini_api_url: DEFAULT_GEMINI_URL.to_string(),
            gemini_model: DEFAULT_GEMINI_MODEL.to_string(),
            poll_interval: Duration::from_secs(1),
            retry: RetryPolicy::default(),
            max_concurrency: 4,
            max_run_attempts: 3,
            stale_after: Duration::from_secs(600),
            heartbeat_interval: Duration::from_secs(60),
        }
    }
}

fn optional(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parsed<T: std::str::FromStr>(name: &str, default: T) -> T {
    match std::env::var(name) {
        Ok(raw) => raw
            .parse()
            .unwrap_or_else(|_| panic!("{name} must be a valid number, got '{raw}'")),
        Err(_) => default,
    }
}

impl PipelineConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                       | Default                                      |
    /// |-------------------------------|----------------------------------------------|
    /// | `TOPAZ_API_KEY`               | (none)                                       |
    /// | `TOPAZ_API_URL`               | `https://api.topazlabs.com`                  |
    /// | `GEMINI_API_KEY`              | (none)                                       |
    /// | `GEMINI_API_URL`              | `https://generativelanguage.googleapis.com`  |
    /// | `GEMINI_MODEL`                | `gemini-2.5-flash`                           |
    /// | `PIPELINE_POLL_INTERVAL_MS`   | `1000`                                       |
    /// | `PIPELINE_MAX_ATTEMPTS`       | `4`                                          |
    /// | `PIPELINE_MAX_CONCURRENCY`    | `4`                                          |
    /// | `PIPELINE_MAX_RUN_ATTEMPTS`   | `3`                                          |
    /// | `PIPELINE_STALE_AFTER_SECS`   | `600`                                        |
    /// | `PIPELINE_HEARTBEAT_SECS`     | `60`                                         |
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            topaz_api_key: optional("TOPAZ_API_KEY"),
            topaz_api_url: optional("TOPAZ_API_URL").unwrap_or(defaults.topaz_api_url),
            gemini_api_key: optional("GEMINI_API_KEY"),
            gemini_api_url: optional("GEMINI_API_URL").unwrap_or(defaults.gemini_api_url),
            gemini_model: optional("GEMINI_MODEL").unwrap_or(defaults.gemini_model),
            poll_interval: Duration::from_millis(parsed("PIPELINE_POLL_INTERVAL_MS", 1000)),
            retry: RetryPolicy::default().with_max_attempts(parsed("PIPELINE_MAX_ATTEMPTS", 4)),
            max_concurrency: parsed("PIPELINE_MAX_CONCURRENCY", 4usize).max(1),
            max_run_attempts: parsed("PIPELINE_MAX_RUN_ATTEMPTS", 3),
            stale_after: Duration::from_secs(parsed("PIPELINE_STALE_AFTER_SECS", 600)),
            heartbeat_interval: Duration::from_secs(parsed("PIPELINE_HEARTBEAT_SECS", 60)),
        }
    }

    /// Upscale client, if a credential is configured.
    pub fn upscaler(&self) -> Option<Arc<dyn UpscaleService>> {
        match &self.topaz_api_key {
            Some(key) => Some(Arc::new(TopazClient::new(self.topaz_api_url.clone(), key.clone()))),
            None => {
                tracing::warn!("TOPAZ_API_KEY not set; upscale jobs will fail");
                None
            }
        }
    }

    /// Vision client, if a credential is configured.
    pub fn vision(&self) -> Option<Arc<dyn VisionService>> {
        match &self.gemini_api_key {
            Some(key) => Some(Arc::new(GeminiClient::new(
                self.gemini_api_url.clone(),
                key.clone(),
                self.gemini_model.clone(),
            ))),
            None => {
                tracing::warn!("GEMINI_API_KEY not set; image analysis will fail");
                None
            }
        }
    }
}
