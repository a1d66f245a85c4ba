//! Durable step runner.
//!
//! Every step is keyed by `(run_id, step_name)`. A step whose output is
//! already cached is replayed without running its body; otherwise the body
//! runs with retries and its output is persisted before the next step.

use std::future::Future;
use std::sync::Arc;

use printframe_core::types::DbId;
use printframe_db::models::workflow::StepOutput;
use printframe_db::StepStore;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{StepError, WorkflowError};
use crate::retry::RetryPolicy;

pub struct StepContext {
    run_id: DbId,
    steps: Arc<dyn StepStore>,
    retry: RetryPolicy,
}

impl StepContext {
    pub fn new(run_id: DbId, steps: Arc<dyn StepStore>, retry: RetryPolicy) -> Self {
        Self { run_id, steps, retry }
    }

    pub fn run_id(&self) -> DbId {
        self.run_id
    }

    /// Run a step with a JSON-serializable output.
    pub async fn run<T, F, Fut>(&self, name: &str, body: F) -> Result<T, WorkflowError>
    where
        T: Serialize + DeserializeOwned,
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, StepError>>,
    {
        match self.steps.load(self.run_id, name).await? {
            Some(StepOutput::Json(value)) => {
                tracing::debug!(run_id = self.run_id, step = name, "Replaying cached step");
                return serde_json::from_value(value).map_err(|e| WorkflowError::CorruptStep {
                    step: name.to_string(),
                    message: e.to_string(),
                });
            }
            Some(StepOutput::Blob(_)) => {
                return Err(WorkflowError::CorruptStep {
                    step: name.to_string(),
                    message: "expected JSON output, found binary".into(),
                });
            }
            None => {}
        }

        let value = self.execute(name, body).await?;
        let json = serde_json::to_value(&value).map_err(|e| WorkflowError::CorruptStep {
            step: name.to_string(),
            message: e.to_string(),
        })?;
        self.steps.save(self.run_id, name, &StepOutput::Json(json)).await?;
        Ok(value)
    }

    /// Run a step whose output is raw bytes (downloaded or rendered images).
    pub async fn run_blob<F, Fut>(&self, name: &str, body: F) -> Result<Vec<u8>, WorkflowError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<Vec<u8>, StepError>>,
    {
        match self.steps.load(self.run_id, name).await? {
            Some(StepOutput::Blob(bytes)) => {
                tracing::debug!(run_id = self.run_id, step = name, "Replaying cached step");
                return Ok(bytes);
            }
            Some(StepOutput::Json(_)) => {
                return Err(WorkflowError::CorruptStep {
                    step: name.to_string(),
                    message: "expected binary output, found JSON".into(),
                });
            }
            None => {}
        }

        let bytes = self.execute(name, body).await?;
        self.steps
            .save(self.run_id, name, &StepOutput::Blob(bytes.clone()))
            .await?;
        Ok(bytes)
    }

    async fn execute<T, F, Fut>(&self, name: &str, body: F) -> Result<T, WorkflowError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, StepError>>,
    {
        let mut delay = self.retry.initial_delay;
        let mut attempt = 1u32;

        loop {
            match body().await {
                Ok(value) => return Ok(value),
                Err(StepError::Transient(message)) if attempt < self.retry.max_attempts => {
                    tracing::warn!(
                        run_id = self.run_id,
                        step = name,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %message,
                        "Step failed, retrying",
                    );
                    tokio::time::sleep(delay).await;
                    delay = self.retry.next_delay(delay);
                    attempt += 1;
                }
                Err(err) => {
                    tracing::error!(
                        run_id = self.run_id,
                        step = name,
                        attempt,
                        error = %err,
                        "Step failed",
                    );
                    return Err(WorkflowError::Step {
                        step: name.to_string(),
                        message: err.message().to_string(),
                    });
                }
            }
        }
    }
}
