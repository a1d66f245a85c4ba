//! The three workflows and the registry the dispatcher resolves runs with.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use crate::deps::PipelineDeps;
use crate::error::RunError;
use crate::step::StepContext;

pub mod analyze;
pub mod enhance;
pub mod upscale;

pub use analyze::{AnalyzePayload, AnalyzeWorkflow};
pub use enhance::{EnhancePayload, EnhanceWorkflow};
pub use upscale::{UpscalePayload, UpscaleWorkflow, UPSCALE_KEY_MISSING};

#[async_trait]
pub trait Workflow: Send + Sync {
    fn event_name(&self) -> &'static str;

    /// Execute (or resume) a run. Every failure is handled inside the body;
    /// the error only says whether it was durably recorded.
    async fn run(&self, ctx: &StepContext, payload: serde_json::Value) -> Result<serde_json::Value, RunError>;
}

/// Workflows keyed by event name.
#[derive(Clone, Default)]
pub struct WorkflowRegistry {
    workflows: HashMap<&'static str, Arc<dyn Workflow>>,
}

impl WorkflowRegistry {
    /// Registry with the upscale, analysis and enhance workflows.
    pub fn standard(deps: PipelineDeps) -> Self {
        let mut registry = Self::default();
        registry.register(Arc::new(UpscaleWorkflow::new(deps.clone())));
        registry.register(Arc::new(AnalyzeWorkflow::new(deps.clone())));
        registry.register(Arc::new(EnhanceWorkflow::new(deps)));
        registry
    }

    pub fn register(&mut self, workflow: Arc<dyn Workflow>) {
        self.workflows.insert(workflow.event_name(), workflow);
    }

    pub fn get(&self, event_name: &str) -> Option<Arc<dyn Workflow>> {
        self.workflows.get(event_name).cloned()
    }
}

/// Decode a run payload; a malformed payload can never succeed.
pub(crate) fn decode_payload<P: DeserializeOwned>(payload: serde_json::Value) -> Result<P, RunError> {
    serde_json::from_value(payload).map_err(|e| RunError::Terminal(format!("Invalid payload: {e}")))
}
