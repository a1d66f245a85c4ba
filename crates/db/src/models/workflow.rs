//! Durable orchestrator state: workflow runs and cached step outputs.

use printframe_core::status::{RunStatus, StatusId};
use printframe_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `workflow_runs` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct WorkflowRun {
    pub id: DbId,
    pub event_name: String,
    pub payload: serde_json::Value,
    pub status_id: StatusId,
    /// Number of times the workflow function has been invoked for this run.
    pub attempts: i32,
    pub error: Option<String>,
    pub claimed_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub completed_at: Option<Timestamp>,
}

impl WorkflowRun {
    pub fn status(&self) -> Option<RunStatus> {
        RunStatus::from_id(self.status_id)
    }
}

/// A cached step result. Exactly one of the two forms is stored.
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutput {
    Json(serde_json::Value),
    Blob(Vec<u8>),
}

/// A row from the `workflow_steps` table.
#[derive(Debug, Clone, FromRow)]
pub struct StepRow {
    pub run_id: DbId,
    pub step_name: String,
    pub output: Option<serde_json::Value>,
    pub blob: Option<Vec<u8>>,
    pub completed_at: Timestamp,
}

impl StepRow {
    pub fn into_output(self) -> Option<StepOutput> {
        match (self.output, self.blob) {
            (Some(json), _) => Some(StepOutput::Json(json)),
            (None, Some(bytes)) => Some(StepOutput::Blob(bytes)),
            (None, None) => None,
        }
    }
}
