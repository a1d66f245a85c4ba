//! Upscale job records and the views derived from them.

use serde::{Deserialize, Serialize};

use crate::status::UpscaleStatus;
use crate::types::{DbId, Timestamp, UserId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpscaleJob {
    pub id: DbId,
    pub photo_id: DbId,
    pub user_id: UserId,
    pub status: UpscaleStatus,
    pub source_path: String,
    pub result_path: Option<String>,
    pub error_message: Option<String>,
    pub created_at: Timestamp,
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
}

/// Outcome of an upscale submission.
///
/// `created` is false when an in-flight job for the same photo was returned
/// instead of creating a new one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSubmission {
    pub job_id: DbId,
    pub status: UpscaleStatus,
    pub created: bool,
}

/// Client-facing status snapshot.
///
/// `result_url` is a time-limited signed URL and is present exactly when the
/// status is `completed`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusSnapshot {
    pub job_id: DbId,
    pub status: UpscaleStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub created_at: Timestamp,
    #[serde(default)]
    pub started_at: Option<Timestamp>,
    #[serde(default)]
    pub completed_at: Option<Timestamp>,
}

impl JobStatusSnapshot {
    pub fn from_job(job: &UpscaleJob, result_url: Option<String>) -> Self {
        Self {
            job_id: job.id,
            status: job.status,
            result_url,
            error_message: job.error_message.clone(),
            created_at: job.created_at,
            started_at: job.started_at,
            completed_at: job.completed_at,
        }
    }
}
