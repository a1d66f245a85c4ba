//! Repository for the `workflow_runs` table (the orchestrator queue).

use printframe_core::status::RunStatus;
use printframe_core::types::{DbId, Timestamp};
use sqlx::PgPool;

use crate::models::workflow::WorkflowRun;

/// Column list for `workflow_runs` queries.
const COLUMNS: &str = "\
    id, event_name, payload, status_id, attempts, error, claimed_at, \
    created_at, updated_at, completed_at";

pub struct WorkflowRunRepo;

impl WorkflowRunRepo {
    /// Persist a queued run. Returns immediately with the row.
    pub async fn enqueue(
        pool: &PgPool,
        event_name: &str,
        payload: &serde_json::Value,
    ) -> Result<WorkflowRun, sqlx::Error> {
        let query = format!(
            "INSERT INTO workflow_runs (event_name, payload, status_id) \
             VALUES ($1, $2, $3) RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, WorkflowRun>(&query)
            .bind(event_name)
            .bind(payload)
            .bind(RunStatus::Queued.id())
            .fetch_one(pool)
            .await
    }

    /// Atomically claim the oldest queued run.
    ///
    /// Uses `SELECT FOR UPDATE SKIP LOCKED` so several dispatchers can share
    /// the queue without double-dispatch.
    pub async fn claim_next(pool: &PgPool) -> Result<Option<WorkflowRun>, sqlx::Error> {
        let query = format!(
            "UPDATE workflow_runs \
             SET status_id = $1, attempts = attempts + 1, claimed_at = NOW(), updated_at = NOW() \
             WHERE id = ( \
                 SELECT id FROM workflow_runs \
                 WHERE status_id = $2 \
                 ORDER BY created_at ASC, id ASC \
                 LIMIT 1 \
                 FOR UPDATE SKIP LOCKED \
             ) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, WorkflowRun>(&query)
            .bind(RunStatus::Running.id())
            .bind(RunStatus::Queued.id())
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<WorkflowRun>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM workflow_runs WHERE id = $1");
        sqlx::query_as::<_, WorkflowRun>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn complete(pool: &PgPool, id: DbId) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE workflow_runs \
             SET status_id = $2, error = NULL, completed_at = NOW(), updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(RunStatus::Completed.id())
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn fail(pool: &PgPool, id: DbId, error: &str) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE workflow_runs \
             SET status_id = $2, error = $3, completed_at = NOW(), updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(RunStatus::Failed.id())
        .bind(error)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Put a running run back on the queue, keeping its step cache.
    pub async fn requeue(pool: &PgPool, id: DbId, error: &str) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE workflow_runs \
             SET status_id = $2, error = $3, claimed_at = NULL, updated_at = NOW() \
             WHERE id = $1 AND status_id = $4",
        )
        .bind(id)
        .bind(RunStatus::Queued.id())
        .bind(error)
        .bind(RunStatus::Running.id())
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Push `claimed_at` forward for a run that is still executing.
    /// Returns false when the run is no longer `running`.
    pub async fn heartbeat(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE workflow_runs \
             SET claimed_at = NOW(), updated_at = NOW() \
             WHERE id = $1 AND status_id = $2",
        )
        .bind(id)
        .bind(RunStatus::Running.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Re-queue runs left `running` by a dispatcher that stopped
    /// heartbeating before `cutoff`. Returns the number of runs recovered.
    pub async fn requeue_stale(pool: &PgPool, cutoff: Timestamp) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE workflow_runs \
             SET status_id = $1, claimed_at = NULL, updated_at = NOW() \
             WHERE status_id = $2 AND claimed_at < $3",
        )
        .bind(RunStatus::Queued.id())
        .bind(RunStatus::Running.id())
        .bind(cutoff)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }
}
