//! Repository for the `workflow_steps` table (the step cache).

use printframe_core::types::DbId;
use sqlx::PgPool;

use crate::models::workflow::StepRow;

const COLUMNS: &str = "run_id, step_name, output, blob, completed_at";

pub struct WorkflowStepRepo;

impl WorkflowStepRepo {
    pub async fn find(
        pool: &PgPool,
        run_id: DbId,
        step_name: &str,
    ) -> Result<Option<StepRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM workflow_steps WHERE run_id = $1 AND step_name = $2"
        );
        sqlx::query_as::<_, StepRow>(&query)
            .bind(run_id)
            .bind(step_name)
            .fetch_optional(pool)
            .await
    }

    /// Record a completed step. The first recorded output wins.
    pub async fn save(
        pool: &PgPool,
        run_id: DbId,
        step_name: &str,
        output: Option<&serde_json::Value>,
        blob: Option<&[u8]>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO workflow_steps (run_id, step_name, output, blob) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (run_id, step_name) DO NOTHING",
        )
        .bind(run_id)
        .bind(step_name)
        .bind(output)
        .bind(blob)
        .execute(pool)
        .await?;
        Ok(())
    }
}
