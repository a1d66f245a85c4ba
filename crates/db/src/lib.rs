//! Job record store: photos, upscale jobs, workflow runs and the step cache.
//!
//! Postgres access goes through zero-sized `*Repo` structs. Callers above
//! this crate talk to the [`store`] traits so the pipeline and API can run
//! against either [`store::PgStore`] or [`memory::MemoryStore`].

use sqlx::postgres::PgPoolOptions;

pub mod error;
pub mod memory;
pub mod models;
pub mod repositories;
pub mod store;

pub use error::StoreError;
pub use store::{JobAdmission, JobStore, PhotoStore, RunStore, StepStore, Stores};

pub type DbPool = sqlx::PgPool;

/// Create a connection pool from a database URL.
pub async fn create_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(20)
        .connect(database_url)
        .await
}

/// Cheap round-trip used by startup checks and `/health`.
pub async fn health_check(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Apply the embedded migrations.
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    let migrator = sqlx::migrate!("./migrations");
    tracing::info!(available = migrator.iter().count(), "Applying database migrations");
    migrator.run(pool).await
}
