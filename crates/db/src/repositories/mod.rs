//! Repository layer: one zero-sized struct per table, async fns taking `&PgPool`.

pub mod photo_repo;
pub mod upscale_job_repo;
pub mod workflow_run_repo;
pub mod workflow_step_repo;

pub use photo_repo::PhotoRepo;
pub use upscale_job_repo::UpscaleJobRepo;
pub use workflow_run_repo::WorkflowRunRepo;
pub use workflow_step_repo::WorkflowStepRepo;
