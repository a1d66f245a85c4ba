pub mod photo;
pub mod upscale_job;
pub mod workflow;
