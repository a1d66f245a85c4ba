//! Domain types shared by every Printframe crate.

pub mod adjustments;
pub mod asset_key;
pub mod error;
pub mod job_events;
pub mod photo;
pub mod status;
pub mod types;
pub mod upscale_job;
