//! Local pixel adjustment engine.
//!
//! One adjustment algorithm ([`plan`]) with two conforming implementations:
//! [`render`] is the full-resolution final path used by the pipeline, and
//! [`preview`] is the fast in-place path used for interactive previews.

pub mod error;
pub mod plan;
pub mod preview;
pub mod render;

pub use error::RenderError;
pub use plan::AdjustmentPlan;
