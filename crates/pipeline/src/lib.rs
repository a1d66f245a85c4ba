//! Durable background pipeline.
//!
//! Work is submitted as a [`WorkflowRun`](printframe_db::models::workflow::WorkflowRun)
//! through the [`queue::WorkflowQueue`], claimed by the
//! [`dispatcher::Dispatcher`] and executed as a sequence of named steps
//! whose outputs are cached by [`step::StepContext`], so a re-invoked run
//! replays finished steps instead of repeating their side effects.
//!
//! [`service::EnhancementService`] holds the synchronous operations the API
//! exposes on top of the queue.

pub mod config;
pub mod deps;
pub mod dispatcher;
pub mod error;
pub mod queue;
pub mod retry;
pub mod service;
pub mod step;
pub mod workflows;

pub use config::PipelineConfig;
pub use deps::PipelineDeps;
pub use dispatcher::Dispatcher;
pub use error::{QueueError, RunError, ServiceError, StepError, WorkflowError};
pub use queue::WorkflowQueue;
pub use retry::RetryPolicy;
pub use service::EnhancementService;
pub use step::StepContext;
