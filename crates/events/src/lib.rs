//! Change notifications for photos and upscale jobs.
//!
//! - [`EventBus`]: in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`, consumed by the API's notification router.
//! - [`PlatformEvent`]: the event envelope, with typed constructors for job
//!   and photo changes.
//! - [`EventPublisher`]: the seam the pipeline publishes through, either
//!   straight onto a bus or via Postgres `NOTIFY` when the worker runs in a
//!   separate process.
//! - [`PgEventRelay`]: `LISTEN`s for those notifications and republishes
//!   them onto the API's bus.

pub mod bus;
pub mod publisher;
pub mod relay;

pub use bus::{EventBus, JobUpdate, PlatformEvent};
pub use publisher::{EventPublisher, PgNotifyPublisher};
pub use relay::PgEventRelay;
