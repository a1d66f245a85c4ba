//! Client-side status reconciliation and interactive preview rendering.
//!
//! A [`JobWatch`] follows one upscale job through two redundant observers
//! (the push channel and status polling) that feed a single [`Reconciler`].
//! A [`PreviewRenderer`] turns a stream of adjustment edits into debounced
//! preview frames.

pub mod api;
pub mod error;
pub mod preview;
pub mod push;
pub mod reconcile;
pub mod reconnect;
pub mod watch;

pub use api::{ApiClient, StatusSource};
pub use error::ClientError;
pub use preview::{PreviewFrame, PreviewRenderer};
pub use push::{PushConnector, PushStream, WsPushConnector};
pub use reconcile::{JobView, Outcome, Reconciler};
pub use reconnect::ReconnectConfig;
pub use watch::{ConnectionState, JobWatch, WatchConfig};
