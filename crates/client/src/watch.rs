//! [`JobWatch`]: a subscription to one upscale job, owned by the UI.
//!
//! Three tasks cooperate per watch:
//!
//! * the push observer keeps a push subscription open, reconnecting with
//!   backoff when it drops;
//! * the polling observer fetches the status snapshot whenever the push
//!   channel changes state, every `poll_interval` while it is down, and
//!   every `live_poll_interval` while it is live, since a push can be lost
//!   on the server without the channel dropping;
//! * the reconcile loop feeds both into a [`Reconciler`] and publishes the
//!   resulting [`JobView`].
//!
//! All three stop when the job settles or the watch is dropped.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use printframe_core::job_events::ServerMessage;
use printframe_core::status::UpscaleStatus;
use printframe_core::types::DbId;
use printframe_core::upscale_job::JobStatusSnapshot;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use crate::api::StatusSource;
use crate::push::PushConnector;
use crate::reconcile::{JobView, Outcome, Reconciler};
use crate::reconnect::ReconnectConfig;

/// Timing knobs for a [`JobWatch`].
#[derive(Debug, Clone)]
pub struct WatchConfig {
    /// Status polling interval while the push channel is down.
    pub poll_interval: Duration,
    /// Slower safety poll while the push channel is live.
    pub live_poll_interval: Duration,
    /// Wait between confirmation fetches for a finished job whose result
    /// URL is not available yet.
    pub refetch_delay: Duration,
    /// Upper bound on one push connection attempt.
    pub connect_timeout: Duration,
    pub reconnect: ReconnectConfig,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            live_poll_interval: Duration::from_secs(15),
            refetch_delay: Duration::from_secs(1),
            connect_timeout: Duration::from_secs(10),
            reconnect: ReconnectConfig::default(),
        }
    }
}

/// Push channel health, for a "reconnecting" affordance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// First connection attempt in progress.
    Connecting,
    /// Subscribed; updates arrive by push, backed by a slow poll.
    Live,
    /// Push is down; polling covers the gap while reconnecting.
    Reconnecting,
}

#[derive(Debug)]
enum Observation {
    Push {
        status: UpscaleStatus,
        error_message: Option<String>,
    },
    Snapshot(JobStatusSnapshot),
}

/// Live view of one job. Dropping it cancels every background task.
pub struct JobWatch {
    job_id: DbId,
    view: watch::Receiver<Option<JobView>>,
    connection: watch::Receiver<ConnectionState>,
    cancel: CancellationToken,
}

impl JobWatch {
    /// Start watching `job_id`. Must be called from within a Tokio runtime.
    pub fn start(
        job_id: DbId,
        source: Arc<dyn StatusSource>,
        push: Arc<dyn PushConnector>,
        config: WatchConfig,
    ) -> Self {
        let (view_tx, view_rx) = watch::channel(None);
        let (connection_tx, connection_rx) = watch::channel(ConnectionState::Connecting);
        let (observations_tx, observations_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let config = Arc::new(config);

        tokio::spawn(observe_push(
            job_id,
            push,
            Arc::clone(&config),
            observations_tx.clone(),
            connection_tx,
            cancel.clone(),
        ));
        tokio::spawn(observe_polling(
            job_id,
            Arc::clone(&source),
            Arc::clone(&config),
            observations_tx,
            connection_rx.clone(),
            cancel.clone(),
        ));
        tokio::spawn(reconcile_loop(
            job_id,
            source,
            config,
            observations_rx,
            view_tx,
            cancel.clone(),
        ));

        Self {
            job_id,
            view: view_rx,
            connection: connection_rx,
            cancel,
        }
    }

    pub fn job_id(&self) -> DbId {
        self.job_id
    }

    /// Latest reconciled view, `None` until the first observation.
    pub fn view(&self) -> Option<JobView> {
        self.view.borrow().clone()
    }

    pub fn connection_state(&self) -> ConnectionState {
        *self.connection.borrow()
    }

    /// Receiver notified on every published view change.
    pub fn subscribe(&self) -> watch::Receiver<Option<JobView>> {
        self.view.clone()
    }

    pub fn connection_updates(&self) -> watch::Receiver<ConnectionState> {
        self.connection.clone()
    }

    /// Wait for the terminal view. A completed view always carries its
    /// result URL.
    pub async fn settled(&self) -> Option<JobView> {
        let mut view = self.view.clone();
        loop {
            let current = view.borrow_and_update().clone();
            if current.as_ref().is_some_and(|v| v.status.is_terminal()) {
                return current;
            }
            if view.changed().await.is_err() {
                return None;
            }
        }
    }
}

impl Drop for JobWatch {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn observe_push(
    job_id: DbId,
    connector: Arc<dyn PushConnector>,
    config: Arc<WatchConfig>,
    observations: mpsc::UnboundedSender<Observation>,
    connection: watch::Sender<ConnectionState>,
    cancel: CancellationToken,
) {
    let mut delay = config.reconnect.initial_delay;
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        let connected = tokio::select! {
            _ = cancel.cancelled() => return,
            result = tokio::time::timeout(config.connect_timeout, connector.connect(job_id)) => result,
        };

        match connected {
            Ok(Ok(mut stream)) => {
                set_state(&connection, ConnectionState::Live);
                tracing::debug!(job_id, attempt, "Push channel live");
                delay = config.reconnect.initial_delay;
                attempt = 0;

                loop {
                    let item = tokio::select! {
                        _ = cancel.cancelled() => return,
                        item = stream.next() => item,
                    };
                    match item {
                        Some(Ok(ServerMessage::JobUpdated {
                            job_id: updated,
                            status,
                            error_message,
                        })) if updated == job_id => {
                            if observations.send(Observation::Push { status, error_message }).is_err() {
                                return;
                            }
                        }
                        Some(Ok(ServerMessage::Error { message })) => {
                            tracing::warn!(job_id, %message, "Push channel reported an error");
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            tracing::warn!(job_id, error = %e, "Push channel dropped");
                            break;
                        }
                        None => {
                            tracing::warn!(job_id, "Push channel ended");
                            break;
                        }
                    }
                }
            }
            Ok(Err(e)) => {
                tracing::warn!(job_id, attempt, error = %e, "Push connect attempt failed");
            }
            Err(_) => {
                tracing::warn!(job_id, attempt, "Push connect attempt timed out");
            }
        }

        set_state(&connection, ConnectionState::Reconnecting);
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(delay) => {}
        }
        delay = config.reconnect.next_delay(delay);
    }
}

async fn observe_polling(
    job_id: DbId,
    source: Arc<dyn StatusSource>,
    config: Arc<WatchConfig>,
    observations: mpsc::UnboundedSender<Observation>,
    mut connection: watch::Receiver<ConnectionState>,
    cancel: CancellationToken,
) {
    let mut previous = ConnectionState::Connecting;

    loop {
        let state = *connection.borrow_and_update();
        if state != previous {
            tracing::debug!(job_id, ?state, "Push channel state changed");
            previous = state;
            // Updates pushed before the subscription existed are never
            // replayed, so every transition starts with a fresh snapshot.
            if state != ConnectionState::Connecting && !poll_once(job_id, source.as_ref(), &observations).await {
                return;
            }
        }

        let period = match state {
            ConnectionState::Connecting => None,
            ConnectionState::Live => Some(config.live_poll_interval),
            ConnectionState::Reconnecting => Some(config.poll_interval),
        };
        let tick = async {
            match period {
                Some(period) => tokio::time::sleep(period).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            _ = cancel.cancelled() => return,
            changed = connection.changed() => {
                if changed.is_err() {
                    return;
                }
            }
            _ = tick => {
                if !poll_once(job_id, source.as_ref(), &observations).await {
                    return;
                }
            }
        }
    }
}

/// Fetch one snapshot. False once the reconcile loop is gone.
async fn poll_once(
    job_id: DbId,
    source: &dyn StatusSource,
    observations: &mpsc::UnboundedSender<Observation>,
) -> bool {
    match source.get_status(job_id).await {
        Ok(snapshot) => observations.send(Observation::Snapshot(snapshot)).is_ok(),
        Err(e) => {
            tracing::warn!(job_id, error = %e, "Status poll failed");
            !observations.is_closed()
        }
    }
}

/// Publish `state` only when it differs, so repeated failed attempts do
/// not wake the polling observer.
fn set_state(connection: &watch::Sender<ConnectionState>, state: ConnectionState) {
    connection.send_if_modified(|current| {
        let modified = *current != state;
        *current = state;
        modified
    });
}

async fn reconcile_loop(
    job_id: DbId,
    source: Arc<dyn StatusSource>,
    config: Arc<WatchConfig>,
    mut observations: mpsc::UnboundedReceiver<Observation>,
    view: watch::Sender<Option<JobView>>,
    cancel: CancellationToken,
) {
    let mut reconciler = Reconciler::new(job_id);

    loop {
        let observation = tokio::select! {
            _ = cancel.cancelled() => return,
            observation = observations.recv() => match observation {
                Some(observation) => observation,
                None => return,
            },
        };

        let outcome = match &observation {
            Observation::Push { status, error_message } => {
                reconciler.apply_push(job_id, *status, error_message.clone())
            }
            Observation::Snapshot(snapshot) => reconciler.apply_snapshot(snapshot),
        };
        match outcome {
            Outcome::Updated => {
                view.send_replace(reconciler.view().cloned());
            }
            Outcome::NeedsSnapshot => {
                confirm_completion(job_id, source.as_ref(), &mut reconciler, &view, config.refetch_delay, &cancel)
                    .await;
            }
            Outcome::Ignored => {}
        }

        if reconciler.is_settled() {
            if let Some(settled) = reconciler.view() {
                tracing::info!(job_id, status = %settled.status, "Job settled");
            }
            cancel.cancel();
            return;
        }
    }
}

/// Fetch the status snapshot until the job is settled with everything the
/// view needs. Transient failures and snapshots lagging behind the push
/// event are retried.
async fn confirm_completion(
    job_id: DbId,
    source: &dyn StatusSource,
    reconciler: &mut Reconciler,
    view: &watch::Sender<Option<JobView>>,
    retry_delay: Duration,
    cancel: &CancellationToken,
) {
    loop {
        let fetched = tokio::select! {
            _ = cancel.cancelled() => return,
            fetched = source.get_status(job_id) => fetched,
        };
        match fetched {
            Ok(snapshot) => {
                if reconciler.apply_snapshot(&snapshot) == Outcome::Updated {
                    view.send_replace(reconciler.view().cloned());
                }
                if reconciler.is_settled() {
                    return;
                }
                tracing::debug!(job_id, status = %snapshot.status, "Result not available yet, re-fetching");
            }
            Err(e) => tracing::warn!(job_id, error = %e, "Status confirmation failed"),
        }
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(retry_delay) => {}
        }
    }
}
