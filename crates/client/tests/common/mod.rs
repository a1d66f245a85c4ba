//! Scripted fakes for the two observer seams.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use futures::channel::mpsc;
use futures::StreamExt;
use printframe_client::{ClientError, PushConnector, PushStream, ReconnectConfig, StatusSource, WatchConfig};
use printframe_core::job_events::ServerMessage;
use printframe_core::status::UpscaleStatus;
use printframe_core::types::DbId;
use printframe_core::upscale_job::JobStatusSnapshot;

pub const JOB: DbId = 41;

pub fn fast_config() -> WatchConfig {
    WatchConfig {
        poll_interval: Duration::from_millis(20),
        live_poll_interval: Duration::from_secs(10),
        refetch_delay: Duration::from_millis(10),
        connect_timeout: Duration::from_secs(1),
        reconnect: ReconnectConfig {
            initial_delay: Duration::from_millis(20),
            max_delay: Duration::from_millis(100),
            multiplier: 2.0,
        },
    }
}

pub fn snapshot(status: UpscaleStatus, result_url: Option<&str>) -> JobStatusSnapshot {
    JobStatusSnapshot {
        job_id: JOB,
        status,
        result_url: result_url.map(str::to_string),
        error_message: None,
        created_at: Utc::now(),
        started_at: None,
        completed_at: None,
    }
}

pub fn update(status: UpscaleStatus) -> ServerMessage {
    ServerMessage::JobUpdated {
        job_id: JOB,
        status,
        error_message: None,
    }
}

/// Status source replaying a script. `None` entries answer 503; the last
/// entry repeats once the script runs out.
pub struct ScriptedSource {
    script: Mutex<VecDeque<Option<JobStatusSnapshot>>>,
    last: Mutex<Option<JobStatusSnapshot>>,
    calls: AtomicUsize,
}

impl ScriptedSource {
    pub fn new(script: Vec<Option<JobStatusSnapshot>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            last: Mutex::new(None),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StatusSource for ScriptedSource {
    async fn get_status(&self, _job_id: DbId) -> Result<JobStatusSnapshot, ClientError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().unwrap().pop_front();
        let reply = match next {
            Some(entry) => {
                *self.last.lock().unwrap() = entry.clone();
                entry
            }
            None => self.last.lock().unwrap().clone(),
        };
        reply.ok_or_else(|| ClientError::Api {
            status: 503,
            code: "SERVICE_UNAVAILABLE".into(),
            message: "Result URL could not be signed".into(),
        })
    }
}

/// Push connector whose connections are driven by the test.
pub struct FakePush {
    accept: AtomicBool,
    attempts: AtomicUsize,
    current: Mutex<Option<mpsc::UnboundedSender<Result<ServerMessage, ClientError>>>>,
}

impl FakePush {
    pub fn new(accept: bool) -> Arc<Self> {
        Arc::new(Self {
            accept: AtomicBool::new(accept),
            attempts: AtomicUsize::new(0),
            current: Mutex::new(None),
        })
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn set_accept(&self, accept: bool) {
        self.accept.store(accept, Ordering::SeqCst);
    }

    /// Deliver a message on the open connection.
    pub fn send(&self, message: ServerMessage) {
        if let Some(tx) = self.current.lock().unwrap().as_ref() {
            let _ = tx.unbounded_send(Ok(message));
        }
    }

    /// Break the open connection the way a dropped socket does.
    pub fn drop_connection(&self) {
        if let Some(tx) = self.current.lock().unwrap().take() {
            let _ = tx.unbounded_send(Err(ClientError::Push("connection reset".into())));
        }
    }
}

#[async_trait]
impl PushConnector for FakePush {
    async fn connect(&self, _job_id: DbId) -> Result<PushStream, ClientError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if !self.accept.load(Ordering::SeqCst) {
            return Err(ClientError::Push("connection refused".into()));
        }
        let (tx, rx) = mpsc::unbounded();
        *self.current.lock().unwrap() = Some(tx);
        Ok(rx.boxed())
    }
}

/// Poll `condition` until it holds or two seconds pass.
pub async fn eventually(mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !condition() {
        assert!(tokio::time::Instant::now() < deadline, "condition not reached in time");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
