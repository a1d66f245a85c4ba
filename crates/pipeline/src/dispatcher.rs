//! Background run dispatcher.
//!
//! Polls the run queue every `poll_interval`, claims runs with
//! `SELECT FOR UPDATE SKIP LOCKED` semantics and executes up to
//! `max_concurrency` of them at once. Several processes may share the queue.
//!
//! An executing run refreshes its claim every heartbeat interval. Every
//! dispatcher sweeps for runs whose claim went stale, so a run is only
//! recovered once the process executing it has stopped heartbeating.

use std::sync::Arc;
use std::time::Duration;

use printframe_core::types::DbId;
use printframe_db::models::workflow::WorkflowRun;
use printframe_db::{RunStore, StepStore, StoreError};
use tokio::sync::Semaphore;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::config::PipelineConfig;
use crate::error::RunError;
use crate::retry::RetryPolicy;
use crate::step::StepContext;
use crate::workflows::WorkflowRegistry;

/// Executes one claimed run to completion and records its outcome.
#[derive(Clone)]
struct RunExecutor {
    runs: Arc<dyn RunStore>,
    steps: Arc<dyn StepStore>,
    registry: Arc<WorkflowRegistry>,
    retry: RetryPolicy,
    max_run_attempts: i32,
    heartbeat_interval: Duration,
}

impl RunExecutor {
    async fn execute(&self, run: WorkflowRun) {
        let Some(workflow) = self.registry.get(&run.event_name) else {
            tracing::error!(run_id = run.id, event = %run.event_name, "No workflow registered for event");
            self.record(self.runs.fail(run.id, &format!("Unknown workflow event: {}", run.event_name)).await, run.id);
            return;
        };

        tracing::info!(
            run_id = run.id,
            event = %run.event_name,
            attempt = run.attempts,
            "Workflow run started",
        );

        let ctx = StepContext::new(run.id, self.steps.clone(), self.retry.clone());
        let work = workflow.run(&ctx, run.payload.clone());
        tokio::pin!(work);
        let mut heartbeat = tokio::time::interval_at(Instant::now() + self.heartbeat_interval, self.heartbeat_interval);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let outcome = loop {
            tokio::select! {
                outcome = &mut work => break outcome,
                _ = heartbeat.tick() => self.heartbeat(run.id).await,
            }
        };

        let result = match outcome {
            Ok(_) => {
                tracing::info!(run_id = run.id, event = %run.event_name, "Workflow run completed");
                self.runs.complete(run.id).await
            }
            Err(RunError::Terminal(message)) => {
                tracing::warn!(run_id = run.id, event = %run.event_name, error = %message, "Workflow run failed");
                self.runs.fail(run.id, &message).await
            }
            Err(RunError::Unrecorded(message)) if run.attempts < self.max_run_attempts => {
                tracing::warn!(
                    run_id = run.id,
                    attempt = run.attempts,
                    error = %message,
                    "Workflow run could not record its failure, requeueing",
                );
                self.runs.requeue(run.id, &message).await
            }
            Err(RunError::Unrecorded(message)) => {
                tracing::error!(run_id = run.id, error = %message, "Workflow run out of attempts");
                self.runs.fail(run.id, &message).await
            }
        };
        self.record(result, run.id);
    }

    async fn heartbeat(&self, run_id: DbId) {
        match self.runs.heartbeat(run_id).await {
            Ok(true) => tracing::trace!(run_id, "Workflow run heartbeat"),
            Ok(false) => tracing::warn!(run_id, "Workflow run is no longer claimed by this dispatcher"),
            Err(e) => tracing::warn!(run_id, error = %e, "Workflow run heartbeat failed"),
        }
    }

    fn record(&self, result: Result<(), StoreError>, run_id: DbId) {
        if let Err(e) = result {
            // The run stays `running` and is picked up by stale recovery.
            tracing::error!(run_id, error = %e, "Failed to record workflow run outcome");
        }
    }
}

/// Background run dispatcher.
pub struct Dispatcher {
    executor: RunExecutor,
    poll_interval: Duration,
    max_concurrency: usize,
    stale_after: Duration,
    recovery_interval: Duration,
}

impl Dispatcher {
    pub fn new(
        runs: Arc<dyn RunStore>,
        steps: Arc<dyn StepStore>,
        registry: WorkflowRegistry,
        config: &PipelineConfig,
    ) -> Self {
        Self {
            executor: RunExecutor {
                runs,
                steps,
                registry: Arc::new(registry),
                retry: config.retry.clone(),
                max_run_attempts: config.max_run_attempts,
                heartbeat_interval: config
                    .heartbeat_interval
                    .min(config.stale_after / 3)
                    .max(Duration::from_millis(1)),
            },
            poll_interval: config.poll_interval,
            max_concurrency: config.max_concurrency.max(1),
            stale_after: config.stale_after,
            recovery_interval: (config.stale_after / 2).max(config.poll_interval),
        }
    }

    /// Put runs whose claim went stale back on the queue.
    pub async fn recover_stale(&self) -> Result<u64, StoreError> {
        let stale_after = chrono::Duration::from_std(self.stale_after).unwrap_or(chrono::Duration::zero());
        let cutoff = chrono::Utc::now() - stale_after;
        let recovered = self.executor.runs.requeue_stale(cutoff).await?;
        if recovered > 0 {
            tracing::warn!(recovered, "Requeued abandoned workflow runs");
        }
        Ok(recovered)
    }

    /// Run the dispatcher loop until the cancellation token is triggered,
    /// then wait for in-flight runs to finish.
    pub async fn run(&self, cancel: CancellationToken) {
        if let Err(e) = self.recover_stale().await {
            tracing::error!(error = %e, "Stale run recovery failed");
        }

        let permits = Arc::new(Semaphore::new(self.max_concurrency));
        let tracker = TaskTracker::new();
        let mut ticker = tokio::time::interval(self.poll_interval);
        let mut recovery = tokio::time::interval_at(Instant::now() + self.recovery_interval, self.recovery_interval);
        recovery.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::info!(
            poll_interval_ms = self.poll_interval.as_millis() as u64,
            max_concurrency = self.max_concurrency,
            heartbeat_ms = self.executor.heartbeat_interval.as_millis() as u64,
            "Workflow dispatcher started",
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Workflow dispatcher shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.dispatch_available(&permits, &tracker).await {
                        tracing::error!(error = %e, "Dispatch cycle failed");
                    }
                }
                _ = recovery.tick() => {
                    if let Err(e) = self.recover_stale().await {
                        tracing::error!(error = %e, "Stale run recovery failed");
                    }
                }
            }
        }

        tracker.close();
        tracker.wait().await;
        tracing::info!("Workflow dispatcher stopped");
    }

    /// Claim runs while execution slots are free.
    async fn dispatch_available(&self, permits: &Arc<Semaphore>, tracker: &TaskTracker) -> Result<(), StoreError> {
        loop {
            let Ok(permit) = permits.clone().try_acquire_owned() else {
                return Ok(());
            };
            let Some(run) = self.executor.runs.claim_next().await? else {
                return Ok(());
            };

            let executor = self.executor.clone();
            tracker.spawn(async move {
                executor.execute(run).await;
                drop(permit);
            });
        }
    }

    /// Execute queued runs one at a time until the queue is empty. Returns
    /// the number of runs executed.
    pub async fn run_until_idle(&self) -> Result<usize, StoreError> {
        let mut executed = 0;
        while let Some(run) = self.executor.runs.claim_next().await? {
            self.executor.execute(run).await;
            executed += 1;
        }
        Ok(executed)
    }
}
