//! The turn loop.
//!
//! Persist → dispatch → record completions → re-plan, until the planner
//! declares the instance finished. Every side effect lives out here or in
//! the activity runner; the planner itself stays pure so a crashed worker
//! can pick any instance back up from its stored history.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::StreamExt;
use tracing::{error, info, warn};
use uuid::Uuid;

use async_trait::async_trait;
use photoflow_core::error::{ActivityResult, EngineError, EngineResult};
use photoflow_core::types::{
    InstanceStatus, ResizeRequest, ResultLocator, TaskError, TaskFailure, TaskOutcome,
};
use photoflow_store::InstanceStore;

use crate::plan::{plan, Outcome, TaskDispatch, Turn};

/// One unit of externally visible work. The worker crate provides the real
/// resize implementation; tests script their own.
#[async_trait]
pub trait ActivityRunner: Send + Sync {
    async fn run(&self, request: &ResizeRequest) -> ActivityResult<ResultLocator>;
}

/// Snapshot returned to status pollers.
#[derive(Debug, Clone)]
pub struct StatusReport {
    pub instance_id: Uuid,
    pub status: InstanceStatus,
    pub output: Option<Vec<ResultLocator>>,
    pub failures: Vec<TaskFailure>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Drives orchestration instances against a store and an activity runner.
///
/// Many instances can be driven concurrently; each one is logically
/// single-threaded through its own turn loop.
pub struct Runtime<S: InstanceStore> {
    store: S,
    runner: Arc<dyn ActivityRunner>,
    concurrency: usize,
    activity_retries: u32,
    retry_backoff: Duration,
}

impl<S: InstanceStore> Runtime<S> {
    pub fn new(store: S, runner: Arc<dyn ActivityRunner>) -> Self {
        Self {
            store,
            runner,
            concurrency: 8,
            activity_retries: 0,
            retry_backoff: Duration::from_secs(2),
        }
    }

    /// Bound on in-flight activities per turn.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Activity-level retries (fixed backoff). Zero means one attempt.
    pub fn with_retries(mut self, retries: u32, backoff: Duration) -> Self {
        self.activity_retries = retries;
        self.retry_backoff = backoff;
        self
    }

    /// Create a new instance. Each call creates a fresh instance with a
    /// freshly generated id.
    pub async fn start(&self, input: Vec<ResizeRequest>) -> EngineResult<Uuid> {
        let instance_id = self.store.create(input).await?;
        info!(%instance_id, "orchestration instance created");
        Ok(instance_id)
    }

    /// Create a new instance, or return the one already created under this
    /// idempotency key.
    pub async fn start_with_key(
        &self,
        input: Vec<ResizeRequest>,
        idempotency_key: &str,
    ) -> EngineResult<Uuid> {
        let instance_id = self.store.create_with_key(input, idempotency_key).await?;
        info!(%instance_id, key = idempotency_key, "orchestration instance resolved");
        Ok(instance_id)
    }

    /// Ids of instances still worth driving, for the worker's poll loop.
    pub async fn list_runnable(&self, limit: usize) -> EngineResult<Vec<Uuid>> {
        Ok(self.store.list_runnable(limit).await?)
    }

    /// The external poll path: current status plus terminal output/errors.
    pub async fn status(&self, instance_id: Uuid) -> EngineResult<StatusReport> {
        let instance = self
            .store
            .get(instance_id)
            .await?
            .ok_or(EngineError::InstanceNotFound(instance_id))?;
        Ok(StatusReport {
            instance_id,
            status: instance.status,
            output: instance.output,
            failures: instance.failures,
            created_at: instance.created_at,
            updated_at: instance.updated_at,
        })
    }

    /// Drive one instance until terminal. Safe to call on an instance that
    /// already finished (returns its recorded outcome without dispatching)
    /// or on one a crashed worker left behind (replays history, re-runs
    /// only unresolved tasks).
    pub async fn run_to_completion(&self, instance_id: Uuid) -> EngineResult<Outcome> {
        loop {
            let instance = self
                .store
                .get(instance_id)
                .await?
                .ok_or(EngineError::InstanceNotFound(instance_id))?;

            if instance.status.is_terminal() {
                return Ok(recorded_outcome(instance.status, instance.output, instance.failures));
            }
            self.store.mark_running(instance_id).await?;

            let turn = match plan(&instance.input, &instance.history) {
                Ok(turn) => turn,
                Err(divergence) => {
                    // Corrupt history is never "repaired" into an answer.
                    error!(%instance_id, %divergence, "replay divergence; failing instance");
                    self.store
                        .set_terminal(instance_id, InstanceStatus::Failed, None, vec![])
                        .await?;
                    return Err(EngineError::ReplayDivergence {
                        instance_id,
                        detail: divergence.to_string(),
                    });
                }
            };

            match turn {
                Turn::Finished(outcome) => {
                    self.finalize(instance_id, &outcome).await?;
                    return Ok(outcome);
                }
                Turn::Dispatch(dispatches) => {
                    self.run_dispatches(instance_id, dispatches).await?;
                }
            }
        }
    }

    /// Fan out one turn's dispatches. Scheduled records are durable before
    /// any activity starts; completions are recorded as they land, in
    /// whatever order the tasks finish.
    async fn run_dispatches(
        &self,
        instance_id: Uuid,
        dispatches: Vec<TaskDispatch>,
    ) -> EngineResult<()> {
        for dispatch in dispatches.iter().filter(|d| d.needs_record) {
            self.store
                .append_scheduled(instance_id, dispatch.task_index, &dispatch.request)
                .await?;
        }
        info!(%instance_id, tasks = dispatches.len(), "dispatching resize activities");

        let mut completions = futures::stream::iter(dispatches.into_iter().map(|dispatch| {
            let runner = Arc::clone(&self.runner);
            let retries = self.activity_retries;
            let backoff = self.retry_backoff;
            async move {
                let outcome = run_activity(runner, &dispatch.request, retries, backoff).await;
                (dispatch.task_index, outcome)
            }
        }))
        .buffer_unordered(self.concurrency);

        while let Some((task_index, outcome)) = completions.next().await {
            let applied = self
                .store
                .record_completion(instance_id, task_index, &outcome)
                .await?;
            if !applied {
                warn!(%instance_id, task_index, "duplicate completion ignored");
            }
        }
        Ok(())
    }

    async fn finalize(&self, instance_id: Uuid, outcome: &Outcome) -> EngineResult<()> {
        match outcome {
            Outcome::Completed(locators) => {
                info!(%instance_id, results = locators.len(), "orchestration completed");
                self.store
                    .set_terminal(
                        instance_id,
                        InstanceStatus::Completed,
                        Some(locators.clone()),
                        vec![],
                    )
                    .await?;
            }
            Outcome::Failed(failures) => {
                warn!(%instance_id, failed = failures.len(), "orchestration failed");
                self.store
                    .set_terminal(instance_id, InstanceStatus::Failed, None, failures.clone())
                    .await?;
            }
        }
        Ok(())
    }
}

fn recorded_outcome(
    status: InstanceStatus,
    output: Option<Vec<ResultLocator>>,
    failures: Vec<TaskFailure>,
) -> Outcome {
    match status {
        InstanceStatus::Completed => Outcome::Completed(output.unwrap_or_default()),
        _ => Outcome::Failed(failures),
    }
}

/// One activity execution with optional fixed-backoff retries. All failures
/// fold into a recorded `TaskOutcome::Failed`; the orchestration itself
/// never retries a terminal task.
async fn run_activity(
    runner: Arc<dyn ActivityRunner>,
    request: &ResizeRequest,
    retries: u32,
    backoff: Duration,
) -> TaskOutcome {
    let mut attempt = 0;
    loop {
        match runner.run(request).await {
            Ok(result) => return TaskOutcome::Completed { result },
            Err(err) if attempt < retries => {
                attempt += 1;
                warn!(file = request.file_name.as_str(), %err, attempt, "activity retrying");
                tokio::time::sleep(backoff).await;
            }
            Err(err) => {
                return TaskOutcome::Failed {
                    error: TaskError::from(&err),
                }
            }
        }
    }
}
