//! The `InstanceStore` contract — the durable substrate the engine replays
//! against.
//!
//! `append_scheduled` must be durable before the engine dispatches the
//! corresponding activity; a crash between the two yields a duplicate
//! dispatch, which unique destination naming neutralizes. The store never
//! attempts exactly-once dispatch.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

use photoflow_core::types::{
    InstanceStatus, OrchestrationInstance, ResizeRequest, ResultLocator, TaskFailure, TaskOutcome,
};

/// Durable per-instance record: status, input, append-only activity
/// history, terminal output. Implemented by `PgInstanceStore` (production)
/// and `MemoryInstanceStore` (tests).
#[async_trait]
pub trait InstanceStore: Send + Sync {
    /// Create a new Pending instance. The input is fixed for the life of
    /// the instance.
    async fn create(&self, input: Vec<ResizeRequest>) -> Result<Uuid>;

    /// Create a new instance, or return the existing one created under the
    /// same idempotency key.
    async fn create_with_key(
        &self,
        input: Vec<ResizeRequest>,
        idempotency_key: &str,
    ) -> Result<Uuid>;

    /// Full snapshot: status, input, history in append order, output.
    async fn get(&self, instance_id: Uuid) -> Result<Option<OrchestrationInstance>>;

    /// Durably record that a task was dispatched. At most one record per
    /// `task_index`; if one already exists (re-dispatch after a crash) it
    /// is left untouched.
    async fn append_scheduled(
        &self,
        instance_id: Uuid,
        task_index: usize,
        request: &ResizeRequest,
    ) -> Result<()>;

    /// Move a task's record out of Scheduled, exactly once. Returns `false`
    /// without any state change when the record is already terminal
    /// (duplicate completion events are expected under at-least-once).
    async fn record_completion(
        &self,
        instance_id: Uuid,
        task_index: usize,
        outcome: &TaskOutcome,
    ) -> Result<bool>;

    /// Pending → Running. No-op when already Running; never touches a
    /// terminal instance.
    async fn mark_running(&self, instance_id: Uuid) -> Result<()>;

    /// Finalize the instance. Errors if the instance is already terminal —
    /// terminal state is immutable.
    async fn set_terminal(
        &self,
        instance_id: Uuid,
        status: InstanceStatus,
        output: Option<Vec<ResultLocator>>,
        failures: Vec<TaskFailure>,
    ) -> Result<()>;

    /// Ids of instances still worth driving (Pending or Running), oldest
    /// first. The worker daemon's poll source.
    async fn list_runnable(&self, limit: usize) -> Result<Vec<Uuid>>;
}

// Arc<S> blanket — lets the runtime and tests share one store.
#[async_trait]
impl<S: InstanceStore + ?Sized> InstanceStore for Arc<S> {
    async fn create(&self, input: Vec<ResizeRequest>) -> Result<Uuid> {
        (**self).create(input).await
    }

    async fn create_with_key(
        &self,
        input: Vec<ResizeRequest>,
        idempotency_key: &str,
    ) -> Result<Uuid> {
        (**self).create_with_key(input, idempotency_key).await
    }

    async fn get(&self, instance_id: Uuid) -> Result<Option<OrchestrationInstance>> {
        (**self).get(instance_id).await
    }

    async fn append_scheduled(
        &self,
        instance_id: Uuid,
        task_index: usize,
        request: &ResizeRequest,
    ) -> Result<()> {
        (**self)
            .append_scheduled(instance_id, task_index, request)
            .await
    }

    async fn record_completion(
        &self,
        instance_id: Uuid,
        task_index: usize,
        outcome: &TaskOutcome,
    ) -> Result<bool> {
        (**self)
            .record_completion(instance_id, task_index, outcome)
            .await
    }

    async fn mark_running(&self, instance_id: Uuid) -> Result<()> {
        (**self).mark_running(instance_id).await
    }

    async fn set_terminal(
        &self,
        instance_id: Uuid,
        status: InstanceStatus,
        output: Option<Vec<ResultLocator>>,
        failures: Vec<TaskFailure>,
    ) -> Result<()> {
        (**self)
            .set_terminal(instance_id, status, output, failures)
            .await
    }

    async fn list_runnable(&self, limit: usize) -> Result<Vec<Uuid>> {
        (**self).list_runnable(limit).await
    }
}
