//! In-memory instance store for tests. Mirrors `PgInstanceStore` semantics
//! exactly (idempotent appends, single Scheduled→terminal transition,
//! immutable terminal instances) without a database. Thread-safe.

use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use photoflow_core::types::{
    ActivityRecord, InstanceStatus, OrchestrationInstance, ResizeRequest, ResultLocator,
    TaskFailure, TaskOutcome, TaskState,
};

use crate::store::InstanceStore;

#[derive(Default)]
struct Inner {
    instances: HashMap<Uuid, OrchestrationInstance>,
    keys: HashMap<String, Uuid>,
    creation_order: Vec<Uuid>,
}

#[derive(Default)]
pub struct MemoryInstanceStore {
    inner: Mutex<Inner>,
}

impl MemoryInstanceStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(&self, input: Vec<ResizeRequest>, key: Option<&str>) -> Uuid {
        let mut inner = self.inner.lock().unwrap();
        if let Some(key) = key {
            if let Some(existing) = inner.keys.get(key) {
                return *existing;
            }
        }

        let instance_id = Uuid::new_v4();
        let now = Utc::now();
        inner.instances.insert(
            instance_id,
            OrchestrationInstance {
                instance_id,
                status: InstanceStatus::Pending,
                input,
                history: Vec::new(),
                output: None,
                failures: Vec::new(),
                created_at: now,
                updated_at: now,
            },
        );
        inner.creation_order.push(instance_id);
        if let Some(key) = key {
            inner.keys.insert(key.to_string(), instance_id);
        }
        instance_id
    }
}

#[async_trait]
impl InstanceStore for MemoryInstanceStore {
    async fn create(&self, input: Vec<ResizeRequest>) -> Result<Uuid> {
        Ok(self.insert(input, None))
    }

    async fn create_with_key(
        &self,
        input: Vec<ResizeRequest>,
        idempotency_key: &str,
    ) -> Result<Uuid> {
        Ok(self.insert(input, Some(idempotency_key)))
    }

    async fn get(&self, instance_id: Uuid) -> Result<Option<OrchestrationInstance>> {
        Ok(self.inner.lock().unwrap().instances.get(&instance_id).cloned())
    }

    async fn append_scheduled(
        &self,
        instance_id: Uuid,
        task_index: usize,
        request: &ResizeRequest,
    ) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        let Some(instance) = inner.instances.get_mut(&instance_id) else {
            bail!("instance not found: {instance_id}");
        };
        if instance.history.iter().any(|r| r.task_index == task_index) {
            return Ok(());
        }
        instance
            .history
            .push(ActivityRecord::scheduled(task_index, request.clone()));
        instance.updated_at = Utc::now();
        Ok(())
    }

    async fn record_completion(
        &self,
        instance_id: Uuid,
        task_index: usize,
        outcome: &TaskOutcome,
    ) -> Result<bool> {
        let mut inner = self.inner.lock().unwrap();
        let Some(instance) = inner.instances.get_mut(&instance_id) else {
            bail!("instance not found: {instance_id}");
        };
        let Some(record) = instance
            .history
            .iter_mut()
            .find(|r| r.task_index == task_index)
        else {
            bail!("no scheduled record for task {task_index} on {instance_id}");
        };
        if record.state != TaskState::Scheduled {
            return Ok(false);
        }

        match outcome {
            TaskOutcome::Completed { result } => {
                record.state = TaskState::Completed;
                record.result = Some(result.clone());
            }
            TaskOutcome::Failed { error } => {
                record.state = TaskState::Failed;
                record.error = Some(error.clone());
            }
        }
        record.completed_at = Some(Utc::now());
        instance.updated_at = Utc::now();
        Ok(true)
    }

    async fn mark_running(&self, instance_id: Uuid) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(instance) = inner.instances.get_mut(&instance_id) {
            if instance.status == InstanceStatus::Pending {
                instance.status = InstanceStatus::Running;
                instance.updated_at = Utc::now();
            }
        }
        Ok(())
    }

    async fn set_terminal(
        &self,
        instance_id: Uuid,
        status: InstanceStatus,
        output: Option<Vec<ResultLocator>>,
        failures: Vec<TaskFailure>,
    ) -> Result<()> {
        if !status.is_terminal() {
            bail!("set_terminal called with non-terminal status {status:?}");
        }
        let mut inner = self.inner.lock().unwrap();
        let Some(instance) = inner.instances.get_mut(&instance_id) else {
            bail!("instance not found: {instance_id}");
        };
        if instance.status.is_terminal() {
            bail!("instance {instance_id} is terminal; refusing to overwrite");
        }
        instance.status = status;
        instance.output = output;
        instance.failures = failures;
        instance.updated_at = Utc::now();
        Ok(())
    }

    async fn list_runnable(&self, limit: usize) -> Result<Vec<Uuid>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .creation_order
            .iter()
            .filter(|id| {
                inner
                    .instances
                    .get(id)
                    .is_some_and(|i| !i.status.is_terminal())
            })
            .take(limit)
            .copied()
            .collect())
    }
}
