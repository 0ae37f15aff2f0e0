//! `PgInstanceStore` — Postgres-backed instance tracker.
//!
//! Two tables: `instances` (one row per orchestration) and
//! `activity_history` (one row per dispatched task, keyed by
//! `(instance_id, task_index)`). All idempotence guarantees are enforced in
//! SQL: `ON CONFLICT DO NOTHING` for scheduled appends, guarded `UPDATE`s
//! for the Scheduled→terminal and Running→terminal transitions.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use photoflow_core::types::{
    ActivityRecord, InstanceStatus, OrchestrationInstance, ResizeRequest, ResultLocator,
    TaskFailure, TaskOutcome, TaskState,
};

use crate::store::InstanceStore;

/// Idempotent schema setup. Run once at daemon boot.
pub async fn migrate(pool: &PgPool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS instances (
            instance_id     UUID         PRIMARY KEY,
            status          TEXT         NOT NULL DEFAULT 'pending',
            input           JSONB        NOT NULL,
            output          JSONB,
            failures        JSONB        NOT NULL DEFAULT '[]'::jsonb,
            idempotency_key TEXT         UNIQUE,
            created_at      TIMESTAMPTZ  NOT NULL DEFAULT now(),
            updated_at      TIMESTAMPTZ  NOT NULL DEFAULT now()
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS activity_history (
            instance_id  UUID         NOT NULL REFERENCES instances(instance_id),
            task_index   INT          NOT NULL,
            request      JSONB        NOT NULL,
            state        TEXT         NOT NULL DEFAULT 'scheduled',
            result       JSONB,
            error        JSONB,
            scheduled_at TIMESTAMPTZ  NOT NULL DEFAULT now(),
            completed_at TIMESTAMPTZ,
            PRIMARY KEY (instance_id, task_index)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Postgres instance store. The single source of truth for replay.
#[derive(Clone)]
pub struct PgInstanceStore {
    pool: PgPool,
}

impl PgInstanceStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn insert(
        &self,
        input: &[ResizeRequest],
        idempotency_key: Option<&str>,
    ) -> Result<Option<Uuid>> {
        let instance_id = Uuid::new_v4();
        let row = sqlx::query_as::<_, (Uuid,)>(
            r#"
            INSERT INTO instances (instance_id, input, idempotency_key)
            VALUES ($1, $2, $3)
            ON CONFLICT (idempotency_key) DO NOTHING
            RETURNING instance_id
            "#,
        )
        .bind(instance_id)
        .bind(serde_json::to_value(input)?)
        .bind(idempotency_key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(id,)| id))
    }
}

fn task_state_str(state: TaskState) -> &'static str {
    match state {
        TaskState::Scheduled => "scheduled",
        TaskState::Completed => "completed",
        TaskState::Failed => "failed",
    }
}

fn parse_task_state(s: &str) -> Result<TaskState> {
    match s {
        "scheduled" => Ok(TaskState::Scheduled),
        "completed" => Ok(TaskState::Completed),
        "failed" => Ok(TaskState::Failed),
        other => bail!("unknown task state: {other}"),
    }
}

#[async_trait]
impl InstanceStore for PgInstanceStore {
    async fn create(&self, input: Vec<ResizeRequest>) -> Result<Uuid> {
        self.insert(&input, None)
            .await?
            .context("insert without idempotency key cannot conflict")
    }

    async fn create_with_key(
        &self,
        input: Vec<ResizeRequest>,
        idempotency_key: &str,
    ) -> Result<Uuid> {
        if let Some(id) = self.insert(&input, Some(idempotency_key)).await? {
            return Ok(id);
        }

        // Conflict: a Start with this key already created an instance.
        let (id,) = sqlx::query_as::<_, (Uuid,)>(
            "SELECT instance_id FROM instances WHERE idempotency_key = $1",
        )
        .bind(idempotency_key)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    async fn get(&self, instance_id: Uuid) -> Result<Option<OrchestrationInstance>> {
        type InstanceRow = (
            String,
            serde_json::Value,
            Option<serde_json::Value>,
            serde_json::Value,
            DateTime<Utc>,
            DateTime<Utc>,
        );
        let Some((status, input, output, failures, created_at, updated_at)) =
            sqlx::query_as::<_, InstanceRow>(
                r#"
                SELECT status, input, output, failures, created_at, updated_at
                FROM instances
                WHERE instance_id = $1
                "#,
            )
            .bind(instance_id)
            .fetch_optional(&self.pool)
            .await?
        else {
            return Ok(None);
        };

        type HistoryRow = (
            i32,
            serde_json::Value,
            String,
            Option<serde_json::Value>,
            Option<serde_json::Value>,
            DateTime<Utc>,
            Option<DateTime<Utc>>,
        );
        let rows = sqlx::query_as::<_, HistoryRow>(
            r#"
            SELECT task_index, request, state, result, error, scheduled_at, completed_at
            FROM activity_history
            WHERE instance_id = $1
            ORDER BY scheduled_at ASC, task_index ASC
            "#,
        )
        .bind(instance_id)
        .fetch_all(&self.pool)
        .await?;

        let mut history = Vec::with_capacity(rows.len());
        for (task_index, request, state, result, error, scheduled_at, completed_at) in rows {
            history.push(ActivityRecord {
                task_index: task_index as usize,
                request: serde_json::from_value(request)?,
                state: parse_task_state(&state)?,
                result: result.map(serde_json::from_value).transpose()?,
                error: error.map(serde_json::from_value).transpose()?,
                scheduled_at,
                completed_at,
            });
        }

        Ok(Some(OrchestrationInstance {
            instance_id,
            status: status.parse()?,
            input: serde_json::from_value(input)?,
            history,
            output: output.map(serde_json::from_value).transpose()?,
            failures: serde_json::from_value(failures)?,
            created_at,
            updated_at,
        }))
    }

    async fn append_scheduled(
        &self,
        instance_id: Uuid,
        task_index: usize,
        request: &ResizeRequest,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO activity_history (instance_id, task_index, request)
            VALUES ($1, $2, $3)
            ON CONFLICT (instance_id, task_index) DO NOTHING
            "#,
        )
        .bind(instance_id)
        .bind(task_index as i32)
        .bind(serde_json::to_value(request)?)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn record_completion(
        &self,
        instance_id: Uuid,
        task_index: usize,
        outcome: &TaskOutcome,
    ) -> Result<bool> {
        let (state, result, error) = match outcome {
            TaskOutcome::Completed { result } => (
                TaskState::Completed,
                Some(serde_json::to_value(result)?),
                None,
            ),
            TaskOutcome::Failed { error } => {
                (TaskState::Failed, None, Some(serde_json::to_value(error)?))
            }
        };

        let updated = sqlx::query(
            r#"
            UPDATE activity_history
            SET state = $1, result = $2, error = $3, completed_at = now()
            WHERE instance_id = $4 AND task_index = $5 AND state = 'scheduled'
            "#,
        )
        .bind(task_state_str(state))
        .bind(result)
        .bind(error)
        .bind(instance_id)
        .bind(task_index as i32)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if updated > 0 {
            sqlx::query("UPDATE instances SET updated_at = now() WHERE instance_id = $1")
                .bind(instance_id)
                .execute(&self.pool)
                .await?;
        }

        Ok(updated > 0)
    }

    async fn mark_running(&self, instance_id: Uuid) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE instances
            SET status = 'running', updated_at = now()
            WHERE instance_id = $1 AND status = 'pending'
            "#,
        )
        .bind(instance_id)
        .execute(&self.pool)
        .await?;
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

        let updated = sqlx::query(
            r#"
            UPDATE instances
            SET status = $1, output = $2, failures = $3, updated_at = now()
            WHERE instance_id = $4 AND status IN ('pending', 'running')
            "#,
        )
        .bind(status.as_str())
        .bind(output.map(|o| serde_json::to_value(o)).transpose()?)
        .bind(serde_json::to_value(failures)?)
        .bind(instance_id)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if updated == 0 {
            bail!("instance {instance_id} is terminal or missing; refusing to overwrite");
        }
        Ok(())
    }

    async fn list_runnable(&self, limit: usize) -> Result<Vec<Uuid>> {
        let rows = sqlx::query_as::<_, (Uuid,)>(
            r#"
            SELECT instance_id
            FROM instances
            WHERE status IN ('pending', 'running')
            ORDER BY created_at ASC
            LIMIT $1
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }
}
