//! Core domain types. Everything durable serializes through serde; the
//! store persists these as JSONB payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ActivityError;

/// One picture-resize request, as submitted by the caller.
///
/// Wire names match the original intake format (`FileName`,
/// `RequiredWidth`, `RequiredHeight`). Immutable once an instance is
/// created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResizeRequest {
    #[serde(rename = "FileName")]
    pub file_name: String,
    #[serde(rename = "RequiredWidth")]
    pub required_width: u32,
    #[serde(rename = "RequiredHeight")]
    pub required_height: u32,
}

impl ResizeRequest {
    pub fn new(file_name: impl Into<String>, required_width: u32, required_height: u32) -> Self {
        Self {
            file_name: file_name.into(),
            required_width,
            required_height,
        }
    }

    /// The content-disposition hint embedded on the uploaded artifact,
    /// suggesting a dimension-stamped filename to downloading clients.
    pub fn content_disposition(&self) -> String {
        format!(
            "attachment; filename={}x{}.jpeg",
            self.required_width, self.required_height
        )
    }
}

/// Locator of one uploaded resized artifact in the destination container.
///
/// The name carries a fresh random component per activity invocation, so
/// re-executions after a crash never collide with earlier uploads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultLocator {
    pub name: String,
    pub content_disposition: String,
}

/// Lifecycle of one dispatched activity call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Scheduled,
    Completed,
    Failed,
}

/// Serializable error detail recorded against a failed task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskError {
    pub kind: TaskErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskErrorKind {
    SourceNotFound,
    Decode,
    Upload,
}

impl From<&ActivityError> for TaskError {
    fn from(err: &ActivityError) -> Self {
        let kind = match err {
            ActivityError::SourceNotFound { .. } => TaskErrorKind::SourceNotFound,
            ActivityError::Decode { .. } => TaskErrorKind::Decode,
            ActivityError::Upload { .. } => TaskErrorKind::Upload,
        };
        Self {
            kind,
            message: err.to_string(),
        }
    }
}

/// Terminal outcome of one activity call, as recorded in history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TaskOutcome {
    Completed { result: ResultLocator },
    Failed { error: TaskError },
}

/// One history entry per dispatched activity call. Exactly one record per
/// `task_index`; the record leaves `Scheduled` at most once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityRecord {
    pub task_index: usize,
    pub request: ResizeRequest,
    pub state: TaskState,
    pub result: Option<ResultLocator>,
    pub error: Option<TaskError>,
    pub scheduled_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl ActivityRecord {
    /// A freshly dispatched, not-yet-resolved record.
    pub fn scheduled(task_index: usize, request: ResizeRequest) -> Self {
        Self {
            task_index,
            request,
            state: TaskState::Scheduled,
            result: None,
            error: None,
            scheduled_at: Utc::now(),
            completed_at: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.state, TaskState::Completed | TaskState::Failed)
    }
}

/// Orchestration instance lifecycle. `Completed` and `Failed` are terminal
/// and immutable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl InstanceStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, InstanceStatus::Completed | InstanceStatus::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            InstanceStatus::Pending => "pending",
            InstanceStatus::Running => "running",
            InstanceStatus::Completed => "completed",
            InstanceStatus::Failed => "failed",
        }
    }
}

impl std::str::FromStr for InstanceStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(InstanceStatus::Pending),
            "running" => Ok(InstanceStatus::Running),
            "completed" => Ok(InstanceStatus::Completed),
            "failed" => Ok(InstanceStatus::Failed),
            other => Err(anyhow::anyhow!("unknown instance status: {other}")),
        }
    }
}

/// Per-failed-index detail surfaced on `Failed` instances.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskFailure {
    pub task_index: usize,
    pub error: TaskError,
}

/// Durable snapshot of one orchestration instance. The engine is the sole
/// writer; the status-query path reads it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestrationInstance {
    pub instance_id: Uuid,
    pub status: InstanceStatus,
    pub input: Vec<ResizeRequest>,
    /// Ordered by dispatch (append) order; completions land in any order.
    pub history: Vec<ActivityRecord>,
    /// Set only on `Completed`; index-aligned with `input`.
    pub output: Option<Vec<ResultLocator>>,
    /// Set only on `Failed`; sorted by `task_index`.
    pub failures: Vec<TaskFailure>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
