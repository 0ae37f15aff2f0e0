//! Typed errors for activity execution and orchestration.

use thiserror::Error;
use uuid::Uuid;

/// Errors a resize activity can fail with. Each maps onto a
/// [`crate::types::TaskErrorKind`] when recorded in history.
#[derive(Debug, Error)]
pub enum ActivityError {
    /// The named source object does not exist in the source container.
    #[error("source not found: {name}")]
    SourceNotFound { name: String },

    /// The source bytes are not a decodable image.
    #[error("decode failed for {name}: {detail}")]
    Decode { name: String, detail: String },

    /// Writing the resized artifact to the destination container failed.
    #[error("upload failed for {name}: {detail}")]
    Upload { name: String, detail: String },
}

/// Errors from the orchestration engine itself.
#[derive(Debug, Error)]
pub enum EngineError {
    /// No instance with this id exists.
    #[error("instance not found: {0}")]
    InstanceNotFound(Uuid),

    /// Recorded history contradicts the instance input. The orchestration
    /// function must be a pure function of (input, history); when a record
    /// disagrees with the input it claims to derive from, the instance is
    /// marked Failed instead of producing wrong results.
    #[error("replay divergence on instance {instance_id}: {detail}")]
    ReplayDivergence { instance_id: Uuid, detail: String },

    /// The instance is already terminal and cannot be mutated.
    #[error("instance {0} is terminal")]
    Terminal(Uuid),

    /// Underlying store failure.
    #[error("store error: {0}")]
    Store(#[source] anyhow::Error),
}

impl From<anyhow::Error> for EngineError {
    fn from(err: anyhow::Error) -> Self {
        EngineError::Store(err)
    }
}

/// Result alias for activity execution.
pub type ActivityResult<T> = std::result::Result<T, ActivityError>;

/// Result alias for engine operations.
pub type EngineResult<T> = std::result::Result<T, EngineError>;
