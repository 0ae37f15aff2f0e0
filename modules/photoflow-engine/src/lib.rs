//! Durable fan-out/fan-in orchestration engine.
//!
//! A batch of resize requests becomes one orchestration instance. The pure
//! planner (`plan`) replays the instance's recorded history to decide what
//! still needs dispatching; the `Runtime` executes those dispatches through
//! an `ActivityRunner` with bounded concurrency and records every outcome
//! durably before acting on it. Crash recovery is a free consequence:
//! re-running an instance replays to exactly the not-yet-resolved tasks.

pub mod plan;
pub mod runtime;

pub use plan::{plan, Divergence, Outcome, TaskDispatch, Turn};
pub use runtime::{ActivityRunner, Runtime, StatusReport};
