//! Instance tracker / status store.
//!
//! One durable record per orchestration instance: status, input, append-only
//! activity history, terminal output. The engine replays against this record;
//! the status-query path reads it.

pub mod memory;
pub mod pg;
pub mod store;

pub use memory::MemoryInstanceStore;
pub use pg::{migrate, PgInstanceStore};
pub use store::InstanceStore;
