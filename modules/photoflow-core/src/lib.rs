pub mod config;
pub mod deps;
pub mod error;
pub mod types;

pub use config::AppConfig;
pub use deps::{ObjectStore, PictureCodec};
pub use error::{ActivityError, ActivityResult, EngineError, EngineResult};
pub use types::*;
