//! Activity executor for the resize orchestration.
//!
//! Provides the real `ActivityRunner` (fetch → resize → unique-name
//! upload), the `ObjectStore` adapters, and the JPEG codec. The binary in
//! `main.rs` wires these into a polling worker daemon.

pub mod blob;
pub mod codec;
pub mod resize;

pub use blob::{GatewayObjectStore, MemoryObjectStore};
pub use codec::JpegCodec;
pub use resize::ResizeActivity;
