//! Dyn-compatible seams for the activity executor's collaborators.
//!
//! The object store and the image codec are external concerns; the activity
//! only ever talks to them through these traits, which keeps the executor
//! testable without a blob service and keeps the pixel work delegated.

use anyhow::Result;
use async_trait::async_trait;

/// Object-store access as the activity sees it: read a source object,
/// write a destination object. `fetch` distinguishes "missing" from other
/// failures so the activity can report `SourceNotFound` precisely.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Read an object's bytes. `Ok(None)` when the object does not exist.
    async fn fetch(&self, container: &str, name: &str) -> Result<Option<Vec<u8>>>;

    /// Write an object with a content-disposition hint. Overwrites are
    /// allowed but never happen in practice: destination names carry a
    /// fresh random component per invocation.
    async fn store(
        &self,
        container: &str,
        name: &str,
        bytes: Vec<u8>,
        content_disposition: &str,
    ) -> Result<()>;
}

/// The delegated resize/encode operation: decode whatever the source bytes
/// are, scale to exactly the requested dimensions, re-encode as JPEG.
pub trait PictureCodec: Send + Sync {
    fn resize_to_jpeg(&self, bytes: &[u8], width: u32, height: u32) -> Result<Vec<u8>>;
}
