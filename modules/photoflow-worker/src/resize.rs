//! The resize activity: one unit of work per dispatched task.
//!
//! Fetch the source photo, resize/re-encode through the codec, upload to a
//! freshly generated destination name. The fresh name per invocation is
//! what makes at-least-once dispatch safe: a re-execution after a crash
//! writes a new object instead of mutating an earlier one.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};
use uuid::Uuid;

use photoflow_core::deps::{ObjectStore, PictureCodec};
use photoflow_core::error::{ActivityError, ActivityResult};
use photoflow_core::types::{ResizeRequest, ResultLocator};
use photoflow_engine::ActivityRunner;

pub struct ResizeActivity {
    blobs: Arc<dyn ObjectStore>,
    codec: Arc<dyn PictureCodec>,
    source_container: String,
    dest_container: String,
}

impl ResizeActivity {
    pub fn new(
        blobs: Arc<dyn ObjectStore>,
        codec: Arc<dyn PictureCodec>,
        source_container: impl Into<String>,
        dest_container: impl Into<String>,
    ) -> Self {
        Self {
            blobs,
            codec,
            source_container: source_container.into(),
            dest_container: dest_container.into(),
        }
    }
}

#[async_trait]
impl ActivityRunner for ResizeActivity {
    async fn run(&self, request: &ResizeRequest) -> ActivityResult<ResultLocator> {
        debug!(
            file = request.file_name.as_str(),
            width = request.required_width,
            height = request.required_height,
            "resize activity starting"
        );

        let source = self
            .blobs
            .fetch(&self.source_container, &request.file_name)
            .await
            .map_err(|e| ActivityError::Upload {
                name: request.file_name.clone(),
                detail: format!("object store read failed: {e}"),
            })?
            .ok_or_else(|| ActivityError::SourceNotFound {
                name: request.file_name.clone(),
            })?;

        let resized = self
            .codec
            .resize_to_jpeg(&source, request.required_width, request.required_height)
            .map_err(|e| ActivityError::Decode {
                name: request.file_name.clone(),
                detail: e.to_string(),
            })?;

        // Unique name per invocation — collision-free across concurrent
        // and re-executed tasks.
        let dest_name = format!("{}.jpeg", Uuid::new_v4());
        let content_disposition = request.content_disposition();

        self.blobs
            .store(
                &self.dest_container,
                &dest_name,
                resized,
                &content_disposition,
            )
            .await
            .map_err(|e| ActivityError::Upload {
                name: request.file_name.clone(),
                detail: e.to_string(),
            })?;

        info!(
            file = request.file_name.as_str(),
            dest = dest_name.as_str(),
            "resized photo uploaded"
        );
        Ok(ResultLocator {
            name: dest_name,
            content_disposition,
        })
    }
}
