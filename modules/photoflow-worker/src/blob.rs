//! `ObjectStore` implementations.

use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use blobstore_client::BlobClient;
use photoflow_core::deps::ObjectStore;

// ---------------------------------------------------------------------------
// BlobClient adapter (production — object-store gateway)
// ---------------------------------------------------------------------------

/// The production object store: a thin adapter over `BlobClient`.
pub struct GatewayObjectStore {
    client: BlobClient,
}

impl GatewayObjectStore {
    pub fn new(client: BlobClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ObjectStore for GatewayObjectStore {
    async fn fetch(&self, container: &str, name: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.client.fetch(container, name).await?)
    }

    async fn store(
        &self,
        container: &str,
        name: &str,
        bytes: Vec<u8>,
        content_disposition: &str,
    ) -> Result<()> {
        self.client
            .store(container, name, bytes, content_disposition)
            .await
            .map_err(anyhow::Error::from)
    }
}

// ---------------------------------------------------------------------------
// MemoryObjectStore (tests — no blob service required)
// ---------------------------------------------------------------------------

/// In-memory object store for testing. Thread-safe.
#[derive(Default)]
pub struct MemoryObjectStore {
    objects: Mutex<HashMap<(String, String), StoredObject>>,
    fail_uploads: bool,
}

#[derive(Debug, Clone)]
pub struct StoredObject {
    pub bytes: Vec<u8>,
    pub content_disposition: String,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose writes always fail, for exercising the upload error path.
    pub fn failing_uploads() -> Self {
        Self {
            fail_uploads: true,
            ..Self::default()
        }
    }

    /// Seed a source object.
    pub fn put(&self, container: &str, name: &str, bytes: Vec<u8>) {
        self.objects.lock().unwrap().insert(
            (container.to_string(), name.to_string()),
            StoredObject {
                bytes,
                content_disposition: String::new(),
            },
        );
    }

    /// Read back a stored object (for test assertions).
    pub fn object(&self, container: &str, name: &str) -> Option<StoredObject> {
        self.objects
            .lock()
            .unwrap()
            .get(&(container.to_string(), name.to_string()))
            .cloned()
    }

    /// Names of all objects in a container.
    pub fn names(&self, container: &str) -> Vec<String> {
        self.objects
            .lock()
            .unwrap()
            .keys()
            .filter(|(c, _)| c == container)
            .map(|(_, n)| n.clone())
            .collect()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn fetch(&self, container: &str, name: &str) -> Result<Option<Vec<u8>>> {
        Ok(self
            .objects
            .lock()
            .unwrap()
            .get(&(container.to_string(), name.to_string()))
            .map(|o| o.bytes.clone()))
    }

    async fn store(
        &self,
        container: &str,
        name: &str,
        bytes: Vec<u8>,
        content_disposition: &str,
    ) -> Result<()> {
        if self.fail_uploads {
            return Err(anyhow!("simulated upload failure"));
        }
        self.objects.lock().unwrap().insert(
            (container.to_string(), name.to_string()),
            StoredObject {
                bytes,
                content_disposition: content_disposition.to_string(),
            },
        );
        Ok(())
    }
}
