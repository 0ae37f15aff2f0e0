//! HTTP client for the object-store gateway holding source photos and
//! resized outputs. Objects are addressed `{container}/{name}`; uploads
//! carry a content-disposition hint; signed read URLs come from the
//! gateway's signing endpoint (the signing itself is its concern, not ours).

pub mod error;

pub use error::{BlobError, Result};

use std::time::Duration;

pub struct BlobClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl BlobClient {
    pub fn new(base_url: &str, token: Option<&str>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.map(String::from),
        }
    }

    fn object_url(&self, container: &str, name: &str) -> String {
        format!("{}/{container}/{name}", self.base_url)
    }

    fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    /// Download an object's bytes. `Ok(None)` when the object does not exist.
    pub async fn fetch(&self, container: &str, name: &str) -> Result<Option<Vec<u8>>> {
        let resp = self
            .authorize(self.client.get(self.object_url(container, name)))
            .send()
            .await?;

        let status = resp.status();
        if status.as_u16() == 404 {
            return Ok(None);
        }
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(BlobError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(Some(resp.bytes().await?.to_vec()))
    }

    /// Upload an object with a content-disposition hint.
    pub async fn store(
        &self,
        container: &str,
        name: &str,
        bytes: Vec<u8>,
        content_disposition: &str,
    ) -> Result<()> {
        let resp = self
            .authorize(self.client.put(self.object_url(container, name)))
            .header("Content-Type", "image/jpeg")
            .header("Content-Disposition", content_disposition)
            .body(bytes)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(BlobError::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(())
    }

    /// Request a time-bounded read URL for an object, so callers can hand
    /// out direct download links without exposing store credentials.
    pub async fn signed_url(&self, container: &str, name: &str, ttl: Duration) -> Result<String> {
        let endpoint = format!(
            "{}?sign&ttl_secs={}",
            self.object_url(container, name),
            ttl.as_secs()
        );
        let resp = self.authorize(self.client.post(&endpoint)).send().await?;

        let status = resp.status();
        if status.as_u16() == 404 {
            return Err(BlobError::NotFound {
                container: container.to_string(),
                name: name.to_string(),
            });
        }
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(BlobError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(resp.text().await?.trim().to_string())
    }
}
