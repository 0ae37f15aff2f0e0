use thiserror::Error;

pub type Result<T> = std::result::Result<T, BlobError>;

#[derive(Debug, Error)]
pub enum BlobError {
    #[error("object not found: {container}/{name}")]
    NotFound { container: String, name: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },
}

impl From<reqwest::Error> for BlobError {
    fn from(err: reqwest::Error) -> Self {
        BlobError::Network(err.to_string())
    }
}
