use anyhow::Result;

/// Application configuration loaded from environment variables.
/// Secrets and env-specific endpoints only; orchestration semantics are
/// code, not config.
#[derive(Debug, Clone)]
pub struct AppConfig {
    // Database
    pub database_url: String,

    // Object store
    pub blobstore_url: String,
    pub blobstore_token: Option<String>,
    pub source_container: String,
    pub dest_container: String,

    // Worker tuning
    pub worker_concurrency: usize,
    pub activity_retries: u32,
    pub poll_interval_secs: u64,

    // Signed download links
    pub signed_url_ttl_secs: u64,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            database_url: std::env::var("DATABASE_URL")?,
            blobstore_url: std::env::var("BLOBSTORE_URL")?,
            blobstore_token: std::env::var("BLOBSTORE_TOKEN").ok(),
            source_container: std::env::var("SOURCE_CONTAINER")
                .unwrap_or_else(|_| "photos".to_string()),
            dest_container: std::env::var("DEST_CONTAINER")
                .unwrap_or_else(|_| "doneorders".to_string()),
            worker_concurrency: parse_or("WORKER_CONCURRENCY", 8),
            activity_retries: parse_or("ACTIVITY_RETRIES", 0),
            poll_interval_secs: parse_or("POLL_INTERVAL_SECS", 10),
            signed_url_ttl_secs: parse_or("SIGNED_URL_TTL_SECS", 86_400),
        };

        config.log_redacted();
        Ok(config)
    }

    fn log_redacted(&self) {
        fn preview(val: &str) -> String {
            let n = val.len().min(5);
            format!("{}...({} chars)", &val[..n], val.len())
        }

        tracing::info!("Config loaded:");
        tracing::info!("  DATABASE_URL: {}", preview(&self.database_url));
        tracing::info!("  BLOBSTORE_URL: {}", self.blobstore_url);
        tracing::info!(
            "  BLOBSTORE_TOKEN: {}",
            match &self.blobstore_token {
                Some(t) if !t.is_empty() => preview(t),
                _ => "<not set>".to_string(),
            }
        );
        tracing::info!("  SOURCE_CONTAINER: {}", self.source_container);
        tracing::info!("  DEST_CONTAINER: {}", self.dest_container);
        tracing::info!("  WORKER_CONCURRENCY: {}", self.worker_concurrency);
        tracing::info!("  POLL_INTERVAL_SECS: {}", self.poll_interval_secs);
    }
}

fn parse_or<T: std::str::FromStr>(var: &str, default: T) -> T {
    std::env::var(var)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
