use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use sqlx::PgPool;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use blobstore_client::BlobClient;
use photoflow_core::AppConfig;
use photoflow_engine::Runtime;
use photoflow_store::{migrate, PgInstanceStore};
use photoflow_worker::{GatewayObjectStore, JpegCodec, ResizeActivity};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("photoflow=info".parse()?))
        .init();

    info!("Photoflow worker starting...");

    // Load config
    let config = AppConfig::from_env()?;

    // Connect to Postgres and run migrations
    let pool = PgPool::connect(&config.database_url).await?;
    migrate(&pool).await?;
    let store = PgInstanceStore::new(pool);

    // Wire up the activity executor
    let blobs = Arc::new(GatewayObjectStore::new(BlobClient::new(
        &config.blobstore_url,
        config.blobstore_token.as_deref(),
    )));
    let activity = Arc::new(ResizeActivity::new(
        blobs,
        Arc::new(JpegCodec),
        &config.source_container,
        &config.dest_container,
    ));

    let runtime = Runtime::new(store, activity)
        .with_concurrency(config.worker_concurrency)
        .with_retries(config.activity_retries, Duration::from_secs(2));

    let poll_interval = Duration::from_secs(config.poll_interval_secs);
    info!(
        interval_secs = config.poll_interval_secs,
        "entering poll loop"
    );

    loop {
        match runtime_pass(&runtime).await {
            Ok(0) => {}
            Ok(n) => info!(instances = n, "poll pass finished"),
            Err(e) => error!("poll pass failed: {e:#}"),
        }
        tokio::time::sleep(poll_interval).await;
    }
}

/// Drive every runnable instance to completion once. Divergence and store
/// failures on one instance don't stall the others.
async fn runtime_pass(runtime: &Runtime<PgInstanceStore>) -> Result<usize> {
    let ids = runtime.list_runnable(64).await?;
    let count = ids.len();
    for instance_id in ids {
        if let Err(e) = runtime.run_to_completion(instance_id).await {
            error!(%instance_id, "instance failed to run: {e}");
        }
    }
    Ok(count)
}
