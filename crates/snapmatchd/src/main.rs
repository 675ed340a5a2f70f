use anyhow::Result;
use snapmatch_cloud::{RekognitionVision, S3ObjectStore};
use snapmatch_store::SqliteEventRepository;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

mod config;
mod error;
mod http;
mod service;

use config::Config;
use service::EventService;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "snapmatchd starting");

    let config = Config::from_env()?;
    let sdk = snapmatch_cloud::load_sdk_config(config.region.clone()).await;

    let store = S3ObjectStore::from_conf(&sdk, config.bucket.as_str(), config.part_size);
    let vision = RekognitionVision::from_conf(&sdk, config.bucket.as_str());
    tracing::info!(bucket = %config.bucket, region = ?sdk.region(), "cloud clients configured");

    let events = SqliteEventRepository::open(&config.db_path).await?;

    let service = EventService::new(
        Arc::new(store),
        Arc::new(vision),
        Arc::new(events),
        config.settings(),
    );
    let app = http::router(Arc::new(service));

    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    tracing::info!(addr = %config.bind, "snapmatchd ready");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("snapmatchd shutting down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
