//! tillcache worker host entry point.
//!
//! Boots the cache engine and serves the line protocol on stdio.
//! Logging goes to stderr so stdout carries only protocol replies.

use std::sync::Arc;

use anyhow::Result;
use tillcache_client::{Coordinator, FetchClient, FetchConfig};
use tillcache_core::{AppConfig, CacheDb, CacheNames, CacheStore};
use tillcache_worker::ServiceWorker;
use tillcache_worker::host::Host;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    tracing::info!(generation = %config.generation, db = %config.db_path.display(), "starting tillcache worker");

    let db = CacheDb::open(&config.db_path).await?;
    let store = CacheStore::new(db, CacheNames::from_config(&config));
    let fetcher = Arc::new(FetchClient::new(FetchConfig::from_app_config(&config))?);
    let worker = Arc::new(ServiceWorker::new(&config, store, fetcher)?);

    let coordinator = Coordinator::new(&config);
    let state = coordinator.register(worker.as_ref()).await?;
    tracing::info!(?state, "worker registered");

    let host = Host::new(worker, coordinator, config.origin_url()?);
    host.run(tokio::io::BufReader::new(tokio::io::stdin()), tokio::io::stdout()).await?;

    Ok(())
}
