//! Scripted network and store fixtures for engine tests.

use std::collections::{HashMap, HashSet};
use std::time::Duration;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tillcache_client::Fetcher;
use tillcache_core::{AppConfig, CacheDb, CacheNames, CacheStore, Error, Request, Response};
use tokio::sync::Mutex;
use url::Url;

pub const ORIGIN: &str = "http://localhost:3000";

pub fn url(path: &str) -> Url {
    Url::parse(ORIGIN).unwrap().join(path).unwrap()
}

/// Fetcher answering from a fixed route table.
///
/// Unknown URLs answer 404; `set_offline(true)` makes every fetch reject.
#[derive(Default)]
pub struct MockFetcher {
    routes: Mutex<HashMap<String, Response>>,
    offline: AtomicBool,
    oversized: Mutex<HashSet<String>>,
    latency: Mutex<Option<Duration>>,
    calls: Mutex<Vec<String>>,
}

impl MockFetcher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub async fn route(&self, path: &str, response: Response) {
        self.routes.lock().await.insert(url(path).to_string(), response);
    }

    pub async fn route_text(&self, path: &str, content_type: &str, body: &str) {
        self.route(path, Response::new(200, body.to_string()).with_header("content-type", content_type)).await;
    }

    /// Answer `path` with a body-limit error, as a reachable but oversized upstream would.
    pub async fn oversized(&self, path: &str) {
        self.oversized.lock().await.insert(url(path).to_string());
    }

    /// Delay every fetch by `latency`.
    pub async fn set_latency(&self, latency: Duration) {
        *self.latency.lock().await = Some(latency);
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub async fn calls_to(&self, path: &str) -> usize {
        let target = url(path).to_string();
        self.calls.lock().await.iter().filter(|u| **u == target).count()
    }

    pub async fn total_calls(&self) -> usize {
        self.calls.lock().await.len()
    }
}

#[async_trait]
impl Fetcher for MockFetcher {
    async fn fetch(&self, request: &Request) -> Result<Response, Error> {
        let key = request.url.to_string();
        self.calls.lock().await.push(key.clone());
        let latency = *self.latency.lock().await;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        if self.offline.load(Ordering::SeqCst) {
            return Err(Error::Network(format!("offline: {key}")));
        }
        if self.oversized.lock().await.contains(&key) {
            return Err(Error::FetchTooLarge(format!("20000000 bytes exceeds 10485760 for {key}")));
        }
        let routes = self.routes.lock().await;
        Ok(routes
            .get(&key)
            .cloned()
            .map(|r| r.with_url(&request.url))
            .unwrap_or_else(|| Response::new(404, "not found").with_url(&request.url)))
    }
}

pub fn test_config() -> AppConfig {
    AppConfig { origin: ORIGIN.into(), generation: "v2".into(), ..Default::default() }
}

pub async fn test_store(config: &AppConfig) -> CacheStore {
    let db = CacheDb::open_in_memory().await.unwrap();
    CacheStore::new(db, CacheNames::from_config(config))
}
