//! Best-effort bulk caching with per-URL failure isolation.

use futures_util::future::join_all;
use serde::Serialize;
use tillcache_client::Fetcher;
use tillcache_core::{CachePartition, CacheStore, Error, Request};
use url::Url;

/// Outcome of a bulk add.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PrecacheReport {
    pub cached: Vec<String>,
    /// `(url, reason)` for every URL that could not be cached.
    pub failed: Vec<(String, String)>,
}

impl PrecacheReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Fetch `url` and store it; anything but a stored `200` is an error.
pub async fn cache_add(store: &CacheStore, fetcher: &dyn Fetcher, partition: &CachePartition, url: &Url) -> Result<(), Error> {
    let request = Request::get(url.clone());
    let response = fetcher.fetch(&request).await?;
    if !response.is_ok() {
        return Err(Error::HttpError(format!("status {} for {url}", response.status)));
    }
    if store.put(partition, &request, &response).await {
        Ok(())
    } else {
        Err(Error::CacheWrite(url.to_string()))
    }
}

/// Add every URL concurrently. One failure never affects the others.
pub async fn precache_all(
    store: &CacheStore, fetcher: &dyn Fetcher, partition: &CachePartition, urls: &[Url],
) -> PrecacheReport {
    let results = join_all(urls.iter().map(|url| async move { (url, cache_add(store, fetcher, partition, url).await) })).await;

    let mut report = PrecacheReport::default();
    for (url, result) in results {
        match result {
            Ok(()) => report.cached.push(url.to_string()),
            Err(e) => {
                tracing::warn!(partition = %partition.name, url = %url, "precache failed: {e}");
                report.failed.push((url.to_string(), e.to_string()));
            }
        }
    }
    report
}
