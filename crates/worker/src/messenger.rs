//! Worker side of the page-to-worker message channel.
//!
//! Messages are fire-and-forget: nothing is sent back to the page, and any
//! page in the origin may post them.

use std::sync::Arc;

use tillcache_client::{Fetcher, resolve};
use tillcache_core::{CacheStore, Error, PartitionClass};
use url::Url;

use crate::precache::{PrecacheReport, precache_all};

/// Executes `CACHE_URLS` requests against the static partition.
pub struct Messenger {
    store: CacheStore,
    fetcher: Arc<dyn Fetcher>,
    origin: Url,
}

impl Messenger {
    pub fn new(store: CacheStore, fetcher: Arc<dyn Fetcher>, origin: Url) -> Self {
        Self { store, fetcher, origin }
    }

    /// Resolve, filter and cache `urls`.
    ///
    /// URLs that are not http(s) (or do not parse) are reported as failed
    /// without a fetch; the rest are added independently.
    pub async fn cache_urls(&self, urls: &[String]) -> Result<PrecacheReport, Error> {
        let mut rejected = Vec::new();
        let mut accepted = Vec::with_capacity(urls.len());
        for raw in urls {
            match resolve(&self.origin, raw) {
                Ok(url) if !accepted.contains(&url) => accepted.push(url),
                Ok(_) => {}
                Err(e) => {
                    tracing::debug!(url = %raw, "skipping url: {e}");
                    rejected.push((raw.clone(), e.to_string()));
                }
            }
        }

        let partition = self.store.open(PartitionClass::Static).await?;
        let mut report = precache_all(&self.store, self.fetcher.as_ref(), &partition, &accepted).await;
        report.failed.extend(rejected);

        tracing::debug!(
            requested = urls.len(),
            cached = report.cached.len(),
            failed = report.failed.len(),
            "handled CACHE_URLS"
        );
        Ok(report)
    }
}
