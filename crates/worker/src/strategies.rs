//! Caching strategies.
//!
//! Each strategy always produces a response: network failures fall back to
//! the cache and then to a synthesized stand-in from [`crate::fallback`].
//! Cache writes are best-effort and never change what the page receives.

use std::sync::Arc;

use tillcache_client::Fetcher;
use tillcache_core::{CacheStore, Destination, Error, PartitionClass, Request, Response};
use tokio::task::JoinHandle;
use url::Url;

use crate::fallback;
use crate::router::Strategy;

/// Response for an intercepted request.
#[derive(Debug)]
pub struct Handled {
    pub response: Response,
    /// Background cache refresh still running after the response was produced.
    pub revalidation: Option<JoinHandle<()>>,
}

impl Handled {
    fn now(response: Response) -> Self {
        Self { response, revalidation: None }
    }
}

/// Strategy executor bound to one store and one network.
#[derive(Clone)]
pub struct Strategies {
    store: CacheStore,
    fetcher: Arc<dyn Fetcher>,
    offline_url: Url,
    root_url: Url,
}

impl Strategies {
    pub fn new(store: CacheStore, fetcher: Arc<dyn Fetcher>, offline_url: Url, root_url: Url) -> Self {
        Self { store, fetcher, offline_url, root_url }
    }

    /// Run `strategy` for `request`. `None` means the request is not intercepted.
    pub async fn execute(&self, strategy: Strategy, request: &Request) -> Option<Handled> {
        match strategy {
            Strategy::Passthrough => None,
            Strategy::NetworkOnly => Some(Handled::now(self.network_only(request).await)),
            Strategy::CacheFirst(class) => Some(Handled::now(self.cache_first(class, request).await)),
            Strategy::NetworkFirst => Some(Handled::now(self.network_first(request).await)),
            Strategy::StaleWhileRevalidate => Some(self.stale_while_revalidate(request).await),
        }
    }

    /// Network only; an unreachable network becomes the offline JSON error.
    pub async fn network_only(&self, request: &Request) -> Response {
        match self.fetcher.fetch(request).await {
            Ok(response) => response,
            Err(e) if e.is_network_failure() => {
                tracing::debug!(url = %request.url, "api unreachable: {e}");
                fallback::offline_api()
            }
            Err(e) => unusable(request, &e),
        }
    }

    /// Cache first, forever. A hit never touches the network.
    pub async fn cache_first(&self, class: PartitionClass, request: &Request) -> Response {
        let partition = match self.store.open(class).await {
            Ok(partition) => Some(partition),
            Err(e) => {
                tracing::warn!(%class, "partition unavailable: {e}");
                None
            }
        };

        if let Some(partition) = &partition
            && let Some(cached) = self.store.match_request(partition, request).await
        {
            tracing::debug!(url = %request.url, %class, "cache hit");
            return cached;
        }

        match self.fetcher.fetch(request).await {
            Ok(response) => {
                if let Some(partition) = &partition {
                    self.store.put(partition, request, &response).await;
                }
                response
            }
            Err(e) if !e.is_network_failure() => unusable(request, &e),
            Err(e) => {
                tracing::debug!(url = %request.url, %class, "cache miss and network failed: {e}");
                match class {
                    PartitionClass::Image => fallback::placeholder_image(),
                    _ => fallback::asset_unavailable(&request.url),
                }
            }
        }
    }

    /// Network first. The fresh copy is stored before it is returned.
    ///
    /// Offline order: this exact request, then the offline page, then the root page.
    pub async fn network_first(&self, request: &Request) -> Response {
        let error = match self.fetcher.fetch(request).await {
            Ok(response) => {
                self.store_best_effort(PartitionClass::Dynamic, request, &response).await;
                return response;
            }
            Err(e) if !e.is_network_failure() => return unusable(request, &e),
            Err(e) => e,
        };

        tracing::debug!(url = %request.url, "navigation offline: {error}");

        let candidates = [request.clone(), Request::navigate(self.offline_url.clone()), Request::navigate(self.root_url.clone())];
        for candidate in &candidates {
            if let Some(cached) = self.store.match_any(candidate).await {
                tracing::debug!(requested = %request.url, served = %candidate.url, "serving cached page");
                return cached;
            }
        }

        tracing::warn!(url = %request.url, "no cached page for offline navigation");
        fallback::offline_page()
    }

    /// Stale-while-revalidate. A cached copy is returned at once while a
    /// background fetch refreshes it; without one the network is awaited.
    pub async fn stale_while_revalidate(&self, request: &Request) -> Handled {
        let partition = self.store.open(PartitionClass::Dynamic).await.ok();
        let cached = match &partition {
            Some(partition) => self.store.match_request(partition, request).await,
            None => None,
        };

        if let Some(cached) = cached {
            let strategies = self.clone();
            let request = request.clone();
            let revalidation = tokio::spawn(async move { strategies.revalidate(&request).await });
            return Handled { response: cached, revalidation: Some(revalidation) };
        }

        match self.fetcher.fetch(request).await {
            Ok(response) => {
                self.store_best_effort(PartitionClass::Dynamic, request, &response).await;
                Handled::now(response)
            }
            Err(e) if !e.is_network_failure() => Handled::now(unusable(request, &e)),
            Err(e) => {
                tracing::debug!(url = %request.url, "asset unavailable: {e}");
                if request.destination == Destination::Image {
                    Handled::now(fallback::placeholder_image())
                } else {
                    Handled::now(fallback::empty_unavailable())
                }
            }
        }
    }

    async fn revalidate(&self, request: &Request) {
        match self.fetcher.fetch(request).await {
            Ok(response) => self.store_best_effort(PartitionClass::Dynamic, request, &response).await,
            Err(e) => tracing::debug!(url = %request.url, "background refresh failed: {e}"),
        }
    }

    async fn store_best_effort(&self, class: PartitionClass, request: &Request, response: &Response) {
        match self.store.open(class).await {
            Ok(partition) => {
                self.store.put(&partition, request, response).await;
            }
            Err(e) => tracing::warn!(%class, url = %request.url, "partition unavailable: {e}"),
        }
    }
}

/// A reachable upstream whose answer could not be used; not an offline case.
fn unusable(request: &Request, error: &Error) -> Response {
    tracing::warn!(url = %request.url, "upstream response unusable: {error}");
    fallback::upstream_error(error)
}
