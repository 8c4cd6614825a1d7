//! Worker lifecycle: install, activate, takeover.
//!
//! `Parsed → Installing → Installed → Activating → Active`. A worker sitting
//! in `Installed` without a skip-waiting signal is "waiting".

use std::sync::Arc;

use futures_util::future::join_all;
use serde::Serialize;
use tillcache_client::{Fetcher, scan_build_assets};
use tillcache_core::{CacheStore, Error, PartitionClass, Request, Response};
use tokio::sync::RwLock;
use url::Url;

use crate::precache::precache_all;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleState {
    Parsed,
    Installing,
    Installed,
    Activating,
    Active,
}

/// Outcome of the install step.
#[derive(Debug, Clone, Default, Serialize)]
pub struct InstallReport {
    pub cached: Vec<String>,
    pub failed: Vec<(String, String)>,
    pub warmed: Vec<String>,
    /// Build chunks referenced by warmed routes, cached in the static partition.
    pub warmed_assets: Vec<String>,
}

#[derive(Debug)]
struct Status {
    state: LifecycleState,
    skip_waiting: bool,
    clients_claimed: bool,
}

pub struct LifecycleController {
    store: CacheStore,
    fetcher: Arc<dyn Fetcher>,
    shell_urls: Vec<Url>,
    warm_routes: Vec<Url>,
    static_prefix: String,
    skip_waiting_on_install: bool,
    status: RwLock<Status>,
}

impl LifecycleController {
    pub fn new(
        store: CacheStore, fetcher: Arc<dyn Fetcher>, shell_urls: Vec<Url>, warm_routes: Vec<Url>,
        static_prefix: String, skip_waiting_on_install: bool,
    ) -> Self {
        Self {
            store,
            fetcher,
            shell_urls,
            warm_routes,
            static_prefix,
            skip_waiting_on_install,
            status: RwLock::new(Status {
                state: LifecycleState::Parsed,
                skip_waiting: false,
                clients_claimed: false,
            }),
        }
    }

    pub async fn state(&self) -> LifecycleState {
        self.status.read().await.state
    }

    pub async fn clients_claimed(&self) -> bool {
        self.status.read().await.clients_claimed
    }

    /// Whether an installed worker should move on to activation now.
    pub async fn should_activate(&self) -> bool {
        let status = self.status.read().await;
        status.state == LifecycleState::Installed && status.skip_waiting
    }

    /// Seed the shell partition and warm routes.
    ///
    /// Individual URL failures are logged and reported, never fatal; only a
    /// storage failure opening the shell partition aborts the install.
    pub async fn install(&self) -> Result<InstallReport, Error> {
        self.transition(LifecycleState::Parsed, LifecycleState::Installing).await?;
        tracing::info!(generation = self.store.names().generation(), "installing");

        let shell = match self.store.open(PartitionClass::Shell).await {
            Ok(shell) => shell,
            Err(e) => {
                self.status.write().await.state = LifecycleState::Parsed;
                return Err(e);
            }
        };

        let precached = precache_all(&self.store, self.fetcher.as_ref(), &shell, &self.shell_urls).await;
        let (warmed, warmed_assets) = self.warm_routes().await;

        if self.skip_waiting_on_install {
            self.skip_waiting().await;
        }
        self.status.write().await.state = LifecycleState::Installed;

        tracing::info!(
            cached = precached.cached.len(),
            failed = precached.failed.len(),
            warmed = warmed.len(),
            warmed_assets = warmed_assets.len(),
            "installed"
        );

        Ok(InstallReport { cached: precached.cached, failed: precached.failed, warmed, warmed_assets })
    }

    /// Fetch each warm route once and keep successful documents in the
    /// dynamic partition, then cache the build chunks those documents load.
    ///
    /// Returns the warmed routes and the cached chunk URLs.
    async fn warm_routes(&self) -> (Vec<String>, Vec<String>) {
        if self.warm_routes.is_empty() {
            return (Vec::new(), Vec::new());
        }
        let dynamic = match self.store.open(PartitionClass::Dynamic).await {
            Ok(partition) => partition,
            Err(e) => {
                tracing::warn!("skipping route warm-up: {e}");
                return (Vec::new(), Vec::new());
            }
        };

        let results = join_all(self.warm_routes.iter().map(|route| {
            let dynamic = &dynamic;
            async move {
                let request = Request::navigate(route.clone());
                let response = match self.fetcher.fetch(&request).await {
                    Ok(response) => response,
                    Err(e) => {
                        tracing::debug!(url = %route, "warm-up failed: {e}");
                        return None;
                    }
                };
                if !self.store.put(dynamic, &request, &response).await {
                    tracing::debug!(url = %route, status = response.status, "warm-up not cached");
                    return None;
                }
                let chunks = if is_html(&response) {
                    scan_build_assets(&response.text(), route, &self.static_prefix)
                } else {
                    Vec::new()
                };
                Some((route.to_string(), chunks))
            }
        }))
        .await;

        let mut warmed = Vec::new();
        let mut chunks: Vec<Url> = Vec::new();
        for (route, found) in results.into_iter().flatten() {
            warmed.push(route);
            for chunk in found {
                if !chunks.contains(&chunk) {
                    chunks.push(chunk);
                }
            }
        }
        if chunks.is_empty() {
            return (warmed, Vec::new());
        }

        // Chunks go where hashed-asset requests are served from.
        let assets = match self.store.open(PartitionClass::Static).await {
            Ok(partition) => precache_all(&self.store, self.fetcher.as_ref(), &partition, &chunks).await.cached,
            Err(e) => {
                tracing::warn!("skipping warm-up chunks: {e}");
                Vec::new()
            }
        };
        (warmed, assets)
    }

    /// Drop partitions of other generations and take control of open clients.
    ///
    /// Returns the number of deleted partitions.
    pub async fn activate(&self) -> Result<u64, Error> {
        self.transition(LifecycleState::Installed, LifecycleState::Activating).await?;
        tracing::info!(generation = self.store.names().generation(), "activating");

        let deleted = match self.store.delete_stale_generations(&self.store.names().all()).await {
            Ok(deleted) => deleted,
            Err(e) => {
                self.status.write().await.state = LifecycleState::Installed;
                return Err(e);
            }
        };

        self.claim_clients().await;
        self.status.write().await.state = LifecycleState::Active;
        tracing::info!(deleted, "active");
        Ok(deleted)
    }

    /// Record a skip-waiting signal.
    ///
    /// Returns true when the worker is installed and should activate now.
    pub async fn skip_waiting(&self) -> bool {
        let mut status = self.status.write().await;
        status.skip_waiting = true;
        status.state == LifecycleState::Installed
    }

    async fn claim_clients(&self) {
        self.status.write().await.clients_claimed = true;
        tracing::debug!("claimed open clients");
    }

    async fn transition(&self, from: LifecycleState, to: LifecycleState) -> Result<(), Error> {
        let mut status = self.status.write().await;
        if status.state != from {
            return Err(Error::InvalidState(format!("cannot move to {to:?} from {:?}", status.state)));
        }
        status.state = to;
        Ok(())
    }
}

fn is_html(response: &Response) -> bool {
    response.content_type().is_some_and(|ct| ct.starts_with("text/html"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{MockFetcher, test_config, test_store, url};
    use tillcache_core::CacheNames;

    async fn controller(
        store: &CacheStore, fetcher: &Arc<MockFetcher>, shell: &[&str], skip: bool,
    ) -> LifecycleController {
        let shell_urls = shell.iter().copied().map(url).collect();
        LifecycleController::new(
            store.clone(),
            fetcher.clone(),
            shell_urls,
            vec![url("/sales")],
            "/_next/static/".into(),
            skip,
        )
    }

    #[tokio::test]
    async fn test_install_tolerates_missing_shell_asset() {
        let config = test_config();
        let store = test_store(&config).await;
        let fetcher = MockFetcher::new();
        fetcher.route_text("/", "text/html", "home").await;
        fetcher.route_text("/offline", "text/html", "offline").await;
        let lifecycle = controller(&store, &fetcher, &["/", "/offline", "/missing-404"], true).await;

        let report = lifecycle.install().await.unwrap();

        assert_eq!(report.cached.len(), 2);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(lifecycle.state().await, LifecycleState::Installed);
        assert!(lifecycle.should_activate().await);

        let shell = store.open(PartitionClass::Shell).await.unwrap();
        assert_eq!(store.match_request(&shell, &Request::get(url("/"))).await.unwrap().text(), "home");
        assert_eq!(store.match_request(&shell, &Request::get(url("/offline"))).await.unwrap().text(), "offline");
    }

    #[tokio::test]
    async fn test_install_fully_offline_still_installs() {
        let config = test_config();
        let store = test_store(&config).await;
        let fetcher = MockFetcher::new();
        fetcher.set_offline(true);
        let lifecycle = controller(&store, &fetcher, &["/", "/offline"], true).await;

        let report = lifecycle.install().await.unwrap();

        assert!(report.cached.is_empty());
        assert_eq!(report.failed.len(), 2);
        assert!(report.warmed.is_empty());
        assert_eq!(lifecycle.state().await, LifecycleState::Installed);
    }

    #[tokio::test]
    async fn test_install_warms_routes_into_dynamic_partition() {
        let config = test_config();
        let store = test_store(&config).await;
        let fetcher = MockFetcher::new();
        fetcher.route_text("/sales", "text/html", "sales").await;
        let lifecycle = controller(&store, &fetcher, &[], true).await;

        let report = lifecycle.install().await.unwrap();

        assert_eq!(report.warmed, vec![url("/sales").to_string()]);
        let dynamic = store.open(PartitionClass::Dynamic).await.unwrap();
        assert!(store.match_request(&dynamic, &Request::navigate(url("/sales"))).await.is_some());
    }

    #[tokio::test]
    async fn test_install_warms_chunks_of_warm_routes() {
        let config = test_config();
        let store = test_store(&config).await;
        let fetcher = MockFetcher::new();
        let html = r#"<script src="/_next/static/chunks/sales-3f.js"></script>
            <link rel="stylesheet" href="/_next/static/css/sales-9a.css">
            <script src="/_next/static/chunks/missing-00.js"></script>"#;
        fetcher.route_text("/sales", "text/html; charset=utf-8", html).await;
        fetcher.route_text("/_next/static/chunks/sales-3f.js", "application/javascript", "sales()").await;
        fetcher.route_text("/_next/static/css/sales-9a.css", "text/css", "body{}").await;
        let lifecycle = controller(&store, &fetcher, &[], true).await;

        let report = lifecycle.install().await.unwrap();

        assert_eq!(report.warmed_assets.len(), 2);
        let statics = store.open(PartitionClass::Static).await.unwrap();
        let chunk = store.match_request(&statics, &Request::get(url("/_next/static/chunks/sales-3f.js"))).await;
        assert_eq!(chunk.unwrap().text(), "sales()");
        assert_eq!(fetcher.calls_to("/_next/static/chunks/sales-3f.js").await, 1);
    }

    #[tokio::test]
    async fn test_install_twice_is_rejected() {
        let config = test_config();
        let store = test_store(&config).await;
        let fetcher = MockFetcher::new();
        let lifecycle = controller(&store, &fetcher, &[], true).await;

        lifecycle.install().await.unwrap();
        assert!(matches!(lifecycle.install().await, Err(Error::InvalidState(_))));
    }

    #[tokio::test]
    async fn test_waiting_until_skip_waiting() {
        let config = test_config();
        let store = test_store(&config).await;
        let fetcher = MockFetcher::new();
        let lifecycle = controller(&store, &fetcher, &[], false).await;

        lifecycle.install().await.unwrap();
        assert!(!lifecycle.should_activate().await);

        assert!(lifecycle.skip_waiting().await);
        assert!(lifecycle.should_activate().await);
    }

    #[tokio::test]
    async fn test_activate_before_install_is_rejected() {
        let config = test_config();
        let store = test_store(&config).await;
        let fetcher = MockFetcher::new();
        let lifecycle = controller(&store, &fetcher, &[], true).await;

        assert!(matches!(lifecycle.activate().await, Err(Error::InvalidState(_))));
        assert_eq!(lifecycle.state().await, LifecycleState::Parsed);
    }

    #[tokio::test]
    async fn test_activate_deletes_old_generations_and_claims() {
        let config = test_config();
        let store = test_store(&config).await;
        let previous = CacheStore::new(store.db().clone(), CacheNames::new(config.cache_prefix.clone(), "v1"));
        let old_static = previous.open(PartitionClass::Static).await.unwrap();
        previous
            .put(&old_static, &Request::get(url("/_next/static/old.js")), &Response::new(200, "old"))
            .await;
        previous.open(PartitionClass::Shell).await.unwrap();
        let fetcher = MockFetcher::new();
        let lifecycle = controller(&store, &fetcher, &[], true).await;

        lifecycle.install().await.unwrap();
        let deleted = lifecycle.activate().await.unwrap();

        assert_eq!(deleted, 2);
        assert_eq!(lifecycle.state().await, LifecycleState::Active);
        assert!(lifecycle.clients_claimed().await);
        let current = store.names().all();
        assert!(store.partition_names().await.unwrap().iter().all(|name| current.contains(name)));
    }
}
