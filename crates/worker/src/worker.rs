//! The cache worker: routing, lifecycle and messages behind one handle.

use std::sync::Arc;

use async_trait::async_trait;
use tillcache_client::{Fetcher, RegistrationState, WorkerHandle, resolve};
use tillcache_core::{AppConfig, CacheStore, Error, Message, Request, Response};
use url::Url;

use crate::lifecycle::{InstallReport, LifecycleController, LifecycleState};
use crate::messenger::Messenger;
use crate::router::{RouteRules, classify};
use crate::script::script_response;
use crate::strategies::{Handled, Strategies};

pub struct ServiceWorker {
    rules: RouteRules,
    strategies: Strategies,
    lifecycle: LifecycleController,
    messenger: Messenger,
    store: CacheStore,
    script_url: String,
    scope: String,
}

fn resolve_all(origin: &Url, paths: &[String]) -> Result<Vec<Url>, Error> {
    paths
        .iter()
        .map(|path| resolve(origin, path).map_err(|e| Error::InvalidUrl(format!("{path}: {e}"))))
        .collect()
}

impl ServiceWorker {
    pub fn new(config: &AppConfig, store: CacheStore, fetcher: Arc<dyn Fetcher>) -> Result<Self, Error> {
        let origin = config.origin_url().map_err(|e| Error::InvalidUrl(e.to_string()))?;
        let shell_urls = resolve_all(&origin, &config.shell_urls)?;
        let warm_routes = resolve_all(&origin, &config.warm_routes)?;
        let offline_url = resolve(&origin, &config.offline_route).map_err(|e| Error::InvalidUrl(e.to_string()))?;
        let root_url = resolve(&origin, &config.root_route).map_err(|e| Error::InvalidUrl(e.to_string()))?;

        Ok(Self {
            rules: RouteRules::from_config(config),
            strategies: Strategies::new(store.clone(), fetcher.clone(), offline_url, root_url),
            lifecycle: LifecycleController::new(
                store.clone(),
                fetcher.clone(),
                shell_urls,
                warm_routes,
                config.static_prefix.clone(),
                config.skip_waiting_on_install,
            ),
            messenger: Messenger::new(store.clone(), fetcher, origin),
            store,
            script_url: config.worker_script.clone(),
            scope: config.worker_scope.clone(),
        })
    }

    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    pub async fn state(&self) -> LifecycleState {
        self.lifecycle.state().await
    }

    /// Install, then activate right away if skip-waiting was signalled.
    pub async fn start(&self) -> Result<InstallReport, Error> {
        let report = self.lifecycle.install().await?;
        if self.lifecycle.should_activate().await {
            self.lifecycle.activate().await?;
        }
        Ok(report)
    }

    /// Handle an intercepted request.
    ///
    /// Returns `None` when the request is not intercepted: either it is
    /// classified as pass-through or this worker does not control pages yet.
    pub async fn handle_fetch(&self, request: &Request) -> Option<Handled> {
        if self.lifecycle.state().await != LifecycleState::Active {
            return None;
        }
        let class = classify(request, &self.rules);
        tracing::debug!(method = %request.method, url = %request.url, ?class, "intercepted");
        self.strategies.execute(class.strategy(), request).await
    }

    /// Deliver a page message. Failures are logged, never reported back.
    pub async fn on_message(&self, message: Message) {
        match message {
            Message::SkipWaiting => {
                if self.lifecycle.skip_waiting().await
                    && let Err(e) = self.lifecycle.activate().await
                {
                    tracing::warn!("activation after SKIP_WAITING failed: {e}");
                }
            }
            Message::CacheUrls { urls } => {
                if let Err(e) = self.messenger.cache_urls(&urls).await {
                    tracing::warn!(count = urls.len(), "CACHE_URLS failed: {e}");
                }
            }
        }
    }

    /// The worker script response, with no-store and scope headers.
    pub fn script(&self, source: &str) -> Response {
        script_response(source.to_string(), &self.scope)
    }
}

#[async_trait]
impl WorkerHandle for ServiceWorker {
    async fn register(&self, script_url: &str, scope: &str) -> Result<RegistrationState, Error> {
        if script_url != self.script_url {
            return Err(Error::InvalidInput(format!("unknown worker script: {script_url}")));
        }
        if !scope.starts_with(&self.scope) {
            return Err(Error::InvalidInput(format!("scope {scope} outside allowed {}", self.scope)));
        }

        if self.lifecycle.state().await == LifecycleState::Parsed {
            self.start().await?;
        }

        Ok(match self.lifecycle.state().await {
            LifecycleState::Parsed | LifecycleState::Installing => RegistrationState::Installing,
            LifecycleState::Installed => RegistrationState::Waiting,
            LifecycleState::Activating | LifecycleState::Active => RegistrationState::Active,
        })
    }

    async fn post_message(&self, message: Message) -> Result<(), Error> {
        self.on_message(message).await;
        Ok(())
    }
}
