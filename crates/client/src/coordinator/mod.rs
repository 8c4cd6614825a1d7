//! Page-side coordination with the cache worker.
//!
//! The coordinator runs in a page context. It registers the worker script,
//! promotes a waiting worker, tracks connectivity, and on every page load
//! pushes the build assets the page references into the worker's static
//! partition. The push covers pages that were served before a deploy and
//! would otherwise never make the worker fetch the new assets.

pub mod assets;
pub mod connectivity;

pub use assets::scan_build_assets;
pub use connectivity::{ConnectivityEvent, ConnectivityMonitor, Navigation};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tillcache_core::{AppConfig, Error, Message};
use url::Url;

/// State of the worker after a registration call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegistrationState {
    /// Worker still installing.
    Installing,
    /// Installed but waiting for older clients to go away.
    Waiting,
    /// Active and controlling the scope.
    Active,
}

/// Page-side view of the worker.
#[async_trait]
pub trait WorkerHandle: Send + Sync {
    /// Register (or re-register) the worker script for `scope`.
    async fn register(&self, script_url: &str, scope: &str) -> Result<RegistrationState, Error>;

    /// Post a fire-and-forget message to the worker.
    async fn post_message(&self, message: Message) -> Result<(), Error>;
}

/// Page-context coordinator.
#[derive(Debug, Clone)]
pub struct Coordinator {
    worker_script: String,
    worker_scope: String,
    static_prefix: String,
    connectivity: ConnectivityMonitor,
}

impl Coordinator {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            worker_script: config.worker_script.clone(),
            worker_scope: config.worker_scope.clone(),
            static_prefix: config.static_prefix.clone(),
            connectivity: ConnectivityMonitor::new(config.offline_route.clone(), config.shell_routes.clone()),
        }
    }

    /// Register the worker; a waiting worker is told to skip waiting.
    pub async fn register(&self, worker: &dyn WorkerHandle) -> Result<RegistrationState, Error> {
        let state = worker.register(&self.worker_script, &self.worker_scope).await?;
        tracing::info!(script = %self.worker_script, scope = %self.worker_scope, ?state, "worker registered");

        if state == RegistrationState::Waiting {
            worker.post_message(Message::SkipWaiting).await?;
        }

        Ok(state)
    }

    /// Push the build assets referenced by a freshly loaded page to the worker.
    ///
    /// Returns the number of URLs pushed; nothing is posted when the page
    /// references no build assets.
    pub async fn on_page_load(&self, html: &str, page_url: &Url, worker: &dyn WorkerHandle) -> Result<usize, Error> {
        let urls: Vec<String> = scan_build_assets(html, page_url, &self.static_prefix)
            .into_iter()
            .map(String::from)
            .collect();

        if urls.is_empty() {
            tracing::debug!(page = %page_url, "no build assets referenced");
            return Ok(0);
        }

        let count = urls.len();
        worker.post_message(Message::CacheUrls { urls }).await?;
        tracing::debug!(page = %page_url, count, "pushed build assets to worker");
        Ok(count)
    }

    /// Feed a connectivity event observed on `current_path`.
    pub fn on_connectivity(&mut self, event: ConnectivityEvent, current_path: &str) -> Navigation {
        self.connectivity.on_event(event, current_path)
    }

    pub fn connectivity(&self) -> &ConnectivityMonitor {
        &self.connectivity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::Mutex;

    struct RecordingWorker {
        state: RegistrationState,
        registrations: Mutex<Vec<(String, String)>>,
        messages: Mutex<Vec<Message>>,
    }

    impl RecordingWorker {
        fn new(state: RegistrationState) -> Self {
            Self { state, registrations: Mutex::new(Vec::new()), messages: Mutex::new(Vec::new()) }
        }
    }

    #[async_trait]
    impl WorkerHandle for RecordingWorker {
        async fn register(&self, script_url: &str, scope: &str) -> Result<RegistrationState, Error> {
            self.registrations.lock().await.push((script_url.to_string(), scope.to_string()));
            Ok(self.state)
        }

        async fn post_message(&self, message: Message) -> Result<(), Error> {
            self.messages.lock().await.push(message);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_register_uses_configured_script_and_scope() {
        let coordinator = Coordinator::new(&AppConfig::default());
        let worker = RecordingWorker::new(RegistrationState::Active);

        let state = coordinator.register(&worker).await.unwrap();

        assert_eq!(state, RegistrationState::Active);
        assert_eq!(*worker.registrations.lock().await, vec![("/sw.js".to_string(), "/".to_string())]);
        assert!(worker.messages.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_register_promotes_waiting_worker() {
        let coordinator = Coordinator::new(&AppConfig::default());
        let worker = RecordingWorker::new(RegistrationState::Waiting);

        coordinator.register(&worker).await.unwrap();

        assert_eq!(*worker.messages.lock().await, vec![Message::SkipWaiting]);
    }

    #[tokio::test]
    async fn test_page_load_pushes_assets() {
        let coordinator = Coordinator::new(&AppConfig::default());
        let worker = RecordingWorker::new(RegistrationState::Active);
        let html = r#"<script src="/_next/static/chunks/main-1.js"></script>
                      <link rel="stylesheet" href="/_next/static/css/app-2.css">"#;
        let page = Url::parse("http://localhost:3000/sales").unwrap();

        let pushed = coordinator.on_page_load(html, &page, &worker).await.unwrap();

        assert_eq!(pushed, 2);
        assert_eq!(
            *worker.messages.lock().await,
            vec![Message::CacheUrls {
                urls: vec![
                    "http://localhost:3000/_next/static/chunks/main-1.js".into(),
                    "http://localhost:3000/_next/static/css/app-2.css".into(),
                ]
            }]
        );
    }

    #[tokio::test]
    async fn test_page_load_without_assets_posts_nothing() {
        let coordinator = Coordinator::new(&AppConfig::default());
        let worker = RecordingWorker::new(RegistrationState::Active);
        let page = Url::parse("http://localhost:3000/offline").unwrap();

        let pushed = coordinator.on_page_load("<p>offline</p>", &page, &worker).await.unwrap();

        assert_eq!(pushed, 0);
        assert!(worker.messages.lock().await.is_empty());
    }

    #[test]
    fn test_connectivity_uses_configured_routes() {
        let mut coordinator = Coordinator::new(&AppConfig::default());
        assert_eq!(coordinator.on_connectivity(ConnectivityEvent::Offline, "/dashboard"), Navigation::Stay);
        coordinator.on_connectivity(ConnectivityEvent::Online, "/dashboard");
        assert_eq!(
            coordinator.on_connectivity(ConnectivityEvent::Offline, "/employees"),
            Navigation::Redirect("/offline".into())
        );
    }
}
