//! Engine configuration.
//!
//! Values come from built-in defaults, then an optional TOML file named by
//! `TILLCACHE_CONFIG_FILE`, then `TILLCACHE_*` environment variables; later
//! layers win. List fields take TOML arrays or, from the environment, the
//! figment array syntax (`TILLCACHE_WARM_ROUTES='["/sales"]'`).

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// Everything the engine and the page coordinator are configured with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Build generation token embedded in every partition name.
    ///
    /// Bump on each deploy; partitions of other generations are deleted on activation.
    /// Set via TILLCACHE_GENERATION environment variable.
    #[serde(default = "default_generation")]
    pub generation: String,

    /// Prefix shared by all partition names.
    #[serde(default = "default_cache_prefix")]
    pub cache_prefix: String,

    /// Origin the application is served from. Relative URLs resolve against it.
    ///
    /// Set via TILLCACHE_ORIGIN environment variable.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Path to SQLite cache database.
    ///
    /// Set via TILLCACHE_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// User-Agent string for HTTP requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Maximum bytes to fetch per request.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// HTTP request timeout in milliseconds. A timed-out fetch counts as offline.
    ///
    /// Set via TILLCACHE_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Hosts of the hosted backend service. Requests to these (or their
    /// subdomains) are network-only.
    #[serde(default = "default_backend_hosts")]
    pub backend_hosts: Vec<String>,

    /// Path prefixes treated as API calls regardless of host.
    #[serde(default = "default_api_prefixes")]
    pub api_prefixes: Vec<String>,

    /// Path prefix of content-hashed build assets.
    #[serde(default = "default_static_prefix")]
    pub static_prefix: String,

    /// Path prefix of the image optimization endpoint.
    #[serde(default = "default_image_prefix")]
    pub image_prefix: String,

    /// App-shell URLs precached on install.
    #[serde(default = "default_shell_urls")]
    pub shell_urls: Vec<String>,

    /// Routes fetched once on install so their documents land in the dynamic partition.
    #[serde(default = "default_warm_routes")]
    pub warm_routes: Vec<String>,

    /// Offline fallback page. Must be part of `shell_urls`.
    #[serde(default = "default_offline_route")]
    pub offline_route: String,

    /// Root page, the last navigation fallback.
    #[serde(default = "default_root_route")]
    pub root_route: String,

    /// Pages that stay reachable offline; the page coordinator never redirects away from them.
    #[serde(default = "default_shell_routes")]
    pub shell_routes: Vec<String>,

    /// Whether a freshly installed worker activates without waiting for a
    /// `SKIP_WAITING` message.
    #[serde(default = "default_true")]
    pub skip_waiting_on_install: bool,

    /// URL of the worker script.
    #[serde(default = "default_worker_script")]
    pub worker_script: String,

    /// Scope the worker controls.
    #[serde(default = "default_worker_scope")]
    pub worker_scope: String,
}

fn default_generation() -> String {
    "v1".into()
}

fn default_cache_prefix() -> String {
    "tillcache".into()
}

fn default_origin() -> String {
    "http://localhost:3000".into()
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./tillcache.sqlite")
}

fn default_user_agent() -> String {
    "tillcache/0.1".into()
}

fn default_max_bytes() -> usize {
    10_485_760 // 10MB
}

fn default_timeout_ms() -> u64 {
    15_000
}

fn default_backend_hosts() -> Vec<String> {
    vec!["supabase.co".into()]
}

fn default_api_prefixes() -> Vec<String> {
    vec!["/api/".into(), "/rest/v1/".into(), "/auth/v1/".into(), "/storage/v1/".into()]
}

fn default_static_prefix() -> String {
    "/_next/static/".into()
}

fn default_image_prefix() -> String {
    "/_next/image".into()
}

fn default_shell_urls() -> Vec<String> {
    vec![
        "/".into(),
        "/offline".into(),
        "/dashboard".into(),
        "/invoices".into(),
        "/manifest.json".into(),
        "/icons/icon-192x192.png".into(),
        "/icons/icon-512x512.png".into(),
    ]
}

fn default_warm_routes() -> Vec<String> {
    vec!["/sales".into(), "/products".into()]
}

fn default_offline_route() -> String {
    "/offline".into()
}

fn default_root_route() -> String {
    "/".into()
}

fn default_shell_routes() -> Vec<String> {
    vec!["/".into(), "/offline".into(), "/dashboard".into(), "/invoices".into()]
}

fn default_true() -> bool {
    true
}

fn default_worker_script() -> String {
    "/sw.js".into()
}

fn default_worker_scope() -> String {
    "/".into()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            generation: default_generation(),
            cache_prefix: default_cache_prefix(),
            origin: default_origin(),
            db_path: default_db_path(),
            user_agent: default_user_agent(),
            max_bytes: default_max_bytes(),
            timeout_ms: default_timeout_ms(),
            backend_hosts: default_backend_hosts(),
            api_prefixes: default_api_prefixes(),
            static_prefix: default_static_prefix(),
            image_prefix: default_image_prefix(),
            shell_urls: default_shell_urls(),
            warm_routes: default_warm_routes(),
            offline_route: default_offline_route(),
            root_route: default_root_route(),
            shell_routes: default_shell_routes(),
            skip_waiting_on_install: true,
            worker_script: default_worker_script(),
            worker_scope: default_worker_scope(),
        }
    }
}

impl AppConfig {
    /// Network timeout; a fetch running longer counts as a network failure.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Parsed application origin.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if `origin` is not an absolute http(s) URL.
    pub fn origin_url(&self) -> Result<url::Url, ConfigError> {
        let parsed = url::Url::parse(&self.origin)
            .map_err(|e| ConfigError::Invalid { field: "origin".into(), reason: e.to_string() })?;
        match parsed.scheme() {
            "http" | "https" => Ok(parsed),
            scheme => Err(ConfigError::Invalid { field: "origin".into(), reason: format!("unsupported scheme: {scheme}") }),
        }
    }

    /// Load and validate the layered configuration.
    ///
    /// # Errors
    ///
    /// `ConfigError::LoadFailed` when a layer cannot be read or parsed, or
    /// the validation error of the merged result.
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("TILLCACHE_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("TILLCACHE_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
