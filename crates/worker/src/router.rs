//! Request classification.
//!
//! [`classify`] is pure: it looks only at the request and the configured
//! URL rules. Checks run in a fixed priority order and the first match wins,
//! so an API URL under the static prefix is still an API call.

use serde::Serialize;
use tillcache_core::http::is_cacheable_scheme;
use tillcache_core::{AppConfig, PartitionClass, Request};

/// URL rules used to classify requests.
#[derive(Debug, Clone)]
pub struct RouteRules {
    pub backend_hosts: Vec<String>,
    pub api_prefixes: Vec<String>,
    pub static_prefix: String,
    pub image_prefix: String,
}

impl RouteRules {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            backend_hosts: config.backend_hosts.iter().map(|h| h.to_ascii_lowercase()).collect(),
            api_prefixes: config.api_prefixes.clone(),
            static_prefix: config.static_prefix.clone(),
            image_prefix: config.image_prefix.clone(),
        }
    }

    fn is_backend_host(&self, host: &str) -> bool {
        self.backend_hosts
            .iter()
            .any(|backend| host == backend || host.strip_suffix(backend.as_str()).is_some_and(|rest| rest.ends_with('.')))
    }

    fn is_api_path(&self, path: &str) -> bool {
        self.api_prefixes.iter().any(|prefix| path.starts_with(prefix.as_str()))
    }
}

/// Classification tag of an intercepted request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RequestClass {
    /// Not intercepted: non-GET or non-http(s).
    Bypass,
    ExternalApi,
    HashedAsset,
    ImageAsset,
    Navigation,
    StaticAsset,
}

/// How a request is served.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Passthrough,
    NetworkOnly,
    CacheFirst(PartitionClass),
    NetworkFirst,
    StaleWhileRevalidate,
}

impl RequestClass {
    pub fn strategy(&self) -> Strategy {
        match self {
            RequestClass::Bypass => Strategy::Passthrough,
            RequestClass::ExternalApi => Strategy::NetworkOnly,
            RequestClass::HashedAsset => Strategy::CacheFirst(PartitionClass::Static),
            RequestClass::ImageAsset => Strategy::CacheFirst(PartitionClass::Image),
            RequestClass::Navigation => Strategy::NetworkFirst,
            RequestClass::StaticAsset => Strategy::StaleWhileRevalidate,
        }
    }
}

/// Classify a request.
pub fn classify(request: &Request, rules: &RouteRules) -> RequestClass {
    if !request.is_get() || !is_cacheable_scheme(&request.url) {
        return RequestClass::Bypass;
    }

    let path = request.url.path();
    let host = request.url.host_str().unwrap_or_default().to_ascii_lowercase();

    if rules.is_backend_host(&host) || rules.is_api_path(path) {
        RequestClass::ExternalApi
    } else if path.starts_with(&rules.static_prefix) {
        RequestClass::HashedAsset
    } else if path.starts_with(&rules.image_prefix) {
        RequestClass::ImageAsset
    } else if request.is_navigation() {
        RequestClass::Navigation
    } else {
        RequestClass::StaticAsset
    }
}
