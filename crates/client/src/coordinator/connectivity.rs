//! Connectivity state machine for the page context.
//!
//! Going offline on a page that is not part of the app shell redirects to the
//! offline fallback route. Coming back online never navigates; the user
//! retries or moves on manually.

use serde::{Deserialize, Serialize};

/// Browser connectivity event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectivityEvent {
    Online,
    Offline,
}

/// What the page should do after an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
    Stay,
    Redirect(String),
}

/// Tracks online/offline transitions for one page context.
#[derive(Debug, Clone)]
pub struct ConnectivityMonitor {
    online: bool,
    offline_route: String,
    shell_routes: Vec<String>,
}

impl ConnectivityMonitor {
    /// Start in the online state.
    pub fn new(offline_route: impl Into<String>, shell_routes: Vec<String>) -> Self {
        Self { online: true, offline_route: offline_route.into(), shell_routes }
    }

    pub fn is_online(&self) -> bool {
        self.online
    }

    /// Whether `path` must stay reachable offline.
    pub fn is_shell_route(&self, path: &str) -> bool {
        let path = normalize(path);
        path == normalize(&self.offline_route) || self.shell_routes.iter().any(|route| normalize(route) == path)
    }

    /// Apply an event observed while the page shows `current_path`.
    pub fn on_event(&mut self, event: ConnectivityEvent, current_path: &str) -> Navigation {
        match event {
            ConnectivityEvent::Online => {
                if !self.online {
                    tracing::info!(path = current_path, "connection restored");
                }
                self.online = true;
                Navigation::Stay
            }
            ConnectivityEvent::Offline => {
                let was_online = std::mem::replace(&mut self.online, false);
                if !was_online || self.is_shell_route(current_path) {
                    return Navigation::Stay;
                }
                tracing::info!(path = current_path, to = %self.offline_route, "offline, redirecting to fallback");
                Navigation::Redirect(self.offline_route.clone())
            }
        }
    }
}

/// Strip query, fragment and trailing slash so `/invoices/` and `/invoices?x=1` match `/invoices`.
fn normalize(path: &str) -> &str {
    let end = path.find(['?', '#']).unwrap_or(path.len());
    let path = &path[..end];
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() { "/" } else { trimmed }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn monitor() -> ConnectivityMonitor {
        ConnectivityMonitor::new("/offline", vec!["/".into(), "/dashboard".into(), "/invoices".into()])
    }

    #[test]
    fn test_offline_redirects_from_non_shell_page() {
        let mut monitor = monitor();
        let nav = monitor.on_event(ConnectivityEvent::Offline, "/products/42");
        assert_eq!(nav, Navigation::Redirect("/offline".into()));
        assert!(!monitor.is_online());
    }

    #[test]
    fn test_offline_stays_on_shell_page() {
        let mut monitor = monitor();
        assert_eq!(monitor.on_event(ConnectivityEvent::Offline, "/invoices/"), Navigation::Stay);
        assert_eq!(monitor.clone().on_event(ConnectivityEvent::Offline, "/dashboard?tab=sales"), Navigation::Stay);
    }

    #[test]
    fn test_offline_route_itself_is_allowed() {
        let mut monitor = ConnectivityMonitor::new("/offline", Vec::new());
        assert_eq!(monitor.on_event(ConnectivityEvent::Offline, "/offline"), Navigation::Stay);
    }

    #[test]
    fn test_repeated_offline_only_redirects_once() {
        let mut monitor = monitor();
        assert!(matches!(monitor.on_event(ConnectivityEvent::Offline, "/credits"), Navigation::Redirect(_)));
        assert_eq!(monitor.on_event(ConnectivityEvent::Offline, "/credits"), Navigation::Stay);
    }

    #[test]
    fn test_reconnect_never_navigates() {
        let mut monitor = monitor();
        monitor.on_event(ConnectivityEvent::Offline, "/credits");
        assert_eq!(monitor.on_event(ConnectivityEvent::Online, "/offline"), Navigation::Stay);
        assert!(monitor.is_online());

        // A fresh drop after reconnecting is a new transition.
        assert!(matches!(monitor.on_event(ConnectivityEvent::Offline, "/credits"), Navigation::Redirect(_)));
    }

    #[test]
    fn test_root_matching() {
        let monitor = monitor();
        assert!(monitor.is_shell_route("/"));
        assert!(monitor.is_shell_route("/?utm=x"));
        assert!(!monitor.is_shell_route("/employees"));
    }
}
