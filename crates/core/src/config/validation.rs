//! Checks applied to a loaded [`AppConfig`].

use crate::config::AppConfig;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

const MAX_BODY_BYTES: usize = 50 * 1024 * 1024;
const TIMEOUT_RANGE_MS: std::ops::RangeInclusive<u64> = 100..=300_000;

fn invalid(field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid { field: field.into(), reason: reason.into() }
}

fn require_absolute_path(field: &str, value: &str) -> Result<(), ConfigError> {
    if value.starts_with('/') { Ok(()) } else { Err(invalid(field, format!("must start with '/': {value:?}"))) }
}

impl AppConfig {
    /// Check a loaded configuration.
    ///
    /// # Errors
    ///
    /// `ConfigError::Invalid` naming the first offending field when:
    /// - `generation` or `cache_prefix` is empty
    /// - `origin` is not an absolute http(s) URL
    /// - a prefix or route does not start with `/`
    /// - `offline_route` is not listed in `shell_urls`
    /// - `max_bytes` is 0 or exceeds 50MB
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `user_agent` is empty
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.generation.trim().is_empty() {
            return Err(invalid("generation", "must not be empty"));
        }
        if self.cache_prefix.trim().is_empty() {
            return Err(invalid("cache_prefix", "must not be empty"));
        }

        self.origin_url()?;

        require_absolute_path("static_prefix", &self.static_prefix)?;
        require_absolute_path("image_prefix", &self.image_prefix)?;
        require_absolute_path("offline_route", &self.offline_route)?;
        require_absolute_path("root_route", &self.root_route)?;
        require_absolute_path("worker_script", &self.worker_script)?;
        require_absolute_path("worker_scope", &self.worker_scope)?;
        for prefix in &self.api_prefixes {
            require_absolute_path("api_prefixes", prefix)?;
        }
        for route in &self.shell_routes {
            require_absolute_path("shell_routes", route)?;
        }

        if !self.shell_urls.iter().any(|url| url == &self.offline_route) {
            return Err(invalid("shell_urls", format!("must include the offline route {:?}", self.offline_route)));
        }

        if !(1..=MAX_BODY_BYTES).contains(&self.max_bytes) {
            return Err(invalid("max_bytes", format!("must be between 1 and {MAX_BODY_BYTES}")));
        }
        if !TIMEOUT_RANGE_MS.contains(&self.timeout_ms) {
            return Err(invalid(
                "timeout_ms",
                format!("must be between {}ms and {}ms", TIMEOUT_RANGE_MS.start(), TIMEOUT_RANGE_MS.end()),
            ));
        }
        if self.user_agent.trim().is_empty() {
            return Err(invalid("user_agent", "must not be empty"));
        }

        if self.backend_hosts.is_empty() && self.api_prefixes.is_empty() {
            tracing::warn!(
                "Neither backend_hosts nor api_prefixes are set; \
                 API calls will be cached like ordinary assets"
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_default_config() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_empty_generation() {
        let config = AppConfig { generation: "  ".into(), ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "generation"));
    }

    #[test]
    fn test_validate_bad_origin() {
        let config = AppConfig { origin: "not a url".into(), ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "origin"));
    }

    #[test]
    fn test_validate_relative_static_prefix() {
        let config = AppConfig { static_prefix: "_next/static/".into(), ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "static_prefix"));
    }

    #[test]
    fn test_validate_offline_route_not_in_shell() {
        let config = AppConfig { shell_urls: vec!["/".into(), "/dashboard".into()], ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "shell_urls"));
    }

    #[test]
    fn test_validate_max_bytes_zero() {
        let config = AppConfig { max_bytes: 0, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "max_bytes"));
    }

    #[test]
    fn test_validate_max_bytes_too_large() {
        let config = AppConfig { max_bytes: MAX_BODY_BYTES + 1, ..Default::default() };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { field, .. }) if field == "max_bytes"));
    }

    #[test]
    fn test_validate_timeout_too_small() {
        let config = AppConfig { timeout_ms: 50, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "timeout_ms"));
    }

    #[test]
    fn test_validate_timeout_exceeds_limit() {
        let config = AppConfig { timeout_ms: 301_000, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "timeout_ms"));
    }

    #[test]
    fn test_validate_empty_user_agent() {
        let config = AppConfig { user_agent: String::new(), ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "user_agent"));
    }

    #[test]
    fn test_validate_no_api_rules_is_allowed() {
        let config = AppConfig { backend_hosts: Vec::new(), api_prefixes: Vec::new(), ..Default::default() };
        assert!(config.validate().is_ok());
    }
}
