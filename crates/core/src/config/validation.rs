//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },

    #[error("missing required configuration: {field} ({hint})")]
    Missing { field: String, hint: String },
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `cache_version` or `user_agent` is empty
    /// - `origin` is not a bare http(s) origin
    /// - a static asset path does not start with a single `/`
    /// - a bypass domain is blank
    /// - a bypass extension does not start with `.` or is only `.`
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache_version.trim().is_empty() {
            return Err(ConfigError::Invalid { field: "cache_version".into(), reason: "must not be empty".into() });
        }

        let origin = url::Url::parse(&self.origin)
            .map_err(|e| ConfigError::Invalid { field: "origin".into(), reason: e.to_string() })?;
        if !matches!(origin.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid { field: "origin".into(), reason: "scheme must be http or https".into() });
        }
        if origin.path() != "/" || origin.query().is_some() {
            return Err(ConfigError::Invalid {
                field: "origin".into(),
                reason: "must not carry a path or query".into(),
            });
        }

        if let Some(path) = self.static_assets.iter().find(|p| !p.starts_with('/') || p.starts_with("//")) {
            return Err(ConfigError::Invalid {
                field: "static_assets".into(),
                reason: format!("{path:?} must be a same-origin path starting with a single '/'"),
            });
        }

        if self.bypass_domains.iter().any(|d| d.trim().is_empty()) {
            return Err(ConfigError::Invalid {
                field: "bypass_domains".into(),
                reason: "entries must not be empty".into(),
            });
        }

        if let Some(ext) = self.bypass_extensions.iter().find(|e| !e.starts_with('.') || e.len() < 2) {
            return Err(ConfigError::Invalid {
                field: "bypass_extensions".into(),
                reason: format!("{ext:?} must be '.' followed by a suffix"),
            });
        }

        if self.timeout_ms < 100 {
            return Err(ConfigError::Invalid { field: "timeout_ms".into(), reason: "must be at least 100ms".into() });
        }
        if self.timeout_ms > 300_000 {
            return Err(ConfigError::Invalid {
                field: "timeout_ms".into(),
                reason: "must not exceed 5 minutes (300000ms)".into(),
            });
        }

        if self.user_agent.is_empty() {
            return Err(ConfigError::Invalid { field: "user_agent".into(), reason: "must not be empty".into() });
        }

        if self.bypass_domains.iter().any(|d| self.origin.contains(d.as_str())) {
            tracing::warn!(
                origin = %self.origin,
                "origin matches a bypass domain; same-origin requests will never be cached"
            );
        }

        Ok(())
    }

    /// Check that an engine API key is available (for deferred validation).
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if no key is set.
    pub fn require_engine_api_key(&self) -> Result<&str, ConfigError> {
        self.engine.api_key.as_deref().ok_or_else(|| ConfigError::Missing {
            field: "engine.api_key".into(),
            hint: "Set HONYAKU_ENGINE__API_KEY environment variable".into(),
        })
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
    fn test_validate_empty_cache_version() {
        let config = AppConfig { cache_version: "  ".into(), ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "cache_version"));
    }

    #[test]
    fn test_validate_origin_not_url() {
        let config = AppConfig { origin: "localhost".into(), ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "origin"));
    }

    #[test]
    fn test_validate_origin_with_path() {
        let config = AppConfig { origin: "https://example.com/app".into(), ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "origin"));
    }

    #[test]
    fn test_validate_origin_scheme() {
        let config = AppConfig { origin: "ftp://example.com".into(), ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "origin"));
    }

    #[test]
    fn test_validate_relative_asset() {
        let config = AppConfig { static_assets: vec!["/".into(), "index.css".into()], ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "static_assets"));
    }

    #[test]
    fn test_validate_protocol_relative_asset() {
        let config = AppConfig { static_assets: vec!["/".into(), "//evil.test/x.js".into()], ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "static_assets"));
    }

    #[test]
    fn test_validate_blank_bypass_domain() {
        for domain in ["", "   "] {
            let config =
                AppConfig { bypass_domains: vec!["huggingface.co".into(), domain.into()], ..Default::default() };
            let result = config.validate();
            assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "bypass_domains"));
        }
    }

    #[test]
    fn test_validate_bare_dot_extension() {
        let config = AppConfig { bypass_extensions: vec![".bin".into(), ".".into()], ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "bypass_extensions"));
    }

    #[test]
    fn test_validate_extension_without_dot() {
        let config = AppConfig { bypass_extensions: vec!["gguf".into()], ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "bypass_extensions"));
    }

    #[test]
    fn test_validate_timeout_bounds() {
        let config = AppConfig { timeout_ms: 50, ..Default::default() };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { field, .. }) if field == "timeout_ms"));

        let config = AppConfig { timeout_ms: 301_000, ..Default::default() };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { field, .. }) if field == "timeout_ms"));

        let config = AppConfig { timeout_ms: 100, ..Default::default() };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_empty_user_agent() {
        let config = AppConfig { user_agent: String::new(), ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "user_agent"));
    }

    #[test]
    fn test_require_engine_api_key() {
        let config = AppConfig::default();
        assert!(matches!(config.require_engine_api_key(), Err(ConfigError::Missing { .. })));

        let mut config = AppConfig::default();
        config.engine.api_key = Some("sk-test".into());
        assert_eq!(config.require_engine_api_key().unwrap(), "sk-test");
    }
}
