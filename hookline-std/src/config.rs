//! Runtime configuration.
//!
//! Loaded from TOML:
//!
//! ```toml
//! [bus]
//! servers = ["nats://127.0.0.1:4222"]
//! name = "orders"
//! request_timeout_ms = 2000
//!
//! [dispatch]
//! default_data_quota = 102400
//! hook_timeout_ms = 500
//! ```

use hookline_core::DEFAULT_DATA_QUOTA;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Errors from loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// The TOML is malformed or has unexpected fields.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HooklineConfig {
    /// Bus connection settings, passed through to the connector.
    pub bus: BusConfig,
    /// Dispatch pipeline settings.
    pub dispatch: DispatchConfig,
}

impl HooklineConfig {
    /// Parse configuration from a TOML string.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(source)?)
    }

    /// Read and parse a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }
}

/// Connection settings for a bus adapter.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BusConfig {
    /// Server addresses.
    pub servers: Vec<String>,
    /// Client connection name.
    pub name: Option<String>,
    /// User for user/password authentication.
    pub user: Option<String>,
    /// Password for user/password authentication.
    pub password: Option<String>,
    /// Token authentication.
    pub token: Option<String>,
    /// Timeout for outbound requests, in milliseconds.
    pub request_timeout_ms: Option<u64>,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            servers: vec!["nats://127.0.0.1:4222".to_string()],
            name: None,
            user: None,
            password: None,
            token: None,
            request_timeout_ms: None,
        }
    }
}

impl BusConfig {
    /// Timeout for outbound requests.
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }
}

/// Dispatch pipeline settings.
///
/// Timeouts are unset by default: hooks and handlers may run unbounded.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DispatchConfig {
    /// Quota for bindings that do not set one.
    pub default_data_quota: u64,
    /// Per-hook timeout, in milliseconds.
    pub hook_timeout_ms: Option<u64>,
    /// Per-handler timeout, in milliseconds.
    pub handler_timeout_ms: Option<u64>,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            default_data_quota: DEFAULT_DATA_QUOTA,
            hook_timeout_ms: None,
            handler_timeout_ms: None,
        }
    }
}

impl DispatchConfig {
    /// Per-hook timeout.
    pub fn hook_timeout(&self) -> Option<Duration> {
        self.hook_timeout_ms.map(Duration::from_millis)
    }

    /// Per-handler timeout.
    pub fn handler_timeout(&self) -> Option<Duration> {
        self.handler_timeout_ms.map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = HooklineConfig::from_toml_str("").unwrap();
        assert_eq!(config.dispatch.default_data_quota, 102_400);
        assert_eq!(config.dispatch.hook_timeout(), None);
        assert_eq!(config.bus.servers, vec!["nats://127.0.0.1:4222"]);
    }

    #[test]
    fn test_full_document() {
        let config = HooklineConfig::from_toml_str(
            r#"
            [bus]
            servers = ["nats://a:4222", "nats://b:4222"]
            name = "orders"
            token = "s3cret"
            request_timeout_ms = 2000

            [dispatch]
            default_data_quota = 4096
            hook_timeout_ms = 250
            handler_timeout_ms = 1000
            "#,
        )
        .unwrap();
        assert_eq!(config.bus.servers.len(), 2);
        assert_eq!(config.bus.name.as_deref(), Some("orders"));
        assert_eq!(config.bus.request_timeout(), Some(Duration::from_secs(2)));
        assert_eq!(config.dispatch.default_data_quota, 4096);
        assert_eq!(config.dispatch.hook_timeout(), Some(Duration::from_millis(250)));
        assert_eq!(config.dispatch.handler_timeout(), Some(Duration::from_secs(1)));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = HooklineConfig::from_toml_str("[dispatch]\nquota = 1\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = HooklineConfig::from_file("/nonexistent/hookline.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
