//! Application configuration structures.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// REST backend connection settings
    #[serde(default)]
    pub api: ApiConfig,

    /// Justification editing behavior
    #[serde(default)]
    pub editing: EditingConfig,

    /// Log output settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.api.base_url.trim().is_empty() {
            return Err(AppError::config("api.base_url is empty"));
        }
        let base = Url::parse(&self.api.base_url)?;
        if base.cannot_be_a_base() {
            return Err(AppError::config("api.base_url must be an absolute URL"));
        }
        if self.api.user_agent.trim().is_empty() {
            return Err(AppError::config("api.user_agent is empty"));
        }
        if self.api.timeout_secs == 0 {
            return Err(AppError::config("api.timeout_secs must be > 0"));
        }
        if self.api.object_count_timeout_secs == 0 {
            return Err(AppError::config(
                "api.object_count_timeout_secs must be > 0",
            ));
        }
        if self.api.max_concurrent == 0 {
            return Err(AppError::config("api.max_concurrent must be > 0"));
        }
        if self.api.page_size == Some(0) {
            return Err(AppError::config("api.page_size must be > 0"));
        }
        if self.editing.debounce_ms == 0 {
            return Err(AppError::config("editing.debounce_ms must be > 0"));
        }
        Ok(())
    }
}

/// REST backend connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL all endpoint paths are joined onto
    #[serde(default = "defaults::base_url")]
    pub base_url: String,

    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Shorter timeout for full-table object counts
    #[serde(default = "defaults::object_count_timeout")]
    pub object_count_timeout_secs: u64,

    /// Maximum concurrent object-count requests
    #[serde(default = "defaults::max_concurrent")]
    pub max_concurrent: usize,

    /// Failing objects per page; the server default applies when unset
    #[serde(default)]
    pub page_size: Option<u32>,
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn object_count_timeout(&self) -> Duration {
        Duration::from_secs(self.object_count_timeout_secs)
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::base_url(),
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            object_count_timeout_secs: defaults::object_count_timeout(),
            max_concurrent: defaults::max_concurrent(),
            page_size: None,
        }
    }
}

/// Justification editing behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditingConfig {
    /// Quiet period after the last keystroke before a justification is written
    #[serde(default = "defaults::debounce")]
    pub debounce_ms: u64,
}

impl EditingConfig {
    pub fn debounce_window(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

impl Default for EditingConfig {
    fn default() -> Self {
        Self {
            debounce_ms: defaults::debounce(),
        }
    }
}

/// Log output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter level (`error`, `warn`, `info`, `debug`, `trace`)
    #[serde(default = "defaults::level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::level(),
        }
    }
}

mod defaults {
    pub fn base_url() -> String {
        "http://localhost:8000/datavalidation/api/".into()
    }
    pub fn user_agent() -> String {
        concat!("dataval-dashboard/", env!("CARGO_PKG_VERSION")).into()
    }
    pub fn timeout() -> u64 {
        30
    }
    pub fn object_count_timeout() -> u64 {
        10
    }
    pub fn max_concurrent() -> usize {
        4
    }
    pub fn debounce() -> u64 {
        1000
    }
    pub fn level() -> String {
        "info".into()
    }
}
