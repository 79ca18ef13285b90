//! Gateway configuration.
//!
//! Resolution order for every field: built-in default, then
//! `<config_dir>/wealthpulse/client.toml` (with the `config-file` feature),
//! then environment variables. Only the base URL is read from the
//! environment (`WEALTHPULSE_API_URL`).

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use url::Url;
use wealthpulse_core::StoreBackend;

use crate::action_log::DEFAULT_CAPACITY;
use crate::error::{GatewayError, Result};

/// Environment variable overriding the API base URL.
pub const API_URL_ENV: &str = "WEALTHPULSE_API_URL";

/// Name of the CSRF cookie set by the backend.
pub const DEFAULT_CSRF_COOKIE: &str = "wp_csrftoken";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// API base URL, including the version prefix.
    pub base_url: String,

    /// Path of the refresh-token exchange, relative to `base_url`.
    pub refresh_path: String,

    /// Path of the password login endpoint.
    pub login_path: String,

    /// Path returning the authenticated user.
    pub me_path: String,

    /// Front-end route users are sent to when the session ends.
    pub login_route: String,

    /// Cookie mirrored into the `X-CSRFToken` header.
    pub csrf_cookie_name: String,

    /// Maximum number of action log entries kept in memory.
    pub action_log_capacity: usize,

    /// Where tokens are persisted.
    pub store: StoreBackend,

    /// Path of the configuration file that was loaded.
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000/api/v1".to_string(),
            refresh_path: "/auth/refresh".to_string(),
            login_path: "/auth/login".to_string(),
            me_path: "/auth/me".to_string(),
            login_route: "/login".to_string(),
            csrf_cookie_name: DEFAULT_CSRF_COOKIE.to_string(),
            action_log_capacity: DEFAULT_CAPACITY,
            store: StoreBackend::default(),
            config_path: None,
        }
    }
}

impl GatewayConfig {
    /// Defaults for everything except the base URL.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Load the config file if present, then apply environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_file()?;
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    #[cfg(feature = "config-file")]
    fn load_file() -> Result<Self> {
        let Some(path) = default_config_path() else {
            return Ok(Self::default());
        };
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::from_file(path)
    }

    #[cfg(not(feature = "config-file"))]
    fn load_file() -> Result<Self> {
        Ok(Self::default())
    }

    /// Read a config file at an explicit path.
    #[cfg(feature = "config-file")]
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let contents = std::fs::read_to_string(&path).map_err(|e| {
            GatewayError::Config(format!("failed to read config from {:?}: {}", path, e))
        })?;
        let mut config: Self = toml::from_str(&contents).map_err(|e| {
            GatewayError::Config(format!("failed to parse config from {:?}: {}", path, e))
        })?;
        config.config_path = Some(path);
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Ok(url) = std::env::var(API_URL_ENV) {
            if !url.trim().is_empty() {
                tracing::debug!("Using API base URL from {}", API_URL_ENV);
                self.base_url = url.trim().to_string();
            }
        }
    }

    /// Check that the base URL parses.
    pub fn validate(&self) -> Result<()> {
        self.base().map(|_| ())
    }

    /// The parsed base URL.
    pub fn base(&self) -> Result<Url> {
        Url::parse(&self.base_url)
            .map_err(|e| GatewayError::Config(format!("invalid base URL {:?}: {}", self.base_url, e)))
    }

    /// Join an API path onto the base URL, keeping the base's version prefix.
    pub fn endpoint(&self, path: &str) -> Result<Url> {
        let joined = format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        Url::parse(&joined)
            .map_err(|e| GatewayError::InvalidRequest(format!("invalid URL {:?}: {}", joined, e)))
    }

    /// Whether `path` addresses the refresh-token exchange.
    pub fn is_refresh_path(&self, path: &str) -> bool {
        normalize(path) == normalize(&self.refresh_path)
    }
}

fn normalize(path: &str) -> &str {
    let path = path.split('?').next().unwrap_or(path);
    path.trim_matches('/')
}

/// Default location of the client configuration file.
#[cfg(feature = "config-file")]
pub fn default_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("com", "wealthpulse", "wealthpulse")
        .map(|dirs| dirs.config_dir().join("client.toml"))
}
