//! Main application configuration
//!
//! This module defines the primary configuration structures for the green-room
//! lobby client, including environment variable loading, TOML file loading,
//! and validation.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub service: ServiceSettings,
    #[serde(default)]
    pub api: ApiSettings,
    #[serde(default)]
    pub session: SessionSettings,
}

/// Service-level settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceSettings {
    /// Service name for logging
    pub name: String,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
}

/// Lobby API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiSettings {
    /// Base URL of the lobby service
    pub base_url: String,
    /// Per-request timeout in seconds
    pub request_timeout_seconds: u64,
}

/// Session state machine settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSettings {
    /// Interval between lobby refreshes in seconds
    pub poll_interval_seconds: u64,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            name: "green-room".to_string(),
            log_level: "info".to_string(),
        }
    }
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080".to_string(),
            request_timeout_seconds: 10,
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            poll_interval_seconds: 5,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables with fallback to defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        // Service settings
        if let Ok(name) = env::var("SERVICE_NAME") {
            config.service.name = name;
        }
        if let Ok(log_level) = env::var("LOG_LEVEL") {
            config.service.log_level = log_level;
        }

        // API settings
        if let Ok(url) = env::var("LOBBY_API_URL") {
            config.api.base_url = url;
        }
        if let Ok(timeout) = env::var("REQUEST_TIMEOUT_SECONDS") {
            config.api.request_timeout_seconds = timeout
                .parse()
                .map_err(|_| anyhow!("Invalid REQUEST_TIMEOUT_SECONDS value: {}", timeout))?;
        }

        // Session settings
        if let Ok(interval) = env::var("POLL_INTERVAL_SECONDS") {
            config.session.poll_interval_seconds = interval
                .parse()
                .map_err(|_| anyhow!("Invalid POLL_INTERVAL_SECONDS value: {}", interval))?;
        }

        validate_config(&config)?;
        Ok(config)
    }

    /// Load configuration from a TOML file, with environment overrides applied on top
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Self = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        validate_config(&config)?;
        Ok(config)
    }

    /// Get the per-request timeout as a Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.api.request_timeout_seconds)
    }

    /// Get the poll interval as a Duration
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.session.poll_interval_seconds)
    }
}

impl SessionSettings {
    /// Get the poll interval as a Duration
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_seconds)
    }
}

impl ApiSettings {
    /// Get the per-request timeout as a Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

/// Validate configuration values
pub fn validate_config(config: &AppConfig) -> Result<()> {
    // Validate log level
    match config.service.log_level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => {}
        _ => return Err(anyhow!("Invalid log level: {}", config.service.log_level)),
    }

    // Validate API settings
    if config.api.base_url.is_empty() {
        return Err(anyhow!("Lobby API base URL cannot be empty"));
    }
    if !config.api.base_url.starts_with("http://") && !config.api.base_url.starts_with("https://") {
        return Err(anyhow!(
            "Lobby API base URL must be http(s): {}",
            config.api.base_url
        ));
    }
    if config.api.request_timeout_seconds == 0 {
        return Err(anyhow!("Request timeout must be greater than 0"));
    }

    // Validate session settings
    if config.session.poll_interval_seconds == 0 {
        return Err(anyhow!("Poll interval must be greater than 0"));
    }

    Ok(())
}
