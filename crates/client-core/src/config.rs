//! Configuration management for the client.

use crate::{CoreResult, Paths};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default API base URL (can be overridden at compile time via LIFTLOG_API_URL).
pub const DEFAULT_API_URL: &str = match option_env!("LIFTLOG_API_URL") {
    Some(url) => url,
    None => "https://api.liftlog.app",
};

/// Default push application id (can be overridden at compile time via LIFTLOG_PUSH_APP_ID).
pub const DEFAULT_PUSH_APP_ID: Option<&str> = option_env!("LIFTLOG_PUSH_APP_ID");

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Main client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
    /// API base URL.
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// Push platform application id (optional, for push notifications).
    #[serde(default = "default_push_app_id")]
    pub push_app_id: Option<String>,
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_push_app_id() -> Option<String> {
    DEFAULT_PUSH_APP_ID.map(|s| s.to_string())
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            api_url: DEFAULT_API_URL.to_string(),
            push_app_id: DEFAULT_PUSH_APP_ID.map(|s| s.to_string()),
        }
    }
}

impl Config {
    /// Create a new Config with default values, then override from environment.
    pub fn new() -> Self {
        let mut config = Self::default();
        config.load_from_env();
        config
    }

    /// Load configuration from a file, falling back to defaults.
    /// Note: api_url and push_app_id are compile-time only and always use
    /// the built-in defaults, regardless of what's in the config file.
    pub fn load(paths: &Paths) -> CoreResult<Self> {
        let config_path = paths.config_file();

        let mut config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            Self::default()
        };

        // Force compile-time values (never from config file)
        config.api_url = DEFAULT_API_URL.to_string();
        config.push_app_id = DEFAULT_PUSH_APP_ID.map(|s| s.to_string());

        // Environment variables can only override log_level
        config.load_from_env();

        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a file.
    pub fn save(&self, paths: &Paths) -> CoreResult<()> {
        paths.ensure_dirs()?;
        let config_path = paths.config_file();
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    /// Override configuration from environment variables.
    /// Only log_level can be overridden at runtime.
    fn load_from_env(&mut self) {
        if let Ok(log_level) = std::env::var("LIFTLOG_LOG_LEVEL") {
            self.log_level = log_level;
        }
    }
}
