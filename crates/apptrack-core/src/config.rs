//! Application configuration management.
//!
//! This module handles loading and saving the client configuration, which
//! includes the API base URL, timeouts, and the last used login email.
//!
//! Configuration is stored at `~/.config/apptrack/config.json`. Environment
//! variables take precedence over the file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Application name used for config directory paths and the keychain service
pub const APP_NAME: &str = "apptrack";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Used when neither the config file nor the environment names a server.
pub const DEFAULT_API_URL: &str = "http://localhost:8000/api/v1";

/// Every endpoint lives under this prefix on the backend.
const API_PREFIX: &str = "/api/v1";

/// Where the user is sent when the session cannot be recovered.
pub const LOGIN_PATH: &str = "/auth/login";

/// Keychain account holding the persisted refresh token.
pub const DEFAULT_TOKEN_SLOT: &str = "refresh_token";

/// HTTP request timeout in seconds.
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Refresh call timeout in seconds. Every request queued behind a refresh
/// waits at most this long.
const DEFAULT_REFRESH_TIMEOUT_SECS: u64 = 15;

pub const ENV_API_URL: &str = "APPTRACK_API_URL";
pub const ENV_REFRESH_TIMEOUT: &str = "APPTRACK_REFRESH_TIMEOUT_SECS";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    pub api_url: Option<String>,
    pub request_timeout_secs: Option<u64>,
    pub refresh_timeout_secs: Option<u64>,
    pub token_slot: Option<String>,
    pub last_email: Option<String>,
}

impl Config {
    /// Load the config file (if any) and apply environment overrides.
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        let mut config = Self::load_from(&path)?;
        config.apply_env();
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Overlay `APPTRACK_*` environment variables onto the loaded values.
    pub fn apply_env(&mut self) {
        if let Ok(url) = std::env::var(ENV_API_URL) {
            if !url.trim().is_empty() {
                self.api_url = Some(url);
            }
        }
        if let Ok(secs) = std::env::var(ENV_REFRESH_TIMEOUT) {
            match secs.trim().parse() {
                Ok(secs) => self.refresh_timeout_secs = Some(secs),
                Err(_) => tracing::warn!(value = %secs, "Ignoring invalid refresh timeout"),
            }
        }
    }

    /// The normalized API base URL, always ending in `/api/v1`.
    pub fn api_base_url(&self) -> String {
        normalize_base_url(self.api_url.as_deref().unwrap_or(DEFAULT_API_URL))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS))
    }

    pub fn refresh_timeout(&self) -> Duration {
        Duration::from_secs(self.refresh_timeout_secs.unwrap_or(DEFAULT_REFRESH_TIMEOUT_SECS))
    }

    pub fn token_slot(&self) -> &str {
        self.token_slot.as_deref().unwrap_or(DEFAULT_TOKEN_SLOT)
    }
}

/// Trim trailing slashes and append `/api/v1` unless the URL already ends with it.
pub fn normalize_base_url(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.ends_with(API_PREFIX) {
        trimmed.to_string()
    } else {
        format!("{}{}", trimmed, API_PREFIX)
    }
}
