//! Application configuration management.
//!
//! This module handles loading and saving the console configuration: the
//! backend base URL, session timing, where the token is kept, and the last
//! used username.
//!
//! Configuration is stored at `~/.config/bankadmin/config.json`. The base URL
//! can be overridden with `BANKADMIN_API_URL`.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::auth::{
    session::DEFAULT_CHECK_INTERVAL_SECS, FileTokenStore, KeyringTokenStore, SessionConfig,
    TokenStore,
};

/// Application name used for config/data directory paths
const APP_NAME: &str = "bankadmin";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Environment variable overriding the backend base URL
pub const API_URL_ENV: &str = "BANKADMIN_API_URL";

/// Production backend, used when nothing else is configured
pub const DEFAULT_API_BASE_URL: &str = "https://api.bankadmin.example.com/api";

/// HTTP request timeout in seconds.
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Where the session token is kept between runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenStorageKind {
    #[default]
    File,
    Keyring,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_base_url: Option<String>,
    pub expiry_check_interval_secs: u64,
    pub request_timeout_secs: u64,
    pub token_storage: TokenStorageKind,
    pub last_username: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: None,
            expiry_check_interval_secs: DEFAULT_CHECK_INTERVAL_SECS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            token_storage: TokenStorageKind::default(),
            last_username: None,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            Ok(serde_json::from_str(&contents)?)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
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

    pub fn data_dir(&self) -> Result<PathBuf> {
        let data_dir = dirs::data_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find data directory"))?;
        Ok(data_dir.join(APP_NAME))
    }

    /// Backend base URL: environment, then config file, then production default.
    pub fn base_url(&self) -> String {
        resolve_base_url(std::env::var(API_URL_ENV).ok(), self.api_base_url.as_deref())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            check_interval: Duration::from_secs(self.expiry_check_interval_secs.max(1)),
        }
    }

    pub fn token_store(&self) -> Result<Box<dyn TokenStore>> {
        Ok(match self.token_storage {
            TokenStorageKind::File => Box::new(FileTokenStore::new(self.data_dir()?)),
            TokenStorageKind::Keyring => Box::new(KeyringTokenStore),
        })
    }
}

fn resolve_base_url(env: Option<String>, configured: Option<&str>) -> String {
    env.filter(|url| !url.trim().is_empty())
        .or_else(|| {
            configured
                .filter(|url| !url.trim().is_empty())
                .map(str::to_string)
        })
        .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string())
        .trim()
        .trim_end_matches('/')
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_base_url_precedence() {
        assert_eq!(
            resolve_base_url(Some("http://localhost:4000/api/".into()), Some("https://x")),
            "http://localhost:4000/api"
        );
        assert_eq!(
            resolve_base_url(None, Some("https://staging.bank.example/api")),
            "https://staging.bank.example/api"
        );
        assert_eq!(resolve_base_url(Some("  ".into()), None), DEFAULT_API_BASE_URL);
        assert_eq!(resolve_base_url(None, None), DEFAULT_API_BASE_URL);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"token_storage":"keyring","last_username":"ana"}"#).unwrap();
        assert_eq!(config.token_storage, TokenStorageKind::Keyring);
        assert_eq!(config.last_username.as_deref(), Some("ana"));
        assert_eq!(config.expiry_check_interval_secs, DEFAULT_CHECK_INTERVAL_SECS);
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_session_config_never_zero() {
        let config = Config {
            expiry_check_interval_secs: 0,
            ..Config::default()
        };
        assert_eq!(config.session_config().check_interval, Duration::from_secs(1));
    }
}
