use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::client::DEFAULT_ENDPOINT;

const APP_DIR: &str = "bodymeasure";

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_request_timeout() -> u64 {
    120
}

fn default_connect_timeout() -> u64 {
    10
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Inference endpoint receiving the multipart upload
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Whole-request timeout in seconds (0 = wait indefinitely)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Connect timeout in seconds (0 = none)
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Directory the file browser opens in (defaults to home)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_dir: Option<PathBuf>,

    /// Desktop notification when an estimation settles
    #[serde(default)]
    pub notifications: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_file: Option<PathBuf>,

    /// kitty.conf-style colour file
    #[serde(skip_serializing_if = "Option::is_none")]
    pub theme_file: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            request_timeout_secs: default_request_timeout(),
            connect_timeout_secs: default_connect_timeout(),
            start_dir: None,
            notifications: false,
            log_file: None,
            theme_file: None,
        }
    }
}

impl AppConfig {
    /// Get the config file path
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?
            .join(APP_DIR);
        Ok(config_dir.join("config.toml"))
    }

    /// Load config from the default location.
    ///
    /// A broken file falls back to defaults. The error is handed back rather
    /// than logged because this runs before logging is set up.
    pub fn load() -> (Self, Option<anyhow::Error>) {
        match Self::config_path() {
            Ok(path) => Self::load_or_default(&path),
            Err(_) => (AppConfig::default(), None),
        }
    }

    pub fn load_or_default(path: &std::path::Path) -> (Self, Option<anyhow::Error>) {
        match Self::load_from(path) {
            Ok(config) => (config, None),
            Err(e) => (AppConfig::default(), Some(e)),
        }
    }

    /// A missing file is not an error; it yields defaults.
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(AppConfig::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        Ok(config)
    }

    /// Write config to `path`, creating parent directories
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        match self.request_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        match self.connect_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    pub fn log_path(&self) -> Option<PathBuf> {
        self.log_file
            .clone()
            .or_else(|| dirs::cache_dir().map(|d| d.join(APP_DIR).join("bodymeasure.log")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let config = AppConfig {
            endpoint: "http://localhost:7860/measure_3pose".to_string(),
            request_timeout_secs: 30,
            start_dir: Some(PathBuf::from("/photos")),
            notifications: true,
            ..AppConfig::default()
        };

        config.save_to(&path).unwrap();
        assert_eq!(AppConfig::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let parsed: AppConfig = toml::from_str("notifications = true\n").unwrap();
        assert!(parsed.notifications);
        assert_eq!(parsed.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(parsed.request_timeout(), Some(Duration::from_secs(120)));
    }

    #[test]
    fn test_broken_file_falls_back_to_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "endpoint = [not toml").unwrap();

        let (config, error) = AppConfig::load_or_default(&path);
        assert_eq!(config, AppConfig::default());
        let error = error.expect("broken file reports an error");
        assert!(error.to_string().contains("Failed to parse config"));
        assert!(error.to_string().contains("config.toml"));
    }

    #[test]
    fn test_missing_file_is_defaults_without_error() {
        let dir = TempDir::new().unwrap();
        let (config, error) = AppConfig::load_or_default(&dir.path().join("absent.toml"));
        assert_eq!(config, AppConfig::default());
        assert!(error.is_none());
    }

    #[test]
    fn test_zero_timeout_means_none() {
        let config = AppConfig { request_timeout_secs: 0, ..AppConfig::default() };
        assert_eq!(config.request_timeout(), None);
    }

    #[test]
    fn test_zero_connect_timeout_means_none() {
        let config = AppConfig { connect_timeout_secs: 0, ..AppConfig::default() };
        assert_eq!(config.connect_timeout(), None);
        assert_eq!(AppConfig::default().connect_timeout(), Some(Duration::from_secs(10)));
    }
}
