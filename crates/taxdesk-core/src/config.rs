use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8000";
pub const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Config {
    pub backend_url: Option<String>,
    pub log_level: Option<String>,
}

impl Config {
    pub fn new() -> Self {
        Self {
            backend_url: Some(DEFAULT_BACKEND_URL.to_string()),
            log_level: Some(DEFAULT_LOG_LEVEL.to_string()),
        }
    }

    /// Load `~/.config/taxdesk/config.json` (platform equivalent), falling
    /// back to defaults when it doesn't exist.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::get_config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }

        let config_content = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&config_content)
            .map_err(|e| anyhow!("Invalid config file {:?}: {}", path, e))?;
        Ok(config)
    }

    pub fn backend_url(&self) -> &str {
        self.backend_url
            .as_deref()
            .filter(|url| !url.trim().is_empty())
            .unwrap_or(DEFAULT_BACKEND_URL)
    }

    pub fn log_level(&self) -> &str {
        self.log_level
            .as_deref()
            .filter(|level| !level.trim().is_empty())
            .unwrap_or(DEFAULT_LOG_LEVEL)
    }

    pub fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("taxdesk").join("config.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("config.json")).unwrap();
        assert_eq!(config.backend_url(), DEFAULT_BACKEND_URL);
        assert_eq!(config.log_level(), "info");
    }

    #[test]
    fn test_partial_file_keeps_defaults_for_missing_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"backend_url": "http://10.0.0.5:9000"}"#).unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.backend_url(), "http://10.0.0.5:9000");
        assert_eq!(config.log_level(), DEFAULT_LOG_LEVEL);
    }

    #[test]
    fn test_blank_values_fall_back() {
        let config = Config {
            backend_url: Some("  ".to_string()),
            log_level: Some(String::new()),
        };
        assert_eq!(config.backend_url(), DEFAULT_BACKEND_URL);
        assert_eq!(config.log_level(), DEFAULT_LOG_LEVEL);
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(Config::load_from(&path).is_err());
    }
}
