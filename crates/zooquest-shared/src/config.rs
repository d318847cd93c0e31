//! ZooQuest configuration.
//!
//! Config file: ~/.config/zooquest/config.toml
//! `ZOOQUEST_DATA_DIR` overrides the storage directory.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::Result;

pub const DATA_DIR_ENV: &str = "ZOOQUEST_DATA_DIR";

/// Storage configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding one JSON file per storage key
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("zooquest")
}

/// Sampling parameters for the chat collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatSettings {
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Number of earlier messages sent along with a new question
    #[serde(default = "default_history_window")]
    pub history_window: usize,
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    800
}

fn default_history_window() -> usize {
    6
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            history_window: default_history_window(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogConfig {
    /// Default tracing filter when RUST_LOG is unset
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ZooQuestConfig {
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub chat: ChatSettings,

    #[serde(default)]
    pub log: LogConfig,
}

impl ZooQuestConfig {
    /// Default user config path: ~/.config/zooquest/config.toml
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("zooquest").join("config.toml"))
    }

    /// Load configuration
    ///
    /// Priority:
    /// 1. Explicit path (must exist)
    /// 2. User config (~/.config/zooquest/config.toml)
    /// 3. Defaults
    ///
    /// The data directory env override is applied last.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut config = match explicit {
            Some(path) => Self::load_from_path(path)?,
            None => match Self::user_config_path() {
                Some(path) if path.exists() => Self::load_from_path(&path)?,
                _ => Self::default(),
            },
        };

        if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
            if !dir.trim().is_empty() {
                debug!("Data directory overridden by {}", DATA_DIR_ENV);
                config.storage.data_dir = PathBuf::from(dir);
            }
        }
        Ok(config)
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = ZooQuestConfig::default();
        assert_eq!(config.chat.temperature, 0.7);
        assert_eq!(config.chat.max_tokens, 800);
        assert_eq!(config.chat.history_window, 6);
        assert_eq!(config.log.level, "info");
        assert!(config.storage.data_dir.ends_with("zooquest"));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: ZooQuestConfig = toml::from_str("[chat]\nmax_tokens = 200\n").unwrap();
        assert_eq!(config.chat.max_tokens, 200);
        assert_eq!(config.chat.history_window, 6);
        assert_eq!(config.log, LogConfig::default());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut config = ZooQuestConfig::default();
        config.storage.data_dir = dir.path().join("data");
        config.log.level = "debug".to_string();
        config.save_to_path(&path).unwrap();

        let loaded = ZooQuestConfig::load_from_path(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[chat\n").unwrap();
        assert!(ZooQuestConfig::load_from_path(&path).is_err());
    }
}
