//! Application configuration, read once at startup.
//!
//! ```toml
//! # ~/.config/mclient/config.toml
//! vendor = "Aiotx"
//! application = "MClientSetting"
//! log_level = "debug"
//! request_capacity = 64
//! max_log_lines = 1000
//! settings_file = "/tmp/mclient-settings.toml"
//! ```
//!
//! Every key is optional.

use crate::persistence::kv_store::TomlFileStore;
use color_eyre::{eyre::eyre, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::{info, warn, Level};

const CONFIG_DIR: &str = "mclient";
const CONFIG_FILE: &str = "config.toml";

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    /// Organisation part of the settings location
    pub vendor: String,
    /// Application part of the settings location
    pub application: String,
    pub log_level: String,
    /// Capacity of the rumqttc request channel
    pub request_capacity: usize,
    pub max_log_lines: usize,
    /// Overrides the settings location derived from vendor and application
    pub settings_file: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            vendor: "Aiotx".to_string(),
            application: "MClientSetting".to_string(),
            log_level: "info".to_string(),
            request_capacity: 64,
            max_log_lines: 1000,
            settings_file: None,
        }
    }
}

impl AppConfig {
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR).join(CONFIG_FILE))
    }

    /// Loads the config file, or defaults if there is none.
    pub fn load() -> Result<Self> {
        let Some(path) = Self::default_path() else {
            warn!("No config directory on this platform, using default configuration");
            return Ok(Self::default());
        };
        if !path.exists() {
            info!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)
            .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;
        let config = Self::from_toml(&content)
            .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| eyre!("{}", e))
    }

    pub fn settings_path(&self) -> PathBuf {
        self.settings_file
            .clone()
            .unwrap_or_else(|| TomlFileStore::default_path(&self.vendor, &self.application))
    }

    /// Max tracing level. Unknown names fall back to INFO.
    pub fn tracing_level(&self) -> Level {
        Level::from_str(&self.log_level).unwrap_or(Level::INFO)
    }
}
