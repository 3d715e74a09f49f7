//! Application configuration
//!
//! Configuration is loaded from:
//! 1. Default values
//! 2. Config file (~/.config/postgrab/config.toml)
//! 3. Environment variables (POSTGRAB_* prefix)
//!
//! Environment variables take precedence over config file values.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable prefix
const ENV_PREFIX: &str = "POSTGRAB";

/// Parser service used when nothing else is configured
pub const DEFAULT_PARSER_URL: &str = "http://127.0.0.1:8000";

/// Pause between sequential archive downloads
pub const DEFAULT_DOWNLOAD_DELAY_MS: u64 = 500;

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory for the persisted collections
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Base URL of the remote parser service
    #[serde(default = "default_parser_url")]
    pub parser_url: String,

    /// Use the streamed batch endpoint (progress events) instead of the single-response one
    #[serde(default = "default_streaming")]
    pub streaming: bool,

    /// Where downloaded archives are written (defaults to the working directory)
    #[serde(default)]
    pub download_dir: Option<PathBuf>,

    /// Delay between archive downloads, in milliseconds
    #[serde(default = "default_download_delay_ms")]
    pub download_delay_ms: u64,

    /// Log file path (defaults to <data_dir>/postgrab.log)
    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            parser_url: default_parser_url(),
            streaming: default_streaming(),
            download_dir: None,
            download_delay_ms: default_download_delay_ms(),
            log_file: None,
        }
    }
}

impl Config {
    /// Load configuration from default location and environment
    ///
    /// Order of precedence (highest to lowest):
    /// 1. Environment variables (POSTGRAB_DATA_DIR, POSTGRAB_PARSER_URL, POSTGRAB_STREAMING)
    /// 2. Config file (~/.config/postgrab/config.toml or POSTGRAB_CONFIG)
    /// 3. Default values
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::config_file_path())
    }

    /// Load configuration, preferring a path given on the command line
    pub fn load_with_cli_override(path: Option<&PathBuf>) -> Result<Self> {
        match path {
            Some(p) => Self::load_from_path(p),
            None => Self::load(),
        }
    }

    /// Load configuration from a specific path
    ///
    /// Environment variables are still applied as overrides.
    /// If the file doesn't exist, defaults are used.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", path))?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        config.ensure_data_dir()?;
        Ok(config)
    }

    /// Load configuration from a TOML string (useful for testing)
    pub fn load_from_str(toml_content: &str) -> Result<Self> {
        let mut config: Config =
            toml::from_str(toml_content).context("Failed to parse config TOML")?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var(format!("{}_DATA_DIR", ENV_PREFIX)) {
            self.data_dir = PathBuf::from(val);
        }

        // Empty string falls back to the default service
        if let Ok(val) = std::env::var(format!("{}_PARSER_URL", ENV_PREFIX)) {
            self.parser_url = if val.is_empty() {
                default_parser_url()
            } else {
                val
            };
        }

        if let Ok(val) = std::env::var(format!("{}_STREAMING", ENV_PREFIX)) {
            self.streaming = val.eq_ignore_ascii_case("true") || val == "1";
        }
    }

    /// Ensure data directory exists
    fn ensure_data_dir(&self) -> Result<()> {
        if !self.data_dir.exists() {
            std::fs::create_dir_all(&self.data_dir)
                .with_context(|| format!("Failed to create data directory: {:?}", self.data_dir))?;
        }
        Ok(())
    }

    /// Save configuration to the default file
    pub fn save(&self) -> Result<()> {
        self.save_to_path(&Self::config_file_path())
    }

    /// Save configuration to a specific file
    pub fn save_to_path(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(config_path, content)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;
        Ok(())
    }

    /// Get the config file path
    ///
    /// Can be overridden with POSTGRAB_CONFIG environment variable
    pub fn config_file_path() -> PathBuf {
        if let Ok(path) = std::env::var(format!("{}_CONFIG", ENV_PREFIX)) {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("postgrab")
            .join("config.toml")
    }

    /// Get the log file path
    pub fn log_path(&self) -> PathBuf {
        self.log_file
            .clone()
            .unwrap_or_else(|| self.data_dir.join("postgrab.log"))
    }

    /// Get the directory archives are downloaded into
    pub fn download_path(&self) -> PathBuf {
        self.download_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

/// Get the default data directory
fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("postgrab")
}

fn default_parser_url() -> String {
    DEFAULT_PARSER_URL.to_string()
}

fn default_streaming() -> bool {
    true
}

fn default_download_delay_ms() -> u64 {
    DEFAULT_DOWNLOAD_DELAY_MS
}
