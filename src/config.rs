use anyhow::{Context, Result};
use dirs::config_dir;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure for mirrorkeep
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Config {
    /// Directory tree being backed up
    #[serde(default)]
    pub source_directory: Option<String>,

    /// Directory tree receiving the backup
    #[serde(default)]
    pub target_directory: Option<String>,

    /// Synchronization behavior settings
    #[serde(default)]
    pub sync: SyncConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Synchronization configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SyncConfig {
    /// Ask for confirmation before executing a plan
    #[serde(default = "default_true")]
    pub confirm: bool,

    /// Interval between runs in watch mode
    #[serde(default = "default_watch_interval")]
    pub watch_interval: String, // "30m"
}

/// Logging configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String, // "info"

    /// Log format
    #[serde(default = "default_log_format")]
    pub format: String, // "compact", "pretty", "full"

    /// Enable colored output
    #[serde(default = "default_true")]
    pub color: bool,
}

// Default value functions
fn default_true() -> bool {
    true
}
fn default_watch_interval() -> String {
    "30m".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "compact".to_string()
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            confirm: default_true(),
            watch_interval: default_watch_interval(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            color: default_true(),
        }
    }
}

impl Config {
    /// Load configuration from the default location or create a default config
    pub fn load_or_default() -> Result<Self> {
        let config_path = Self::default_config_path()?;

        if config_path.exists() {
            Self::load(&config_path)
        } else {
            let config = Self::default();

            if let Some(parent) = config_path.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
            }

            config.save(&config_path)?;

            tracing::info!("Created default configuration at: {:?}", config_path);
            Ok(config)
        }
    }

    /// Load configuration from a specific file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let mut config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        // Expand environment variables in paths
        config.expand_paths()?;

        Ok(config)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_yaml::to_string(self).context("Failed to serialize configuration")?;

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {:?}", path))?;

        Ok(())
    }

    /// Get the default configuration file path (XDG compliant)
    pub fn default_config_path() -> Result<PathBuf> {
        let config_dir = config_dir().context("Failed to get user config directory")?;

        Ok(config_dir.join("mirrorkeep").join("config.yml"))
    }

    /// Expand `~` and environment variables in the root paths and normalize them
    pub fn expand_paths(&mut self) -> Result<()> {
        if let Some(source) = &self.source_directory {
            self.source_directory =
                Some(expand_path(source).context("Failed to expand source_directory path")?);
        }

        if let Some(target) = &self.target_directory {
            self.target_directory =
                Some(expand_path(target).context("Failed to expand target_directory path")?);
        }

        Ok(())
    }

    pub fn source_path(&self) -> Option<PathBuf> {
        self.source_directory.as_ref().map(PathBuf::from)
    }

    pub fn target_path(&self) -> Option<PathBuf> {
        self.target_directory.as_ref().map(PathBuf::from)
    }
}

/// Expand `~`/`${VAR}` and lexically clean the result
pub fn expand_path(raw: &str) -> Result<String> {
    let expanded = shellexpand::full(raw)?;
    let cleaned = path_clean::clean(expanded.as_ref());
    Ok(cleaned.to_string_lossy().into_owned())
}
