use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const APP_NAME: &str = "qtree";
const CONFIG_FILE: &str = "config.json";

/// Item count limit used when no configuration says otherwise
pub const DEFAULT_MAX_QUERY_ITEMS: u32 = 10_000;

/// Application configuration stored in the platform config directory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Largest query tree accepted by canonicalization.
    /// `null` disables the limit.
    #[serde(default = "default_max_query_items")]
    pub max_query_items: Option<u32>,

    /// Canonicalize trees before encoding them
    #[serde(default = "default_canonicalize_before_encode")]
    pub canonicalize_before_encode: bool,
}

fn default_max_query_items() -> Option<u32> {
    Some(DEFAULT_MAX_QUERY_ITEMS)
}

fn default_canonicalize_before_encode() -> bool {
    true
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            max_query_items: default_max_query_items(),
            canonicalize_before_encode: default_canonicalize_before_encode(),
        }
    }
}

impl AppConfig {
    /// Load config from the config directory, or return default if not found
    pub fn load() -> Result<Self> {
        Self::load_from(&get_config_path()?)
    }

    /// Load config from `path`, or return default if it does not exist
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: AppConfig = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    /// Save config to the config directory
    pub fn save(&self) -> Result<()> {
        self.save_to(&get_config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)
            .context("Failed to serialize config")?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write config file {}", path.display()))?;
        Ok(())
    }
}

/// Get the path to the config file
pub fn get_config_path() -> Result<PathBuf> {
    Ok(get_config_dir()?.join(CONFIG_FILE))
}

/// Get the application config directory
pub fn get_config_dir() -> Result<PathBuf> {
    let base = if cfg!(target_os = "macos") {
        dirs::home_dir().map(|h| h.join("Library").join("Application Support"))
    } else {
        // XDG_CONFIG_HOME or ~/.config on Unix, %APPDATA% on Windows
        dirs::config_dir()
    };

    let base = base.context("Could not determine config directory")?;
    Ok(base.join(APP_NAME))
}
