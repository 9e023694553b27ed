//! Persistent CLI configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use studia_core::util::normalize_text_option;

const CONFIG_FILE_NAME: &str = "cli-config.json";
const STORE_FILE_NAME: &str = "store.json";
const CACHE_FILE_NAME: &str = "cache.db";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CliConfig {
    #[serde(default = "default_config_version")]
    pub version: u32,
    #[serde(default)]
    pub default_user: Option<String>,
    #[serde(default)]
    pub store_path: Option<PathBuf>,
    #[serde(default)]
    pub cache_path: Option<PathBuf>,
}

const fn default_config_version() -> u32 {
    1
}

fn studia_dir(base: Option<PathBuf>) -> PathBuf {
    base.unwrap_or_else(|| PathBuf::from(".")).join("studia")
}

pub fn default_config_path() -> PathBuf {
    studia_dir(dirs::config_dir()).join(CONFIG_FILE_NAME)
}

pub fn default_store_path() -> PathBuf {
    studia_dir(dirs::data_dir()).join(STORE_FILE_NAME)
}

pub fn default_cache_path() -> PathBuf {
    studia_dir(dirs::data_dir()).join(CACHE_FILE_NAME)
}

impl CliConfig {
    pub fn load() -> Result<Self, String> {
        Self::load_from_path(&default_config_path())
    }

    pub fn load_from_path(path: &Path) -> Result<Self, String> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path)
            .map_err(|error| format!("Failed to read config at {}: {}", path.display(), error))?;
        let mut config = serde_json::from_str::<Self>(&raw)
            .map_err(|error| format!("Failed to parse config at {}: {}", path.display(), error))?;
        config.normalize();
        Ok(config)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<(), String> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|error| {
                format!(
                    "Failed to create config directory {}: {}",
                    parent.display(),
                    error
                )
            })?;
        }

        let mut normalized = self.clone();
        normalized.normalize();
        let serialized = serde_json::to_string_pretty(&normalized)
            .map_err(|error| format!("Failed to serialize config: {error}"))?;
        std::fs::write(path, serialized)
            .map_err(|error| format!("Failed to write config at {}: {}", path.display(), error))
    }

    /// Explicit value first, then the configured default.
    pub fn resolve_user(&self, explicit: Option<String>) -> Option<String> {
        normalize_text_option(explicit).or_else(|| self.default_user.clone())
    }

    pub fn resolve_store_path(&self, explicit: Option<PathBuf>) -> PathBuf {
        explicit
            .or_else(|| self.store_path.clone())
            .unwrap_or_else(default_store_path)
    }

    pub fn resolve_cache_path(&self, explicit: Option<PathBuf>) -> PathBuf {
        explicit
            .or_else(|| self.cache_path.clone())
            .unwrap_or_else(default_cache_path)
    }

    fn normalize(&mut self) {
        self.default_user = normalize_text_option(self.default_user.take());
        self.store_path = self
            .store_path
            .take()
            .filter(|path| !path.as_os_str().is_empty());
        self.cache_path = self
            .cache_path
            .take()
            .filter(|path| !path.as_os_str().is_empty());
    }
}
