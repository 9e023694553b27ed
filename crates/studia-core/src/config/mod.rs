//! Client configuration.
//!
//! `ClientConfig` is read from a small JSON file (or built from stored
//! preferences) and shared through a `ConfigHandle` so settings such as
//! offline persistence can change while the client is running.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::error::Result;
use crate::models::Preferences;

/// Runtime configuration for the sync client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    /// Persist queued writes and cached days in the local database
    #[serde(default = "default_offline_persistence")]
    pub offline_persistence: bool,
    /// Local database location; in-memory when unset
    #[serde(default)]
    pub cache_path: Option<PathBuf>,
}

const fn default_offline_persistence() -> bool {
    true
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            offline_persistence: default_offline_persistence(),
            cache_path: None,
        }
    }
}

impl ClientConfig {
    /// Apply stored device preferences on top of this config.
    #[must_use]
    pub const fn with_preferences(mut self, preferences: &Preferences) -> Self {
        self.offline_persistence = preferences.offline_persistence;
        self
    }
}

/// Parse a client config from a raw JSON payload.
pub fn parse_client_config(payload: &str) -> Result<ClientConfig> {
    Ok(serde_json::from_str(payload)?)
}

/// Load a client config file, falling back to defaults when it does not exist.
pub fn load_client_config(path: &Path) -> Result<ClientConfig> {
    if !path.exists() {
        return Ok(ClientConfig::default());
    }
    let raw = std::fs::read_to_string(path)?;
    parse_client_config(&raw)
}

/// Live, shareable configuration value.
#[derive(Clone, Debug)]
pub struct ConfigHandle {
    sender: Arc<watch::Sender<ClientConfig>>,
}

impl ConfigHandle {
    #[must_use]
    pub fn new(config: ClientConfig) -> Self {
        let (sender, _) = watch::channel(config);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Snapshot of the current configuration.
    #[must_use]
    pub fn current(&self) -> ClientConfig {
        self.sender.borrow().clone()
    }

    #[must_use]
    pub fn offline_persistence(&self) -> bool {
        self.sender.borrow().offline_persistence
    }

    /// Modify the configuration in place. Returns whether anything changed.
    pub fn update(&self, modify: impl FnOnce(&mut ClientConfig)) -> bool {
        self.sender.send_if_modified(|config| {
            let before = config.clone();
            modify(config);
            *config != before
        })
    }

    pub fn set_offline_persistence(&self, enabled: bool) -> bool {
        let changed = self.update(|config| config.offline_persistence = enabled);
        if changed {
            tracing::info!("Offline persistence {}", if enabled { "enabled" } else { "disabled" });
        }
        changed
    }

    /// Receiver notified on every change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ClientConfig> {
        self.sender.subscribe()
    }
}

impl Default for ConfigHandle {
    fn default() -> Self {
        Self::new(ClientConfig::default())
    }
}
