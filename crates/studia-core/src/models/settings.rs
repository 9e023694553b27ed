//! Local preferences model

use serde::{Deserialize, Serialize};

/// Device-local preferences, stored in the local database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    /// Keep queued writes and cached days on disk so they survive restarts
    pub offline_persistence: bool,
    /// Tutorial screens were dismissed
    pub tutorial_seen: bool,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            offline_persistence: true,
            tutorial_seen: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preferences_default() {
        let preferences = Preferences::default();
        assert!(preferences.offline_persistence);
        assert!(!preferences.tutorial_seen);
    }
}
