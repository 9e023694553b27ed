//! Shared sync status reported to interfaces.

/// Where the client stands relative to the remote store.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncState {
    Offline,
    Syncing,
    Synced,
    Error,
}

impl SyncState {
    /// Derive the state from the client's connection flag and write queue.
    ///
    /// `rejected` is set after the remote store refused a write and cleared by
    /// the next acknowledged one.
    #[must_use]
    pub const fn derive(online: bool, pending_writes: usize, rejected: bool) -> Self {
        if !online {
            Self::Offline
        } else if pending_writes > 0 {
            Self::Syncing
        } else if rejected {
            Self::Error
        } else {
            Self::Synced
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Offline => "offline",
            Self::Syncing => "syncing",
            Self::Synced => "synced",
            Self::Error => "error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_prefers_offline_then_queue() {
        assert_eq!(SyncState::derive(false, 3, true), SyncState::Offline);
        assert_eq!(SyncState::derive(true, 1, true), SyncState::Syncing);
        assert_eq!(SyncState::derive(true, 0, true), SyncState::Error);
        assert_eq!(SyncState::derive(true, 0, false), SyncState::Synced);
        assert_eq!(SyncState::Synced.label(), "synced");
    }
}
