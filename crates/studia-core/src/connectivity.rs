//! Online/offline flag of the remote connection

use serde_json::Value;

use crate::error::Result;
use crate::store::{MemoryBackend, RemoteBackend, StorePath, Subscription, SyncClient};

/// Observes the reserved `.info/connected` path.
///
/// Purely informational: writes never wait on it.
pub struct ConnectivityMonitor<B: RemoteBackend = MemoryBackend> {
    client: SyncClient<B>,
}

impl<B: RemoteBackend> ConnectivityMonitor<B> {
    #[must_use]
    pub const fn new(client: SyncClient<B>) -> Self {
        Self { client }
    }

    /// Current flag without subscribing.
    #[must_use]
    pub fn is_online(&self) -> bool {
        self.client.is_online()
    }

    /// Start watching. The current flag is delivered first, then every transition.
    pub async fn observe(&self) -> Result<ConnectivityWatch> {
        let inner = self.client.subscribe(&StorePath::connected()).await?;
        Ok(ConnectivityWatch { inner })
    }
}

/// Stream of connectivity flags. Dropping it stops delivery.
#[derive(Debug)]
pub struct ConnectivityWatch {
    inner: Subscription,
}

impl ConnectivityWatch {
    /// Wait for the next flag. `None` once the client is gone.
    pub async fn changed(&mut self) -> Option<bool> {
        let snapshot = self.inner.next().await?;
        Some(matches!(snapshot.value, Some(Value::Bool(true))))
    }

    /// Stop delivery immediately.
    pub fn unsubscribe(self) {}
}
