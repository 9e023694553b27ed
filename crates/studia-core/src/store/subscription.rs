//! Live listener handles

use std::sync::Weak;

use serde_json::Value;
use tokio::sync::mpsc;

use super::StorePath;

/// Value of a subscribed node at one point in time. `None` means absent.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub path: StorePath,
    pub value: Option<Value>,
}

impl Snapshot {
    #[must_use]
    pub const fn exists(&self) -> bool {
        self.value.is_some()
    }
}

/// Something that owns listener registrations and can drop one by id.
pub(crate) trait ListenerRegistry: Send + Sync {
    fn remove_listener(&self, id: u64);
}

/// Handle to a live subscription.
///
/// Snapshots arrive in the order the client observed them. Dropping the
/// handle (or calling [`Subscription::unsubscribe`]) stops delivery
/// immediately; nothing queued for it is observed afterwards.
pub struct Subscription {
    id: u64,
    path: StorePath,
    receiver: mpsc::UnboundedReceiver<Snapshot>,
    registry: Weak<dyn ListenerRegistry>,
}

impl Subscription {
    pub(crate) fn new(
        id: u64,
        path: StorePath,
        receiver: mpsc::UnboundedReceiver<Snapshot>,
        registry: Weak<dyn ListenerRegistry>,
    ) -> Self {
        Self {
            id,
            path,
            receiver,
            registry,
        }
    }

    #[must_use]
    pub const fn path(&self) -> &StorePath {
        &self.path
    }

    /// Wait for the next snapshot. `None` once the client is gone.
    pub async fn next(&mut self) -> Option<Snapshot> {
        self.receiver.recv().await
    }

    /// The next already-delivered snapshot, without waiting.
    pub fn try_next(&mut self) -> Option<Snapshot> {
        self.receiver.try_recv().ok()
    }

    /// Drain everything already delivered and keep the newest.
    pub fn latest(&mut self) -> Option<Snapshot> {
        let mut latest = None;
        while let Some(snapshot) = self.try_next() {
            latest = Some(snapshot);
        }
        latest
    }

    /// Stop delivery. Same as dropping the handle.
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.receiver.close();
        if let Some(registry) = self.registry.upgrade() {
            registry.remove_listener(self.id);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Recorder {
        removed: Mutex<Vec<u64>>,
    }

    impl ListenerRegistry for Recorder {
        fn remove_listener(&self, id: u64) {
            self.removed.lock().unwrap().push(id);
        }
    }

    #[tokio::test]
    async fn drop_unregisters_and_latest_keeps_newest() {
        let recorder = Arc::new(Recorder::default());
        let registry: Arc<dyn ListenerRegistry> = recorder.clone();
        let (sender, receiver) = mpsc::unbounded_channel();
        let path = StorePath::parse("calendar/u1/20240101").unwrap();
        let mut subscription =
            Subscription::new(7, path.clone(), receiver, Arc::downgrade(&registry));

        for memo in ["a", "b"] {
            sender
                .send(Snapshot {
                    path: path.clone(),
                    value: Some(serde_json::json!({ "memo": memo })),
                })
                .unwrap();
        }
        let latest = subscription.latest().unwrap();
        assert_eq!(latest.value, Some(serde_json::json!({ "memo": "b" })));
        assert!(subscription.try_next().is_none());

        subscription.unsubscribe();
        assert_eq!(*recorder.removed.lock().unwrap(), vec![7]);
        assert!(sender.send(Snapshot { path, value: None }).is_err());
    }
}
