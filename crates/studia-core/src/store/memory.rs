//! In-process remote backend.
//!
//! Holds the durable tree, enforces per-user access rules, and pushes ordered
//! change events to every connection listening under a written path. The CLI
//! uses it as a file-backed emulator; tests use it as the shared server.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::Value;
use tokio::sync::mpsc;

use super::tree::{empty_tree, get_at, set_at};
use super::{BackendEvent, Connection, PeerId, RemoteBackend, StorePath, WriteId};
use crate::auth::UserId;
use crate::error::{Error, Result};

/// First path segment of every user-scoped subtree.
pub const USER_SCOPE_ROOT: &str = "calendar";

/// Shared in-memory tree acting as the remote store.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    state: Arc<Mutex<BackendState>>,
}

struct BackendState {
    root: Value,
    revision: u64,
    next_peer: PeerId,
    peers: HashMap<PeerId, Peer>,
    revoked: HashSet<UserId>,
}

impl Default for BackendState {
    fn default() -> Self {
        Self {
            root: empty_tree(),
            revision: 0,
            next_peer: 1,
            peers: HashMap::new(),
            revoked: HashSet::new(),
        }
    }
}

struct Peer {
    sink: mpsc::UnboundedSender<BackendEvent>,
    seq: u64,
    listens: HashSet<StorePath>,
}

impl Peer {
    fn push_change(&mut self, path: StorePath, value: Option<Value>) -> Option<u64> {
        self.seq += 1;
        let seq = self.seq;
        self.sink
            .send(BackendEvent::Change { seq, path, value })
            .ok()
            .map(|()| seq)
    }
}

impl MemoryBackend {
    /// An empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A backend seeded with an existing tree.
    #[must_use]
    pub fn from_tree(root: Value) -> Self {
        let backend = Self::new();
        backend.lock().root = super::tree::prune(root);
        backend
    }

    /// Load an emulator file, starting empty when it does not exist.
    pub fn load_file(path: &Path) -> Result<Self> {
        Ok(Self::from_tree(read_tree_file(path)?))
    }

    /// Re-read an emulator file rewritten by another process and push the
    /// new values to every listener.
    pub fn reload_file(&self, path: &Path) -> Result<()> {
        self.replace_tree(read_tree_file(path)?);
        Ok(())
    }

    /// Swap in a whole new tree and notify every listener.
    pub fn replace_tree(&self, root: Value) {
        let mut state = self.lock();
        state.root = super::tree::prune(root);
        state.revision += 1;
        state.broadcast(&StorePath::root());
    }

    /// Write the whole tree to an emulator file.
    pub fn save_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let payload = serde_json::to_string_pretty(&self.tree())?;
        std::fs::write(path, payload)?;
        Ok(())
    }

    /// Copy of the full tree.
    #[must_use]
    pub fn tree(&self) -> Value {
        self.lock().root.clone()
    }

    /// Overwrite a node directly, bypassing access rules and notifications.
    ///
    /// Simulates data written by older app versions or other tools.
    pub fn seed(&self, path: &StorePath, value: Value) {
        let mut state = self.lock();
        set_at(&mut state.root, path, Some(value));
        state.revision += 1;
    }

    /// Deny every further request made as `user`.
    pub fn revoke(&self, user: &UserId) {
        tracing::warn!("Revoking store access for {user:?}");
        self.lock().revoked.insert(user.clone());
    }

    /// Undo `revoke`.
    pub fn restore(&self, user: &UserId) {
        self.lock().revoked.remove(user);
    }

    /// Number of live listens across all connections.
    #[must_use]
    pub fn listen_count(&self) -> usize {
        self.lock().peers.values().map(|peer| peer.listens.len()).sum()
    }

    /// Monotonic count of applied writes.
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.lock().revision
    }

    fn lock(&self) -> MutexGuard<'_, BackendState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn read_tree_file(path: &Path) -> Result<Value> {
    if !path.exists() {
        return Ok(empty_tree());
    }
    let raw = std::fs::read_to_string(path)?;
    if raw.trim().is_empty() {
        return Ok(empty_tree());
    }
    Ok(serde_json::from_str(&raw)?)
}

impl BackendState {
    fn authorize(&self, auth: Option<&UserId>, path: &StorePath) -> Result<()> {
        let Some(user) = auth else {
            return Err(Error::PermissionDenied(format!("{path} (unauthenticated)")));
        };
        if self.revoked.contains(user) {
            return Err(Error::PermissionDenied(path.to_string()));
        }
        match path.segments() {
            [root, owner, ..] if root == USER_SCOPE_ROOT && owner == user.as_str() => Ok(()),
            _ => Err(Error::PermissionDenied(path.to_string())),
        }
    }

    fn broadcast(&mut self, written: &StorePath) {
        let root = &self.root;
        let mut closed = Vec::new();
        for (peer_id, peer) in &mut self.peers {
            let targets = peer
                .listens
                .iter()
                .filter(|listen| listen.overlaps(written))
                .map(|listen| listen.deeper(written).clone())
                .collect::<HashSet<_>>();
            for target in targets {
                let value = get_at(root, &target).cloned();
                if peer.push_change(target, value).is_none() {
                    closed.push(*peer_id);
                    break;
                }
            }
        }
        for peer_id in closed {
            tracing::debug!("Dropping closed connection {peer_id}");
            self.peers.remove(&peer_id);
        }
    }
}

impl RemoteBackend for MemoryBackend {
    fn connect(&self) -> Connection {
        let (sink, events) = mpsc::unbounded_channel();
        let mut state = self.lock();
        let peer = state.next_peer;
        state.next_peer += 1;
        state.peers.insert(
            peer,
            Peer {
                sink,
                seq: 0,
                listens: HashSet::new(),
            },
        );
        tracing::debug!("Connection {peer} attached");
        Connection { peer, events }
    }

    async fn listen(&self, peer: PeerId, auth: Option<&UserId>, path: &StorePath) -> Result<u64> {
        let mut state = self.lock();
        state.authorize(auth, path)?;
        let value = get_at(&state.root, path).cloned();
        let connection = state.peers.get_mut(&peer).ok_or(Error::NetworkUnavailable)?;
        connection.listens.insert(path.clone());
        connection
            .push_change(path.clone(), value)
            .ok_or(Error::NetworkUnavailable)
    }

    fn unlisten(&self, peer: PeerId, path: &StorePath) {
        if let Some(connection) = self.lock().peers.get_mut(&peer) {
            connection.listens.remove(path);
        }
    }

    async fn fetch(&self, auth: Option<&UserId>, path: &StorePath) -> Result<Option<Value>> {
        let state = self.lock();
        state.authorize(auth, path)?;
        Ok(get_at(&state.root, path).cloned())
    }

    async fn store(
        &self,
        peer: PeerId,
        auth: Option<&UserId>,
        write: WriteId,
        path: &StorePath,
        value: Option<Value>,
    ) -> Result<()> {
        let mut state = self.lock();
        state.authorize(auth, path)?;
        if !state.peers.contains_key(&peer) {
            return Err(Error::NetworkUnavailable);
        }

        set_at(&mut state.root, path, value);
        state.revision += 1;
        state.broadcast(path);

        if let Some(connection) = state.peers.get_mut(&peer) {
            connection.seq += 1;
            let seq = connection.seq;
            // A closed connection just misses the ack; the write is applied.
            let _ = connection.sink.send(BackendEvent::Ack { seq, write });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn user(id: &str) -> UserId {
        UserId::new(id).unwrap()
    }

    fn path(raw: &str) -> StorePath {
        StorePath::parse(raw).unwrap()
    }

    #[tokio::test]
    async fn store_is_scoped_to_the_callers_subtree() {
        let backend = MemoryBackend::new();
        let connection = backend.connect();
        let alice = user("alice");

        backend
            .store(
                connection.peer,
                Some(&alice),
                WriteId::new(),
                &path("calendar/alice/20240101/memo"),
                Some(json!("ok")),
            )
            .await
            .unwrap();

        let denied = backend
            .store(
                connection.peer,
                Some(&alice),
                WriteId::new(),
                &path("calendar/bob/20240101/memo"),
                Some(json!("nope")),
            )
            .await;
        assert!(matches!(denied, Err(Error::PermissionDenied(_))));

        let anonymous = backend.fetch(None, &path("calendar/alice")).await;
        assert!(matches!(anonymous, Err(Error::PermissionDenied(_))));
        assert!(matches!(
            backend.fetch(Some(&alice), &StorePath::root()).await,
            Err(Error::PermissionDenied(_))
        ));
    }

    #[tokio::test]
    async fn revoked_users_are_denied() {
        let backend = MemoryBackend::new();
        let alice = user("alice");
        backend.revoke(&alice);
        let result = backend.fetch(Some(&alice), &path("calendar/alice")).await;
        assert!(matches!(result, Err(Error::PermissionDenied(_))));

        backend.restore(&alice);
        assert_eq!(
            backend.fetch(Some(&alice), &path("calendar/alice")).await.unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn listeners_receive_initial_value_then_changes_in_order() {
        let backend = MemoryBackend::from_tree(json!({
            "calendar": { "alice": { "20240101": { "memo": "first" } } }
        }));
        let alice = user("alice");
        let mut watcher = backend.connect();
        let writer = backend.connect();
        let day = path("calendar/alice/20240101");

        let seq = backend.listen(watcher.peer, Some(&alice), &day).await.unwrap();
        assert_eq!(seq, 1);

        backend
            .store(
                writer.peer,
                Some(&alice),
                WriteId::new(),
                &day.child("memo").unwrap(),
                Some(json!("second")),
            )
            .await
            .unwrap();

        assert_eq!(
            watcher.events.recv().await.unwrap(),
            BackendEvent::Change {
                seq: 1,
                path: day.clone(),
                value: Some(json!({ "memo": "first" })),
            }
        );
        assert_eq!(
            watcher.events.recv().await.unwrap(),
            BackendEvent::Change {
                seq: 2,
                path: day.child("memo").unwrap(),
                value: Some(json!("second")),
            }
        );
    }

    #[tokio::test]
    async fn writer_gets_an_ack_and_unlisten_stops_changes() {
        let backend = MemoryBackend::new();
        let alice = user("alice");
        let mut connection = backend.connect();
        let day = path("calendar/alice/20240101");

        backend.listen(connection.peer, Some(&alice), &day).await.unwrap();
        assert_eq!(backend.listen_count(), 1);
        backend.unlisten(connection.peer, &day);
        assert_eq!(backend.listen_count(), 0);

        let write = WriteId::new();
        backend
            .store(connection.peer, Some(&alice), write, &day, Some(json!({ "memo": "x" })))
            .await
            .unwrap();

        // Initial listen value, then only the ack.
        assert_eq!(connection.events.recv().await.unwrap().seq(), 1);
        assert_eq!(
            connection.events.recv().await.unwrap(),
            BackendEvent::Ack { seq: 2, write }
        );
        assert_eq!(backend.revision(), 1);
    }

    #[tokio::test]
    async fn replacing_the_tree_notifies_listeners() {
        let backend = MemoryBackend::new();
        let alice = user("alice");
        let mut watcher = backend.connect();
        let memo = path("calendar/alice/20240101/memo");

        backend.listen(watcher.peer, Some(&alice), &memo).await.unwrap();
        backend.replace_tree(json!({
            "calendar": { "alice": { "20240101": { "memo": "from disk" } } }
        }));

        assert_eq!(watcher.events.recv().await.unwrap().seq(), 1);
        assert_eq!(
            watcher.events.recv().await.unwrap(),
            BackendEvent::Change {
                seq: 2,
                path: memo,
                value: Some(json!("from disk")),
            }
        );
    }

    #[test]
    fn emulator_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("store.json");
        let backend = MemoryBackend::new();
        backend.seed(&path("calendar/alice/20240101/memo"), json!("saved"));
        backend.save_file(&file).unwrap();

        let loaded = MemoryBackend::load_file(&file).unwrap();
        assert_eq!(loaded.tree(), backend.tree());
        assert_eq!(
            MemoryBackend::load_file(&dir.path().join("missing.json"))
                .unwrap()
                .tree(),
            empty_tree()
        );
    }
}
