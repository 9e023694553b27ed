//! Client half of the store.
//!
//! `SyncClient` keeps a local copy of every node it has seen, overlays writes
//! that are still queued, and fans snapshots out to subscribers. Writes issued
//! while offline are queued and replayed in issue order once the connection
//! returns; a replay the remote store rejects is rolled back locally and
//! reported on the write-failure channel.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{broadcast, mpsc, watch};

use super::subscription::ListenerRegistry;
use super::tree::{empty_tree, get_at, is_absent, prune, set_at};
use super::{
    BackendEvent, MemoryBackend, PeerId, RemoteBackend, Snapshot, StorePath, Subscription,
    WriteId,
};
use crate::auth::{SessionHandle, UserId};
use crate::config::{ClientConfig, ConfigHandle};
use crate::db::{
    Database, LibSqlNodeCacheRepository, LibSqlPendingWriteRepository, NodeCacheRepository,
    PendingWriteRepository, PersistedWrite,
};
use crate::error::{Error, Result};
use crate::state::SyncState;
use crate::util::compact_text;

/// Upper bound on waiting for a listen's initial value before falling back to
/// the local copy.
const LISTEN_READY_TIMEOUT: Duration = Duration::from_secs(10);

const FAILURE_CHANNEL_CAPACITY: usize = 64;

/// How a write left the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteAck {
    /// Applied by the remote store
    Committed,
    /// Visible locally, waiting for connectivity
    Queued,
}

/// A queued write the remote store refused during replay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteFailure {
    pub path: StorePath,
    pub message: String,
}

#[derive(Debug)]
struct PendingWrite {
    id: WriteId,
    path: StorePath,
    value: Option<Value>,
    sent: bool,
}

struct Listener {
    path: StorePath,
    sink: mpsc::UnboundedSender<Snapshot>,
    last: Option<Value>,
}

#[derive(Debug, Clone, Copy)]
struct ListenEntry {
    count: usize,
    /// Seq of the event carrying the initial remote value; `None` while the
    /// remote listen is in flight.
    ready: Option<u64>,
}

struct ClientState {
    online: bool,
    rejected: bool,
    server: Value,
    pending: VecDeque<PendingWrite>,
    listeners: BTreeMap<u64, Listener>,
    listens: HashMap<StorePath, ListenEntry>,
    next_listener: u64,
}

impl ClientState {
    fn new(server: Value, pending: VecDeque<PendingWrite>) -> Self {
        Self {
            online: false,
            rejected: false,
            server,
            pending,
            listeners: BTreeMap::new(),
            listens: HashMap::new(),
            next_listener: 1,
        }
    }

    /// Server value at `path` with queued writes applied on top.
    fn visible(&self, path: &StorePath) -> Option<Value> {
        if path.is_connected_signal() {
            return Some(Value::Bool(self.online));
        }

        let mut node = get_at(&self.server, path).cloned().unwrap_or_else(empty_tree);
        for write in &self.pending {
            if let Some(rest) = path.strip_prefix(&write.path) {
                node = write
                    .value
                    .as_ref()
                    .and_then(|value| get_at(value, &rest))
                    .cloned()
                    .unwrap_or_else(empty_tree);
            } else if let Some(rest) = write.path.strip_prefix(path) {
                set_at(&mut node, &rest, write.value.clone());
            }
        }
        (!is_absent(&node)).then_some(node)
    }

    fn first_unsent(&self) -> Option<(WriteId, StorePath, Option<Value>)> {
        self.pending
            .iter()
            .find(|write| !write.sent)
            .map(|write| (write.id, write.path.clone(), write.value.clone()))
    }

    fn mark_sent(&mut self, id: WriteId) {
        if let Some(write) = self.pending.iter_mut().find(|write| write.id == id) {
            write.sent = true;
        }
    }

    fn take_pending(&mut self, id: WriteId) -> Option<PendingWrite> {
        let position = self.pending.iter().position(|write| write.id == id)?;
        self.pending.remove(position)
    }

    fn is_unsent(&self, id: WriteId) -> bool {
        self.pending.iter().any(|write| write.id == id && !write.sent)
    }
}

struct Shared<B: RemoteBackend> {
    backend: B,
    peer: PeerId,
    session: SessionHandle,
    config: ConfigHandle,
    database: Option<Arc<Database>>,
    state: Mutex<ClientState>,
    send_gate: tokio::sync::Mutex<()>,
    applied: watch::Sender<u64>,
    sync_state: watch::Sender<SyncState>,
    failures: broadcast::Sender<WriteFailure>,
    /// Receiver created with the channel, so failures from the replay inside
    /// `connect` are kept for the first `write_failures` caller.
    first_failures: Mutex<Option<broadcast::Receiver<WriteFailure>>>,
    listen_generation: watch::Sender<u64>,
    // Dropping this stops the event pump.
    _closed: watch::Sender<()>,
}

/// Cheaply cloneable handle to one connection with the remote store.
pub struct SyncClient<B: RemoteBackend = MemoryBackend> {
    shared: Arc<Shared<B>>,
}

impl<B: RemoteBackend> Clone for SyncClient<B> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<B: RemoteBackend> SyncClient<B> {
    /// Connect without local persistence.
    pub async fn new(backend: B, session: SessionHandle) -> Result<Self> {
        Self::connect(backend, session, ConfigHandle::default(), None).await
    }

    /// Connect, restoring queued writes and cached nodes from `database` when
    /// offline persistence is enabled, then go online.
    pub async fn connect(
        backend: B,
        session: SessionHandle,
        config: ConfigHandle,
        database: Option<Database>,
    ) -> Result<Self> {
        let database = database.map(Arc::new);
        let (server, pending) = match &database {
            Some(db) if config.offline_persistence() => restore(db).await?,
            Some(db) => {
                clear_persisted(db).await?;
                (empty_tree(), VecDeque::new())
            }
            None => (empty_tree(), VecDeque::new()),
        };
        if !pending.is_empty() {
            tracing::info!("Restored {} queued writes", pending.len());
        }

        let connection = backend.connect();
        let (failures, first_failures) = broadcast::channel(FAILURE_CHANNEL_CAPACITY);
        let (closed, closed_rx) = watch::channel(());
        let config_rx = config.subscribe();
        let shared = Arc::new(Shared {
            backend,
            peer: connection.peer,
            session,
            config,
            database,
            state: Mutex::new(ClientState::new(server, pending)),
            send_gate: tokio::sync::Mutex::new(()),
            applied: watch::channel(0).0,
            sync_state: watch::channel(SyncState::Offline).0,
            failures,
            first_failures: Mutex::new(Some(first_failures)),
            listen_generation: watch::channel(0).0,
            _closed: closed,
        });

        tokio::spawn(pump(
            Arc::downgrade(&shared),
            connection.events,
            config_rx,
            closed_rx,
        ));

        let client = Self { shared };
        client.go_online().await;
        Ok(client)
    }

    #[must_use]
    pub fn backend(&self) -> &B {
        &self.shared.backend
    }

    #[must_use]
    pub fn session(&self) -> &SessionHandle {
        &self.shared.session
    }

    #[must_use]
    pub fn config(&self) -> &ConfigHandle {
        &self.shared.config
    }

    #[must_use]
    pub fn is_online(&self) -> bool {
        self.shared.lock().online
    }

    /// Number of writes not yet acknowledged by the remote store.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.shared.lock().pending.len()
    }

    #[must_use]
    pub fn sync_state(&self) -> watch::Receiver<SyncState> {
        self.shared.sync_state.subscribe()
    }

    /// Queued writes rejected during replay.
    ///
    /// The first receiver also yields rejections from the replay that ran
    /// while connecting.
    #[must_use]
    pub fn write_failures(&self) -> broadcast::Receiver<WriteFailure> {
        let first = self
            .shared
            .first_failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        first.unwrap_or_else(|| self.shared.failures.subscribe())
    }

    /// Locally known value at `path`, including queued writes.
    #[must_use]
    pub fn cached(&self, path: &StorePath) -> Option<Value> {
        self.shared.lock().visible(path)
    }

    /// Drop the connection. Writes queue up and listeners keep their last value.
    pub fn go_offline(&self) {
        let listens = {
            let mut state = self.shared.lock();
            if !state.online {
                return;
            }
            state.online = false;
            self.shared.notify(&mut state);
            state.listens.keys().cloned().collect::<Vec<_>>()
        };
        for path in &listens {
            self.shared.backend.unlisten(self.shared.peer, path);
        }
        tracing::info!("Went offline");
    }

    /// Reconnect: re-listen every active path, then replay queued writes in
    /// issue order. Returns how many queued writes were sent.
    pub async fn go_online(&self) -> usize {
        let listens = {
            let mut state = self.shared.lock();
            if state.online {
                return 0;
            }
            state.online = true;
            for entry in state.listens.values_mut() {
                entry.ready = None;
            }
            self.shared.notify(&mut state);
            state.listens.keys().cloned().collect::<Vec<_>>()
        };
        tracing::info!("Went online");

        for path in &listens {
            match self.shared.listen_remote(path).await {
                Ok(seq) => self.shared.mark_ready(path, seq),
                Err(error) => {
                    tracing::warn!("Could not resume listening on {path}: {error}");
                    self.shared.mark_ready(path, 0);
                }
            }
        }

        self.shared.drain(None).await.sent
    }

    /// Replace the node at `path`. `None` removes it.
    ///
    /// The new value is visible to local subscribers immediately. Offline, the
    /// write is queued and `WriteAck::Queued` is returned.
    pub async fn set(&self, path: &StorePath, value: Option<Value>) -> Result<WriteAck> {
        if path.is_connected_signal() {
            return Err(Error::InvalidInput(format!("{path} is read-only")));
        }
        let value = value.map(prune).filter(|value| !is_absent(value));
        let id = WriteId::new();
        {
            let mut state = self.shared.lock();
            state.pending.push_back(PendingWrite {
                id,
                path: path.clone(),
                value: value.clone(),
                sent: false,
            });
            self.shared.notify(&mut state);
        }
        self.shared
            .persist_enqueue(&PersistedWrite {
                id,
                path: path.clone(),
                value,
            })
            .await;

        if let Some(outcome) = self.shared.drain(Some(id)).await.target {
            return outcome;
        }
        if self.shared.lock().is_unsent(id) {
            tracing::debug!("Queued write to {path}");
            Ok(WriteAck::Queued)
        } else {
            Ok(WriteAck::Committed)
        }
    }

    /// Remove the node at `path`.
    pub async fn remove(&self, path: &StorePath) -> Result<WriteAck> {
        self.set(path, None).await
    }

    /// Listen to `path`. The first snapshot carries the current value.
    ///
    /// Online, the first snapshot waits for the remote store's value so it is
    /// never staler than the cache. Offline, it comes from the local copy.
    pub async fn subscribe(&self, path: &StorePath) -> Result<Subscription> {
        if !path.is_connected_signal() {
            if let Some(seq) = self.shared.retain_listen(path).await? {
                self.shared.wait_applied(seq).await;
            }
        }

        let (sink, receiver) = mpsc::unbounded_channel();
        let id = {
            let mut state = self.shared.lock();
            let id = state.next_listener;
            state.next_listener += 1;
            let value = state.visible(path);
            let _ = sink.send(Snapshot {
                path: path.clone(),
                value: value.clone(),
            });
            state.listeners.insert(
                id,
                Listener {
                    path: path.clone(),
                    sink,
                    last: value,
                },
            );
            id
        };

        let shared: Arc<dyn ListenerRegistry> = self.shared.clone();
        let registry = Arc::downgrade(&shared);
        Ok(Subscription::new(id, path.clone(), receiver, registry))
    }

    /// Read the current remote value, bypassing the local copy.
    pub async fn fetch_fresh(&self, path: &StorePath) -> Result<Option<Value>> {
        if path.is_connected_signal() {
            return Ok(Some(Value::Bool(self.is_online())));
        }
        if !self.is_online() {
            return Err(Error::NetworkUnavailable);
        }
        self.shared
            .backend
            .fetch(self.shared.current_user().as_ref(), path)
            .await
    }
}

struct DrainOutcome {
    sent: usize,
    target: Option<Result<WriteAck>>,
}

impl<B: RemoteBackend> Shared<B> {
    fn lock(&self) -> MutexGuard<'_, ClientState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn current_user(&self) -> Option<UserId> {
        self.session.current_user()
    }

    /// Push changed values to listeners and refresh the sync state.
    fn notify(&self, state: &mut ClientState) {
        let mut updates = Vec::new();
        for (id, listener) in &state.listeners {
            let value = state.visible(&listener.path);
            if value != listener.last {
                updates.push((*id, value));
            }
        }
        for (id, value) in updates {
            if let Some(listener) = state.listeners.get_mut(&id) {
                let _ = listener.sink.send(Snapshot {
                    path: listener.path.clone(),
                    value: value.clone(),
                });
                listener.last = value;
            }
        }

        let next = SyncState::derive(state.online, state.pending.len(), state.rejected);
        self.sync_state.send_if_modified(|current| {
            let changed = *current != next;
            *current = next;
            changed
        });
    }

    async fn listen_remote(&self, path: &StorePath) -> Result<u64> {
        self.backend
            .listen(self.peer, self.current_user().as_ref(), path)
            .await
    }

    /// Count one more listener on `path`, listening remotely for the first.
    /// Returns the event seq carrying the initial remote value, if any.
    async fn retain_listen(&self, path: &StorePath) -> Result<Option<u64>> {
        let (first, online) = {
            let mut state = self.lock();
            let online = state.online;
            let entry = state
                .listens
                .entry(path.clone())
                .or_insert(ListenEntry {
                    count: 0,
                    ready: None,
                });
            entry.count += 1;
            (entry.count == 1, online)
        };
        if !online {
            return Ok(None);
        }
        if !first {
            return Ok(Some(self.listen_ready(path).await));
        }

        match self.listen_remote(path).await {
            Ok(seq) => {
                self.mark_ready(path, seq);
                Ok(Some(seq))
            }
            Err(Error::NetworkUnavailable) => {
                self.mark_ready(path, 0);
                Ok(None)
            }
            Err(error) => {
                self.mark_ready(path, 0);
                self.release_listen(path);
                Err(error)
            }
        }
    }

    /// Record the initial-value seq of the listen on `path` and wake
    /// subscribers waiting for it. Seq 0 means "use the local copy".
    fn mark_ready(&self, path: &StorePath, seq: u64) {
        if let Some(entry) = self.lock().listens.get_mut(path) {
            entry.ready = Some(seq);
        }
        self.listen_generation
            .send_modify(|generation| *generation = generation.wrapping_add(1));
    }

    /// Wait for the remote listen on `path` started by another subscriber.
    async fn listen_ready(&self, path: &StorePath) -> u64 {
        let mut generation = self.listen_generation.subscribe();
        loop {
            let ready = self.lock().listens.get(path).map(|entry| entry.ready);
            match ready {
                Some(Some(seq)) => return seq,
                None => return 0,
                Some(None) => {}
            }
            let changed = tokio::time::timeout(LISTEN_READY_TIMEOUT, generation.changed()).await;
            if !matches!(changed, Ok(Ok(()))) {
                tracing::warn!("Timed out waiting for the listen on {path}; using cached value");
                return 0;
            }
        }
    }

    fn release_listen(&self, path: &StorePath) {
        let unlisten = {
            let mut state = self.lock();
            let online = state.online;
            match state.listens.get_mut(path) {
                Some(entry) if entry.count > 1 => {
                    entry.count -= 1;
                    false
                }
                Some(_) => {
                    state.listens.remove(path);
                    online
                }
                None => false,
            }
        };
        if unlisten {
            self.backend.unlisten(self.peer, path);
        }
    }

    async fn wait_applied(&self, seq: u64) {
        let mut applied = self.applied.subscribe();
        let ready = tokio::time::timeout(
            LISTEN_READY_TIMEOUT,
            applied.wait_for(|current| *current >= seq),
        )
        .await;
        if ready.is_err() {
            tracing::warn!("Timed out waiting for event {seq}; using cached value");
        }
    }

    /// Send queued writes in order while online. Stops after `until` when given.
    async fn drain(&self, until: Option<WriteId>) -> DrainOutcome {
        let _gate = self.send_gate.lock().await;
        let mut outcome = DrainOutcome {
            sent: 0,
            target: None,
        };

        loop {
            let next = {
                let state = self.lock();
                if !state.online {
                    break;
                }
                state.first_unsent()
            };
            let Some((id, path, value)) = next else {
                break;
            };

            let result = self
                .backend
                .store(self.peer, self.current_user().as_ref(), id, &path, value)
                .await;
            let reached = until == Some(id);
            match result {
                Ok(()) => {
                    self.lock().mark_sent(id);
                    outcome.sent += 1;
                    if reached {
                        outcome.target = Some(Ok(WriteAck::Committed));
                    }
                }
                Err(Error::NetworkUnavailable) => {
                    tracing::debug!("Remote store unreachable; keeping writes queued");
                    break;
                }
                Err(error) => {
                    self.reject(id, &error, !reached).await;
                    if reached {
                        outcome.target = Some(Err(error));
                    }
                }
            }
            if reached {
                break;
            }
        }
        outcome
    }

    /// Roll back a refused write. Replays are reported on the failure channel;
    /// a direct write's caller gets the error instead.
    async fn reject(&self, id: WriteId, error: &Error, replay: bool) {
        let rejected = {
            let mut state = self.lock();
            let rejected = state.take_pending(id);
            if rejected.is_some() {
                state.rejected = true;
                self.notify(&mut state);
            }
            rejected
        };
        let Some(rejected) = rejected else {
            return;
        };

        tracing::warn!("Write to {} rejected: {error}", rejected.path);
        self.persist_remove(id).await;
        if replay {
            let _ = self.failures.send(WriteFailure {
                path: rejected.path,
                message: compact_text(&error.to_string()),
            });
        }
    }

    async fn apply_event(&self, event: BackendEvent) {
        let seq = event.seq();
        match event {
            BackendEvent::Change { path, value, .. } => {
                {
                    let mut state = self.lock();
                    set_at(&mut state.server, &path, value.clone());
                    self.notify(&mut state);
                }
                self.persist_node(&path, value.as_ref()).await;
            }
            BackendEvent::Ack { write, .. } => {
                let acked = {
                    let mut state = self.lock();
                    let acked = state.take_pending(write);
                    if let Some(acked) = &acked {
                        set_at(&mut state.server, &acked.path, acked.value.clone());
                        state.rejected = false;
                        self.notify(&mut state);
                    }
                    acked
                };
                if let Some(acked) = acked {
                    self.persist_remove(write).await;
                    self.persist_node(&acked.path, acked.value.as_ref()).await;
                }
            }
        }
        self.applied.send_replace(seq);
    }

    fn persistent_db(&self) -> Option<&Database> {
        self.database
            .as_deref()
            .filter(|_| self.config.offline_persistence())
    }

    async fn persist_enqueue(&self, write: &PersistedWrite) {
        if let Some(db) = self.persistent_db() {
            if let Err(error) = LibSqlPendingWriteRepository::new(db.connection())
                .enqueue(write)
                .await
            {
                tracing::warn!("Failed to persist queued write: {error}");
            }
        }
    }

    async fn persist_remove(&self, id: WriteId) {
        if let Some(db) = self.persistent_db() {
            if let Err(error) = LibSqlPendingWriteRepository::new(db.connection())
                .remove(id)
                .await
            {
                tracing::warn!("Failed to drop persisted write {id}: {error}");
            }
        }
    }

    async fn persist_node(&self, path: &StorePath, value: Option<&Value>) {
        if let Some(db) = self.persistent_db() {
            if let Err(error) = LibSqlNodeCacheRepository::new(db.connection())
                .put(path, value)
                .await
            {
                tracing::warn!("Failed to cache {path}: {error}");
            }
        }
    }

    /// Bring the disk copy in line with a changed persistence setting.
    async fn apply_persistence(&self, enabled: bool) {
        let Some(db) = self.database.as_deref() else {
            return;
        };
        let result = if enabled {
            let (server, pending) = {
                let state = self.lock();
                let pending = state
                    .pending
                    .iter()
                    .map(|write| PersistedWrite {
                        id: write.id,
                        path: write.path.clone(),
                        value: write.value.clone(),
                    })
                    .collect::<Vec<_>>();
                (state.server.clone(), pending)
            };
            snapshot_to_disk(db, &server, &pending).await
        } else {
            clear_persisted(db).await
        };
        match result {
            Ok(()) => tracing::info!(
                "Offline persistence {}",
                if enabled { "restored" } else { "cleared" }
            ),
            Err(error) => tracing::warn!("Failed to update offline persistence: {error}"),
        }
    }
}

impl<B: RemoteBackend> ListenerRegistry for Shared<B> {
    fn remove_listener(&self, id: u64) {
        let removed = self.lock().listeners.remove(&id);
        if let Some(listener) = removed {
            if !listener.path.is_connected_signal() {
                self.release_listen(&listener.path);
            }
        }
    }
}

impl<B: RemoteBackend> Drop for Shared<B> {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        if state.online {
            for path in state.listens.keys() {
                self.backend.unlisten(self.peer, path);
            }
        }
    }
}

async fn restore(db: &Database) -> Result<(Value, VecDeque<PendingWrite>)> {
    let server = LibSqlNodeCacheRepository::new(db.connection())
        .load_tree()
        .await?;
    let pending = LibSqlPendingWriteRepository::new(db.connection())
        .list()
        .await?
        .into_iter()
        .map(|write| PendingWrite {
            id: write.id,
            path: write.path,
            value: write.value,
            sent: false,
        })
        .collect();
    Ok((server, pending))
}

async fn clear_persisted(db: &Database) -> Result<()> {
    LibSqlPendingWriteRepository::new(db.connection())
        .clear()
        .await?;
    LibSqlNodeCacheRepository::new(db.connection())
        .clear()
        .await
}

async fn snapshot_to_disk(db: &Database, server: &Value, pending: &[PersistedWrite]) -> Result<()> {
    let queue = LibSqlPendingWriteRepository::new(db.connection());
    queue.clear().await?;
    for write in pending {
        queue.enqueue(write).await?;
    }
    LibSqlNodeCacheRepository::new(db.connection())
        .put(&StorePath::root(), Some(server))
        .await
}

/// Apply backend events in arrival order and follow config changes until the
/// client is dropped.
async fn pump<B: RemoteBackend>(
    shared: Weak<Shared<B>>,
    mut events: mpsc::UnboundedReceiver<BackendEvent>,
    mut config: watch::Receiver<ClientConfig>,
    mut closed: watch::Receiver<()>,
) {
    let mut persistence = config.borrow().offline_persistence;
    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                let Some(shared) = shared.upgrade() else { break };
                shared.apply_event(event).await;
            }
            changed = config.changed() => {
                if changed.is_err() {
                    break;
                }
                let enabled = config.borrow_and_update().offline_persistence;
                if enabled != persistence {
                    persistence = enabled;
                    let Some(shared) = shared.upgrade() else { break };
                    shared.apply_persistence(enabled).await;
                }
            }
            _ = closed.changed() => break,
        }
    }
    tracing::debug!("Event pump stopped");
}
