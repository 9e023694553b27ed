//! Remote tree store: backend seam, in-process backend, and sync client

mod client;
mod memory;
mod path;
mod subscription;
pub mod tree;

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::auth::UserId;
use crate::error::Result;

pub use client::{SyncClient, WriteAck, WriteFailure};
pub use memory::{MemoryBackend, USER_SCOPE_ROOT};
pub use path::StorePath;
pub use subscription::{Snapshot, Subscription};

/// Identifies one client connection at the backend.
pub type PeerId = u64;

/// Id of a single queued write, time-sortable (UUID v7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WriteId(Uuid);

impl WriteId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    #[must_use]
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for WriteId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for WriteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for WriteId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Ordered event pushed from the backend to one connection.
///
/// `seq` increases by one per event on a given connection.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendEvent {
    /// New value of a node the connection listens to (or lies under)
    Change {
        seq: u64,
        path: StorePath,
        value: Option<Value>,
    },
    /// A write issued by this connection was applied
    Ack { seq: u64, write: WriteId },
}

impl BackendEvent {
    #[must_use]
    pub const fn seq(&self) -> u64 {
        match self {
            Self::Change { seq, .. } | Self::Ack { seq, .. } => *seq,
        }
    }
}

/// A registered connection and its event stream.
#[derive(Debug)]
pub struct Connection {
    pub peer: PeerId,
    pub events: mpsc::UnboundedReceiver<BackendEvent>,
}

/// The remote side of the store.
///
/// Events for a connection are delivered in the order the backend applied
/// them, and the initial value of a listen is ordered with every change.
#[allow(async_fn_in_trait)]
pub trait RemoteBackend: Clone + Send + Sync + 'static {
    /// Register a new connection.
    fn connect(&self) -> Connection;

    /// Start pushing changes under `path`. Returns the `seq` of the event
    /// carrying the node's current value.
    async fn listen(&self, peer: PeerId, auth: Option<&UserId>, path: &StorePath) -> Result<u64>;

    /// Stop pushing changes under `path`. Unknown listens are ignored.
    fn unlisten(&self, peer: PeerId, path: &StorePath);

    /// Read the current value without listening.
    async fn fetch(&self, auth: Option<&UserId>, path: &StorePath) -> Result<Option<Value>>;

    /// Replace the node at `path` (`None` removes it) and acknowledge `write`.
    async fn store(
        &self,
        peer: PeerId,
        auth: Option<&UserId>,
        write: WriteId,
        path: &StorePath,
        value: Option<Value>,
    ) -> Result<()>;
}
