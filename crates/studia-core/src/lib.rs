//! studia-core - Core library for Studia
//!
//! A per-day study calendar: each signed-in user has one record per date
//! holding subject notes, a memo and reminders. This crate keeps those
//! records synchronized with a remote tree store, works offline with a
//! replayed write queue, and holds the day screen's view-model.

pub mod auth;
pub mod config;
pub mod connectivity;
pub mod date_key;
pub mod db;
pub mod error;
pub mod export;
pub mod models;
pub mod reconcile;
pub mod repository;
pub mod state;
pub mod store;
pub mod util;
pub mod view_model;

pub use auth::{Reauthenticator, SessionHandle, UserId};
pub use config::{ClientConfig, ConfigHandle};
pub use connectivity::{ConnectivityMonitor, ConnectivityWatch};
pub use date_key::{add_days, to_storage_key, DateKey};
pub use error::{Error, Result};
pub use models::{DayRecord, NoteDraft, NoteEntry, SubjectChoice};
pub use reconcile::ReconciliationPolicy;
pub use repository::{DaySubscription, RecordRepository};
pub use state::SyncState;
pub use store::{MemoryBackend, RemoteBackend, StorePath, SyncClient, WriteAck, WriteFailure};
pub use view_model::{DayViewModel, ReplaceOnSnapshot, SnapshotPolicy, ViewState};
