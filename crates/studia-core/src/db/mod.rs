//! Local database for offline writes, cached nodes and preferences

mod cache_repository;
mod connection;
mod migrations;
mod pending_repository;
mod preferences_repository;

pub use cache_repository::{LibSqlNodeCacheRepository, NodeCacheRepository};
pub use connection::Database;
pub use pending_repository::{LibSqlPendingWriteRepository, PendingWriteRepository, PersistedWrite};
pub use preferences_repository::{LibSqlPreferencesRepository, PreferencesRepository};
