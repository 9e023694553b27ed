//! Error types for studia-core

use thiserror::Error;

/// Result type alias using studia-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in studia-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// No signed-in user is available for a user-scoped operation
    #[error("Not signed in")]
    Unauthenticated,

    /// Signed in, but the remote store rejected access to the path
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// The remote store could not be reached
    #[error("Network unavailable")]
    NetworkUnavailable,

    /// A stored value did not have the expected shape
    #[error("Malformed data at {path}: {reason}")]
    MalformedData { path: String, reason: String },

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// libSQL error
    #[error("libSQL error: {0}")]
    LibSql(#[from] libsql::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Whether retrying the same operation later may succeed.
    ///
    /// Authorization failures are final and must not be retried automatically.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::NetworkUnavailable | Self::Database(_) | Self::LibSql(_) | Self::Io(_)
        )
    }
}
