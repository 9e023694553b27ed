use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] studia_core::Error),
    #[error(transparent)]
    Commit(#[from] studia_core::view_model::CommitError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("No note content provided")]
    EmptyContent,
    #[error("Edited note content cannot be empty")]
    EmptyEditedContent,
    #[error("Invalid date '{0}': expected YYYYMMDD, YYYY-MM-DD, today, yesterday or tomorrow")]
    InvalidDate(String),
    #[error("No user selected. Pass --user, set STUDIA_USER, or run `studia config set user <ID>`")]
    MissingUser,
    #[error("Refusing to delete every record without --yes")]
    ConfirmationRequired,
    #[error("Editor command failed: {0}")]
    EditorFailed(String),
    #[error("Configuration error: {0}")]
    Config(String),
}
