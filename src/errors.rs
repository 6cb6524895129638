use std::path::PathBuf;
use thiserror::Error;

/// All errors that can occur in pawkv.
#[derive(Debug, Error)]
pub enum PawError {
    // --- Remote store errors ---
    #[error("Remote store unavailable: {0}")]
    RemoteUnavailable(String),

    #[error("Remote store rejected write of '{name}': {reason}")]
    RemoteWriteRejected { name: String, reason: String },

    #[error("Content tag is {0} characters, more than the remote store accepts")]
    PayloadTooLarge(usize),

    #[error("Secret '{0}' not found")]
    SecretNotFound(String),

    #[error("Secret '{0}' already exists in this vault")]
    SecretAlreadyExists(String),

    #[error("Invalid name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    // --- Bulk job errors ---
    #[error("Batch cancelled")]
    BatchCancelled,

    #[error("Batch failed: {0}")]
    BatchFailed(#[source] Box<PawError>),

    #[error("Rollback incomplete ({} item(s) left behind: {}) after: {original}", .remaining.len(), .remaining.join(", "))]
    RollbackIncomplete {
        #[source]
        original: Box<PawError>,
        remaining: Vec<String>,
    },

    #[error("Worker task panicked: {0}")]
    TaskPanicked(String),

    // --- Archive and index errors ---
    #[error("Invalid archive: {0}")]
    Archive(String),

    #[error("Index file error at {path}: {reason}")]
    Index { path: PathBuf, reason: String },

    // --- Config errors ---
    #[error("Config file error: {0}")]
    ConfigError(String),

    // --- IO errors ---
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // --- Serialization errors ---
    #[error("Serialization error: {0}")]
    SerializationError(String),

    // --- CLI errors ---
    #[error("Command failed: {0}")]
    CommandFailed(String),

    #[error("User cancelled operation")]
    UserCancelled,
}

impl PawError {
    /// Returns `true` for failures worth retrying at the store-client level.
    pub fn is_transient(&self) -> bool {
        matches!(self, PawError::RemoteUnavailable(_))
    }

    /// Unwraps `BatchFailed` to the task error that caused it.
    pub fn root_task_error(&self) -> &PawError {
        match self {
            PawError::BatchFailed(inner) => inner.root_task_error(),
            other => other,
        }
    }
}

/// Convenience type alias for pawkv results.
pub type Result<T> = std::result::Result<T, PawError>;
