//! Error types for gardener_core operations.

use crate::vcs::VcsError;
use std::path::PathBuf;
use thiserror::Error;

/// Core error type for gardener_core operations.
#[derive(Error, Debug)]
pub enum GardenerError {
    /// I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The state store rejected a statement.
    #[error("state store error: {0}")]
    Store(#[from] rusqlite::Error),

    /// The state store stayed busy for every retry attempt.
    #[error("state store busy: {operation} gave up after {attempts} attempt(s)")]
    StoreBusy {
        /// Name of the store operation that was retried
        operation: &'static str,
        /// Number of attempts made
        attempts: u32,
    },

    /// The state store holds data that cannot be interpreted.
    #[error("state store corrupted: {0}")]
    StoreCorrupted(String),

    /// The on-disk schema was written by an incompatible version.
    #[error("state store schema version {found} does not match expected {expected}")]
    SchemaVersionMismatch {
        /// Version found in the store
        found: u32,
        /// Version this build understands
        expected: u32,
    },

    /// Configuration error (loading, parsing, invalid values).
    #[error("configuration error: {0}")]
    Config(String),

    /// A path was rejected before any write happened.
    #[error("invalid path '{path}': {reason}")]
    InvalidPath {
        /// The offending path as given
        path: String,
        /// Why it was rejected
        reason: String,
    },

    /// A provenance source whose tag would not parse back.
    #[error("invalid provenance source: {0}")]
    InvalidSource(String),

    /// A version-control write failed.
    #[error(transparent)]
    Vcs(#[from] VcsError),

    /// The note classifier failed or returned an unusable decision.
    #[error("classifier error: {0}")]
    Classifier(String),

    /// Serialization error for stored JSON columns.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Inbox note exceeds the configured size limit.
    #[error("note too large: {size} bytes exceeds limit of {limit} bytes")]
    NoteTooLarge {
        /// Actual size of the note
        size: u64,
        /// Maximum allowed size
        limit: u64,
    },

    /// The data directory has not been initialized.
    #[error("not a knowledge base: {} (missing .gardener)", .0.display())]
    NotInitialized(PathBuf),

    /// The data directory was already initialized.
    #[error("knowledge base already initialized at {}", .0.display())]
    AlreadyInitialized(PathBuf),
}

impl GardenerError {
    /// Returns a user-friendly recovery suggestion for the error, if available.
    pub fn recovery_suggestion(&self) -> Option<&'static str> {
        match self {
            Self::StoreBusy { .. } => Some(
                "Another process is holding the state store. Retry, or raise [store] max_attempts in .gardener/config.toml.",
            ),
            Self::StoreCorrupted(_) => {
                Some("Run 'gardener verify' to inspect the state store. It is never repaired automatically.")
            }
            Self::SchemaVersionMismatch { .. } => Some(
                "The state store was written by a different version. Move .gardener/state.db aside to start fresh.",
            ),
            Self::NotInitialized(_) => Some("Run 'gardener init' in the data directory first."),
            Self::Config(_) => Some("Check .gardener/config.toml for syntax errors."),
            Self::Vcs(VcsError::Unavailable(_)) => {
                Some("Install git or set [vcs] binary in .gardener/config.toml.")
            }
            Self::NoteTooLarge { .. } => Some("Split the note or raise [ingest] max_note_bytes."),
            _ => None,
        }
    }

    /// Whether this error came from SQLite lock contention.
    pub fn is_busy(&self) -> bool {
        match self {
            Self::StoreBusy { .. } => true,
            Self::Store(err) => is_busy_error(err),
            _ => false,
        }
    }
}

/// Classifies SQLite BUSY/LOCKED failures.
pub(crate) fn is_busy_error(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(inner, _)
            if matches!(
                inner.code,
                rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
            )
    )
}

/// Convenience Result type for gardener_core operations.
pub type Result<T> = std::result::Result<T, GardenerError>;
