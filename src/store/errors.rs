//! Store error types.

use thiserror::Error;
use uuid::Uuid;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors surfaced by repositories and the version store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The addressed entity does not exist.
    #[error("entity {0} not found")]
    NotFound(Uuid),

    /// The expected latest version id no longer matches: another writer won
    /// the race. Nothing was written.
    #[error("version conflict: expected latest {expected}, found {actual}")]
    VersionConflict {
        /// The latest version id the caller based its write on.
        expected: Uuid,
        /// The actual latest version id at write time.
        actual: Uuid,
    },

    /// Unexpected backend failure (I/O, serialization, transaction abort).
    /// Not a user-input condition; carries its cause for diagnostics.
    #[error("storage backend error: {0}")]
    Backend(String),
}
