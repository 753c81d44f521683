//! File extraction errors.

use thiserror::Error;

use crate::schema::SchemaError;

/// Result type for file extraction.
pub type FileExtractResult<T> = Result<T, FileExtractError>;

/// Errors raised while walking validated content for file nodes.
///
/// Content is expected to have passed validation first, so every variant
/// here indicates a programmer error or bypassed validation, not a normal
/// user-input path.
#[derive(Debug, Error)]
pub enum FileExtractError {
    /// The guiding schema is malformed.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// A file reference carries an id that is not a uuid.
    #[error("invalid file id '{id}' at {path}")]
    InvalidFileId { path: String, id: String },

    /// An inline file payload is not valid base64.
    #[error("invalid base64 file content at {path}")]
    InvalidContent { path: String },

    /// A file-typed node matches neither file shape.
    #[error("malformed file node at {path}: {message}")]
    MalformedFileNode { path: String, message: String },
}
