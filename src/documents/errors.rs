//! Document service error types.

use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use crate::collections::errors::summarize;
use crate::collections::FunctionCheckError;
use crate::files::FileExtractError;
use crate::sandbox::ExecutionError;
use crate::schema::{Issue, SchemaError};
use crate::store::StoreError;

/// Errors surfaced by the document service.
#[derive(Debug, Error)]
pub enum DocumentError {
    /// The addressed document does not exist.
    #[error("document {0} not found")]
    NotFound(Uuid),

    /// The owning collection does not exist.
    #[error("collection {0} not found")]
    CollectionNotFound(Uuid),

    /// The caller's expected latest version id is stale. Nothing was written.
    #[error("expected latest version {expected}, found {actual}")]
    VersionIdNotMatching {
        /// The version id the caller based its write on.
        expected: Uuid,
        /// The actual latest version id.
        actual: Uuid,
    },

    /// The content does not conform to the collection's schema.
    #[error("content not valid: {}", summarize(.0))]
    ContentNotValid(Vec<Issue>),

    /// Referenced files do not exist or are not owned by the document.
    #[error("files not found: {}", format_ids(.0))]
    FilesNotFound(Vec<Uuid>),

    /// File extraction failed on already-validated content.
    #[error(transparent)]
    FileExtract(#[from] FileExtractError),

    /// The content summary getter was rejected.
    #[error("content summary getter not valid: {0}")]
    SummaryGetterNotValid(FunctionCheckError),

    /// The content summary getter failed at runtime.
    #[error("content summary getter failed: {0}")]
    SummaryFailed(ExecutionError),

    /// The content summary getter returned something other than a string.
    #[error("content summary getter returned a non-string value: {0}")]
    SummaryNotAString(Value),

    /// Malformed schema encountered mid-operation.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// Unexpected repository failure.
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub(crate) fn format_ids(ids: &[Uuid]) -> String {
    ids.iter()
        .map(Uuid::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
