//! Migration error types.

use thiserror::Error;
use uuid::Uuid;

use crate::collections::errors::summarize;
use crate::collections::FunctionCheckError;
use crate::documents::errors::format_ids;
use crate::sandbox::ExecutionError;
use crate::schema::{Issue, SchemaError};
use crate::store::StoreError;

/// Why a single document failed to migrate.
#[derive(Debug, Error)]
pub enum DocumentMigrationFailure {
    /// The migration function failed while running on the document's content.
    #[error("migration function failed: {0}")]
    Execution(ExecutionError),

    /// The migrated content does not conform to the new schema.
    #[error("migrated content not valid: {}", summarize(.0))]
    ContentNotValid(Vec<Issue>),

    /// The migrated content references files the document does not own.
    #[error("files not found: {}", format_ids(.0))]
    FilesNotFound(Vec<Uuid>),

    /// Another writer appended to the document mid-migration.
    #[error("version conflict: expected latest {expected}, found {actual}")]
    VersionConflict {
        /// The version the migration was computed from.
        expected: Uuid,
        /// The actual latest version at write time.
        actual: Uuid,
    },
}

/// One document's migration failure, recorded without aborting the rest.
#[derive(Debug, Error)]
#[error("document {document_id}: {cause}")]
pub struct FailedDocumentMigration {
    /// The document that failed.
    pub document_id: Uuid,
    /// What went wrong.
    pub cause: DocumentMigrationFailure,
}

/// Errors surfaced by the migration orchestrator.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// The addressed collection does not exist.
    #[error("collection {0} not found")]
    CollectionNotFound(Uuid),

    /// The proposed schema failed well-formedness checks. Nothing was written.
    #[error("schema not valid: {}", summarize(.0))]
    SchemaNotValid(Vec<Issue>),

    /// The proposed content summary getter was rejected. Nothing was written.
    #[error("content summary getter not valid: {0}")]
    ContentSummaryGetterNotValid(FunctionCheckError),

    /// The proposed content blocking keys getter was rejected. Nothing was
    /// written.
    #[error("content blocking keys getter not valid: {0}")]
    ContentBlockingKeysGetterNotValid(FunctionCheckError),

    /// The proposed migration function was rejected. Nothing was written.
    #[error("migration function not valid: {0}")]
    MigrationFunctionNotValid(FunctionCheckError),

    /// The caller's expected latest collection version id is stale. Nothing
    /// was written.
    #[error("expected latest collection version {expected}, found {actual}")]
    VersionIdNotMatching {
        /// The version id the caller based its change on.
        expected: Uuid,
        /// The actual latest version id.
        actual: Uuid,
    },

    /// Some documents failed to migrate. The new collection version stands;
    /// failed documents keep their previous versions.
    #[error("{} document(s) failed to migrate", .failures.len())]
    MigrationFailed {
        /// Every failed document with its cause.
        failures: Vec<FailedDocumentMigration>,
    },

    /// Malformed schema encountered mid-operation.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// Unexpected repository failure.
    #[error(transparent)]
    Store(#[from] StoreError),
}
