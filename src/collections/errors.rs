//! Collection service error types.

use thiserror::Error;
use uuid::Uuid;

use crate::sandbox::{CompileError, ExecutionError};
use crate::schema::{Issue, SchemaError};
use crate::store::StoreError;

/// Why a user-authored function source was rejected before any write.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FunctionCheckError {
    /// The source failed to compile.
    #[error(transparent)]
    Compile(CompileError),

    /// The source compiled but its default export is not callable.
    #[error("default export is not callable")]
    NotCallable,

    /// The module failed while loading far enough to inspect its export.
    #[error("function failed to load: {0}")]
    Load(ExecutionError),
}

/// Errors surfaced by the collection service.
#[derive(Debug, Error)]
pub enum CollectionError {
    /// The addressed collection does not exist.
    #[error("collection {0} not found")]
    NotFound(Uuid),

    /// The schema failed well-formedness checks.
    #[error("schema not valid: {}", summarize(.0))]
    SchemaNotValid(Vec<Issue>),

    /// The content summary getter was rejected.
    #[error("content summary getter not valid: {0}")]
    ContentSummaryGetterNotValid(FunctionCheckError),

    /// The content blocking keys getter was rejected.
    #[error("content blocking keys getter not valid: {0}")]
    ContentBlockingKeysGetterNotValid(FunctionCheckError),

    /// Malformed schema encountered mid-operation.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// Unexpected repository failure.
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub(crate) fn summarize(issues: &[Issue]) -> String {
    match issues {
        [] => "unknown".to_string(),
        [only] => only.to_string(),
        [first, rest @ ..] => format!("{} (+{} more)", first, rest.len()),
    }
}
