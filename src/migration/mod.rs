//! Collection schema migration.
//!
//! This module provides:
//! - `orchestrator` - the five-step schema change run with bounded document
//!   fan-out
//! - `errors` - the migration failure taxonomy, including per-document
//!   failure records

pub mod errors;
pub mod orchestrator;

pub use errors::{DocumentMigrationFailure, FailedDocumentMigration, MigrationError};
pub use orchestrator::{MigrationConfig, MigrationOrchestrator, NewVersionRequest};
