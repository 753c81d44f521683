//! Schema migration orchestration.
//!
//! Changing a collection's schema is a five-step run: validate the proposed
//! schema, validate the attached function sources, persist the new collection
//! version, migrate every document's latest content with bounded concurrency,
//! and aggregate the outcome. Per-document failures are recorded and do not
//! abort the other documents, and the new collection version is deliberately
//! left standing when some documents fail: their latest versions simply keep
//! pointing at the old collection version until retried.

use std::sync::Arc;

use futures_util::stream::{self, StreamExt};
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use crate::collections::check_function;
use crate::documents::service::{persist_new_files, prepare_document_content};
use crate::documents::DocumentError;
use crate::sandbox::{CompiledModule, SandboxEngine, SourceModule};
use crate::schema::{check_schema, codegen, Issue, Schema, GENERATED_MODULE_NAME};
use crate::store::{
    Collection, CollectionSettings, CollectionVersion, Document, NewCollectionVersion,
    NewDocumentVersion, Provenance, Repositories, StoreError, VersionStore,
};

use super::errors::{
    DocumentMigrationFailure, FailedDocumentMigration, MigrationError,
};

/// A proposed new collection version.
#[derive(Debug, Clone)]
pub struct NewVersionRequest {
    /// The collection to change.
    pub collection_id: Uuid,
    /// The latest collection version id the proposal was built against.
    pub expected_latest_version_id: Uuid,
    /// The new record type.
    pub schema: Schema,
    /// The new function sources; `settings.migration` transforms old-shape
    /// content into new-shape content.
    pub settings: CollectionSettings,
}

/// Migration tuning knobs.
#[derive(Debug, Clone)]
pub struct MigrationConfig {
    /// How many documents migrate concurrently.
    pub max_concurrency: usize,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self { max_concurrency: 8 }
    }
}

/// Drives collection schema changes and the document migrations they imply.
#[derive(Clone)]
pub struct MigrationOrchestrator {
    repos: Repositories,
    engine: Arc<dyn SandboxEngine>,
    versions: VersionStore,
    config: MigrationConfig,
}

impl MigrationOrchestrator {
    /// Build an orchestrator with default tuning.
    pub fn new(repos: Repositories, engine: Arc<dyn SandboxEngine>) -> Self {
        Self::with_config(repos, engine, MigrationConfig::default())
    }

    /// Build an orchestrator with explicit tuning.
    pub fn with_config(
        repos: Repositories,
        engine: Arc<dyn SandboxEngine>,
        config: MigrationConfig,
    ) -> Self {
        let versions = VersionStore::new(repos.clone());
        Self {
            repos,
            engine,
            versions,
            config,
        }
    }

    /// Create a new collection version and migrate every document to it.
    pub async fn create_new_collection_version(
        &self,
        request: NewVersionRequest,
    ) -> Result<Collection, MigrationError> {
        // Step 1: the proposed schema must be well formed.
        let issues = check_schema(&request.schema);
        if !issues.is_empty() {
            return Err(MigrationError::SchemaNotValid(issues));
        }

        // Step 2: function sources must compile against the new schema's
        // declarations and expose callable default exports. No writes yet.
        let declarations = codegen(&request.schema)?;
        let libraries = [SourceModule::new(GENERATED_MODULE_NAME, declarations)];
        check_function(
            self.engine.as_ref(),
            &request.settings.content_summary_getter,
            &libraries,
        )
        .map_err(MigrationError::ContentSummaryGetterNotValid)?;
        if let Some(source) = &request.settings.content_blocking_keys_getter {
            check_function(self.engine.as_ref(), source, &libraries)
                .map_err(MigrationError::ContentBlockingKeysGetterNotValid)?;
        }
        let migration_fn = match &request.settings.migration {
            Some(source) => Some(
                check_function(self.engine.as_ref(), source, &libraries)
                    .map_err(MigrationError::MigrationFunctionNotValid)?,
            ),
            None => None,
        };

        // Step 3: persist the new collection version.
        let new_version = self
            .versions
            .append_collection_version(
                request.collection_id,
                request.expected_latest_version_id,
                NewCollectionVersion {
                    schema: request.schema,
                    settings: request.settings,
                },
            )
            .await
            .map_err(|err| match err {
                StoreError::NotFound(id) => MigrationError::CollectionNotFound(id),
                StoreError::VersionConflict { expected, actual } => {
                    MigrationError::VersionIdNotMatching { expected, actual }
                }
                other => MigrationError::Store(other),
            })?;
        info!(
            collection_id = %request.collection_id,
            version_id = %new_version.id,
            "collection version created"
        );

        // Step 4: migrate documents with bounded fan-out. Each document's
        // failure is recorded; the others keep going.
        let documents = self
            .repos
            .documents
            .find_all_where_collection(request.collection_id)
            .await?;
        let outcomes: Vec<Result<Option<FailedDocumentMigration>, StoreError>> =
            stream::iter(documents)
                .map(|document| self.migrate_document(document, &new_version, migration_fn.as_ref()))
                .buffer_unordered(self.config.max_concurrency)
                .collect()
                .await;

        let mut failures = Vec::new();
        for outcome in outcomes {
            if let Some(failure) = outcome? {
                warn!(
                    document_id = %failure.document_id,
                    cause = %failure.cause,
                    "document migration failed"
                );
                failures.push(failure);
            }
        }

        // Step 5: aggregate. The new collection version is not rolled back;
        // failed documents stay on the previous version until retried.
        if !failures.is_empty() {
            return Err(MigrationError::MigrationFailed { failures });
        }
        self.repos
            .collections
            .find(request.collection_id)
            .await?
            .ok_or(MigrationError::CollectionNotFound(request.collection_id))
    }

    /// Migrate one document's latest content to the new collection version.
    ///
    /// Without a migration function the existing content is revalidated and
    /// carried forward unchanged.
    async fn migrate_document(
        &self,
        document: Document,
        new_version: &CollectionVersion,
        migration_fn: Option<&CompiledModule>,
    ) -> Result<Option<FailedDocumentMigration>, StoreError> {
        let failed = |cause| {
            Ok(Some(FailedDocumentMigration {
                document_id: document.id,
                cause,
            }))
        };

        let latest = self
            .repos
            .document_versions
            .find(document.latest_version_id)
            .await?
            .ok_or(StoreError::NotFound(document.latest_version_id))?;

        let migrated: Value = match migration_fn {
            Some(compiled) => {
                match self.engine.execute_sync(compiled, &[latest.content]) {
                    Ok(value) => value,
                    Err(err) => return failed(DocumentMigrationFailure::Execution(err)),
                }
            }
            None => latest.content,
        };

        // Migrated content goes through the same pipeline as a user write:
        // validation, inline file conversion, and reference ownership checks.
        let prepared = match prepare_document_content(
            &self.repos,
            &new_version.schema,
            document.id,
            migrated,
        )
        .await
        {
            Ok(prepared) => prepared,
            Err(DocumentError::ContentNotValid(issues)) => {
                return failed(DocumentMigrationFailure::ContentNotValid(issues))
            }
            Err(DocumentError::FilesNotFound(ids)) => {
                return failed(DocumentMigrationFailure::FilesNotFound(ids))
            }
            Err(DocumentError::FileExtract(err)) => {
                return failed(DocumentMigrationFailure::ContentNotValid(vec![
                    Issue::at_root(err.to_string()),
                ]))
            }
            Err(DocumentError::Store(err)) => return Err(err),
            Err(other) => return Err(StoreError::Backend(other.to_string())),
        };
        persist_new_files(&self.repos, document.id, prepared.new_files)
            .await
            .map_err(|err| match err {
                DocumentError::Store(err) => err,
                other => StoreError::Backend(other.to_string()),
            })?;

        let append = self
            .versions
            .append_document_version(
                document.id,
                document.latest_version_id,
                NewDocumentVersion {
                    content: prepared.content,
                    collection_version_id: new_version.id,
                    created_by: Provenance::Migration,
                    remote_id: latest.remote_id,
                },
            )
            .await;
        match append {
            Ok(_) => Ok(None),
            Err(StoreError::VersionConflict { expected, actual }) => {
                failed(DocumentMigrationFailure::VersionConflict { expected, actual })
            }
            Err(other) => Err(other),
        }
    }
}
