//! Collection lifecycle.
//!
//! Creation is check-then-write: the schema must be well formed and every
//! attached function source must compile and expose a callable default export
//! before any row is inserted. Deletion cascades through documents, version
//! chains, and owned files.

use std::sync::Arc;

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::files::FileOwner;
use crate::sandbox::{CompiledModule, SandboxEngine, SourceModule};
use crate::schema::{check_schema, codegen, Schema, GENERATED_MODULE_NAME};
use crate::store::{
    Collection, CollectionSettings, CollectionVersion, Repositories, StoreError,
};

use super::errors::{CollectionError, FunctionCheckError};

/// Compile a user function source against library declarations and verify
/// its default export is callable.
pub fn check_function(
    engine: &dyn SandboxEngine,
    source: &str,
    libraries: &[SourceModule],
) -> Result<CompiledModule, FunctionCheckError> {
    let compiled = engine
        .compile(&SourceModule::main(source), libraries)
        .map_err(FunctionCheckError::Compile)?;
    let callable = engine
        .default_export_is_callable(&compiled)
        .map_err(FunctionCheckError::Load)?;
    if !callable {
        return Err(FunctionCheckError::NotCallable);
    }
    Ok(compiled)
}

/// Creates, reads, and deletes collections.
#[derive(Clone)]
pub struct CollectionService {
    repos: Repositories,
    engine: Arc<dyn SandboxEngine>,
}

impl CollectionService {
    /// Build a collection service.
    pub fn new(repos: Repositories, engine: Arc<dyn SandboxEngine>) -> Self {
        Self { repos, engine }
    }

    /// Create a collection with its initial version.
    ///
    /// Nothing is written unless the schema is well formed and every supplied
    /// function source passes compile and callability checks.
    pub async fn create_collection(
        &self,
        schema: Schema,
        settings: CollectionSettings,
    ) -> Result<Collection, CollectionError> {
        let issues = check_schema(&schema);
        if !issues.is_empty() {
            return Err(CollectionError::SchemaNotValid(issues));
        }

        let declarations = codegen(&schema)?;
        let libraries = [SourceModule::new(GENERATED_MODULE_NAME, declarations)];
        check_function(
            self.engine.as_ref(),
            &settings.content_summary_getter,
            &libraries,
        )
        .map_err(CollectionError::ContentSummaryGetterNotValid)?;
        if let Some(source) = &settings.content_blocking_keys_getter {
            check_function(self.engine.as_ref(), source, &libraries)
                .map_err(CollectionError::ContentBlockingKeysGetterNotValid)?;
        }

        let version = CollectionVersion {
            id: Uuid::new_v4(),
            collection_id: Uuid::new_v4(),
            previous_version_id: None,
            schema,
            settings,
            created_at: Utc::now(),
        };
        let collection = Collection {
            id: version.collection_id,
            latest_version_id: version.id,
            created_at: version.created_at,
        };
        self.repos.collection_versions.insert(version).await?;
        self.repos.collections.insert(collection.clone()).await?;

        info!(collection_id = %collection.id, "collection created");
        Ok(collection)
    }

    /// Look up a collection.
    pub async fn get_collection(&self, id: Uuid) -> Result<Collection, CollectionError> {
        self.repos
            .collections
            .find(id)
            .await?
            .ok_or(CollectionError::NotFound(id))
    }

    /// The latest version node of a collection.
    pub async fn latest_version(
        &self,
        id: Uuid,
    ) -> Result<CollectionVersion, CollectionError> {
        let collection = self.get_collection(id).await?;
        self.repos
            .collection_versions
            .find(collection.latest_version_id)
            .await?
            .ok_or(CollectionError::Store(StoreError::NotFound(
                collection.latest_version_id,
            )))
    }

    /// Delete a collection with all its documents, version chains, and owned
    /// files.
    pub async fn delete_collection(&self, id: Uuid) -> Result<(), CollectionError> {
        let collection = self.get_collection(id).await?;

        let documents = self.repos.documents.find_all_where_collection(id).await?;
        for document in &documents {
            for version in self
                .repos
                .document_versions
                .find_all_where_document(document.id)
                .await?
            {
                self.repos.document_versions.delete(version.id).await?;
            }
            for file in self
                .repos
                .files
                .find_all_where_owner(FileOwner::Document(document.id))
                .await?
            {
                self.repos.files.delete(file.id).await?;
            }
            self.repos.documents.delete(document.id).await?;
        }
        for version in self
            .repos
            .collection_versions
            .find_all_where_collection(id)
            .await?
        {
            self.repos.collection_versions.delete(version.id).await?;
        }
        self.repos.collections.delete(collection.id).await?;

        info!(collection_id = %id, documents = documents.len(), "collection deleted");
        Ok(())
    }
}
