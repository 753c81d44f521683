//! Document lifecycle.
//!
//! All mutations are check-then-write against the owning collection's latest
//! schema: content is validated, inline file payloads are converted to stored
//! files owned by the document, and remaining file references are verified to
//! resolve to files the document owns before any version node is inserted.
//! Concurrent writers are arbitrated by the version store's compare-and-swap.

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tracing::{debug, info};
use uuid::Uuid;

use crate::collections::check_function;
use crate::files::{
    extract_and_convert_proto_files, extract_referenced_file_ids, FileOwner, NewFile,
    StoredFile,
};
use crate::sandbox::{SandboxEngine, SourceModule};
use crate::schema::{codegen, validate, Schema, GENERATED_MODULE_NAME};
use crate::store::{
    CollectionVersion, Document, DocumentVersion, NewDocumentVersion, Provenance,
    Repositories, StoreError, VersionStore,
};

use super::errors::DocumentError;

/// Creates, mutates, and summarizes documents.
#[derive(Clone)]
pub struct DocumentService {
    repos: Repositories,
    engine: Arc<dyn SandboxEngine>,
    versions: VersionStore,
}

impl DocumentService {
    /// Build a document service.
    pub fn new(repos: Repositories, engine: Arc<dyn SandboxEngine>) -> Self {
        let versions = VersionStore::new(repos.clone());
        Self {
            repos,
            engine,
            versions,
        }
    }

    /// Create a document in a collection.
    pub async fn create_document(
        &self,
        collection_id: Uuid,
        content: Value,
        created_by: Provenance,
    ) -> Result<Document, DocumentError> {
        let collection_version = self.latest_collection_version(collection_id).await?;
        let document_id = Uuid::new_v4();
        let prepared = prepare_document_content(
            &self.repos,
            &collection_version.schema,
            document_id,
            content,
        )
        .await?;
        persist_new_files(&self.repos, document_id, prepared.new_files).await?;

        let version = DocumentVersion {
            id: Uuid::new_v4(),
            document_id,
            previous_version_id: None,
            collection_version_id: collection_version.id,
            content: prepared.content,
            created_by,
            remote_id: None,
            created_at: Utc::now(),
        };
        let document = Document {
            id: document_id,
            collection_id,
            latest_version_id: version.id,
            created_at: version.created_at,
        };
        self.repos.document_versions.insert(version).await?;
        self.repos.documents.insert(document.clone()).await?;

        info!(document_id = %document.id, collection_id = %collection_id, "document created");
        Ok(document)
    }

    /// Append a new version to a document.
    ///
    /// `expected_latest` is the version id the caller read before editing.
    pub async fn update_document(
        &self,
        document_id: Uuid,
        expected_latest: Uuid,
        content: Value,
        created_by: Provenance,
    ) -> Result<DocumentVersion, DocumentError> {
        let document = self.get_document(document_id).await?;
        if document.latest_version_id != expected_latest {
            return Err(DocumentError::VersionIdNotMatching {
                expected: expected_latest,
                actual: document.latest_version_id,
            });
        }

        let collection_version = self
            .latest_collection_version(document.collection_id)
            .await?;
        let prepared = prepare_document_content(
            &self.repos,
            &collection_version.schema,
            document_id,
            content,
        )
        .await?;
        persist_new_files(&self.repos, document_id, prepared.new_files).await?;

        let version = self
            .versions
            .append_document_version(
                document_id,
                expected_latest,
                NewDocumentVersion {
                    content: prepared.content,
                    collection_version_id: collection_version.id,
                    created_by,
                    remote_id: None,
                },
            )
            .await
            .map_err(|err| match err {
                StoreError::VersionConflict { expected, actual } => {
                    DocumentError::VersionIdNotMatching { expected, actual }
                }
                other => DocumentError::Store(other),
            })?;

        debug!(document_id = %document_id, version_id = %version.id, "document updated");
        Ok(version)
    }

    /// Look up a document.
    pub async fn get_document(&self, id: Uuid) -> Result<Document, DocumentError> {
        self.repos
            .documents
            .find(id)
            .await?
            .ok_or(DocumentError::NotFound(id))
    }

    /// The latest version node of a document.
    pub async fn latest_version(&self, id: Uuid) -> Result<DocumentVersion, DocumentError> {
        let document = self.get_document(id).await?;
        self.repos
            .document_versions
            .find(document.latest_version_id)
            .await?
            .ok_or(DocumentError::Store(StoreError::NotFound(
                document.latest_version_id,
            )))
    }

    /// Delete a document with its version chain and owned files.
    pub async fn delete_document(&self, id: Uuid) -> Result<(), DocumentError> {
        let document = self.get_document(id).await?;
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

        info!(document_id = %id, "document deleted");
        Ok(())
    }

    /// Run the collection's content summary getter on the document's latest
    /// content.
    pub async fn content_summary(&self, id: Uuid) -> Result<String, DocumentError> {
        let latest = self.latest_version(id).await?;
        let collection_version = self
            .repos
            .collection_versions
            .find(latest.collection_version_id)
            .await?
            .ok_or(DocumentError::Store(StoreError::NotFound(
                latest.collection_version_id,
            )))?;

        let declarations = codegen(&collection_version.schema)?;
        let libraries = [SourceModule::new(GENERATED_MODULE_NAME, declarations)];
        let compiled = check_function(
            self.engine.as_ref(),
            &collection_version.settings.content_summary_getter,
            &libraries,
        )
        .map_err(DocumentError::SummaryGetterNotValid)?;

        let result = self
            .engine
            .execute_sync(&compiled, &[latest.content])
            .map_err(DocumentError::SummaryFailed)?;
        match result {
            Value::String(summary) => Ok(summary),
            other => Err(DocumentError::SummaryNotAString(other)),
        }
    }

    async fn latest_collection_version(
        &self,
        collection_id: Uuid,
    ) -> Result<CollectionVersion, DocumentError> {
        let collection = self
            .repos
            .collections
            .find(collection_id)
            .await?
            .ok_or(DocumentError::CollectionNotFound(collection_id))?;
        self.repos
            .collection_versions
            .find(collection.latest_version_id)
            .await?
            .ok_or(DocumentError::Store(StoreError::NotFound(
                collection.latest_version_id,
            )))
    }
}

pub(crate) struct PreparedContent {
    pub(crate) content: Value,
    pub(crate) new_files: Vec<NewFile>,
}

/// Validate content, convert inline file payloads, and verify that every
/// remaining file reference resolves to a stored file owned by the document.
///
/// Files minted by this very call are exempt from the ownership check; they
/// become owned by the document when persisted. Everything else must already
/// belong to `document_id`, so a document cannot claim another document's
/// files by pasting their references.
pub(crate) async fn prepare_document_content(
    repos: &Repositories,
    schema: &Schema,
    document_id: Uuid,
    content: Value,
) -> Result<PreparedContent, DocumentError> {
    let issues = validate(schema, &content)?;
    if !issues.is_empty() {
        return Err(DocumentError::ContentNotValid(issues));
    }

    let extraction = extract_and_convert_proto_files(schema, content)?;
    let referenced = extract_referenced_file_ids(schema, &extraction.converted_content)?;

    let preexisting: Vec<Uuid> = referenced
        .into_iter()
        .filter(|id| !extraction.new_files.iter().any(|file| file.id == *id))
        .collect();
    if !preexisting.is_empty() {
        let found = repos.files.find_all_where_ids(&preexisting).await?;
        let owner = FileOwner::Document(document_id);
        let missing: Vec<Uuid> = preexisting
            .into_iter()
            .filter(|id| {
                !found
                    .iter()
                    .any(|file| file.id == *id && file.is_owned_by(&owner))
            })
            .collect();
        if !missing.is_empty() {
            return Err(DocumentError::FilesNotFound(missing));
        }
    }

    Ok(PreparedContent {
        content: extraction.converted_content,
        new_files: extraction.new_files,
    })
}

/// Persist files stripped out of content, owned by the writing document.
pub(crate) async fn persist_new_files(
    repos: &Repositories,
    document_id: Uuid,
    new_files: Vec<NewFile>,
) -> Result<(), DocumentError> {
    for file in new_files {
        let stored = StoredFile::owned_by(file.id, FileOwner::Document(document_id));
        repos.files.insert(stored, file.proto.content).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collections::CollectionService;
    use crate::sandbox::StubEngine;
    use crate::schema::TypeDefinition;
    use crate::store::CollectionSettings;
    use base64::engine::general_purpose::STANDARD as BASE64;
    use base64::Engine as _;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn note_schema() -> Schema {
        let mut properties = BTreeMap::new();
        properties.insert("title".to_string(), TypeDefinition::String);
        properties.insert("attachment".to_string(), TypeDefinition::File);
        let mut nullable = std::collections::BTreeSet::new();
        nullable.insert("attachment".to_string());
        let mut types = BTreeMap::new();
        types.insert(
            "Root".to_string(),
            TypeDefinition::Struct {
                properties,
                nullable_properties: nullable,
            },
        );
        Schema::new(types, "Root")
    }

    async fn setup(engine: StubEngine) -> (DocumentService, Repositories, Uuid) {
        let repos = Repositories::in_memory();
        let engine = Arc::new(engine);
        let collections = CollectionService::new(repos.clone(), engine.clone());
        let collection = collections
            .create_collection(
                note_schema(),
                CollectionSettings::with_summary_getter("summary-getter"),
            )
            .await
            .unwrap();
        (
            DocumentService::new(repos.clone(), engine),
            repos,
            collection.id,
        )
    }

    #[tokio::test]
    async fn test_create_document_validates_content() {
        let (service, _, collection_id) = setup(StubEngine::new()).await;
        let err = service
            .create_document(collection_id, json!({ "title": 7 }), Provenance::User)
            .await
            .unwrap_err();
        assert!(matches!(err, DocumentError::ContentNotValid(_)));
    }

    #[tokio::test]
    async fn test_create_document_rejects_extra_keys() {
        let (service, _, collection_id) = setup(StubEngine::new()).await;
        let err = service
            .create_document(
                collection_id,
                json!({ "title": "a", "extra": 1 }),
                Provenance::User,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DocumentError::ContentNotValid(_)));
    }

    #[tokio::test]
    async fn test_create_document_converts_inline_files() {
        let (service, repos, collection_id) = setup(StubEngine::new()).await;
        let content = json!({
            "title": "a",
            "attachment": {
                "name": "a.txt",
                "mimeType": "text/plain",
                "content": BASE64.encode(b"payload")
            }
        });
        let document = service
            .create_document(collection_id, content, Provenance::User)
            .await
            .unwrap();

        let version = service.latest_version(document.id).await.unwrap();
        let stored_ref = &version.content["attachment"];
        assert!(stored_ref.get("content").is_none());
        let file_id = Uuid::parse_str(stored_ref["id"].as_str().unwrap()).unwrap();

        let file = repos.files.find(file_id).await.unwrap().unwrap();
        assert!(file.is_owned_by(&FileOwner::Document(document.id)));
        assert_eq!(
            repos.files.find_bytes(file_id).await.unwrap().unwrap(),
            b"payload"
        );
    }

    #[tokio::test]
    async fn test_create_document_rejects_dangling_file_ref() {
        let (service, _, collection_id) = setup(StubEngine::new()).await;
        let dangling = Uuid::new_v4();
        let content = json!({
            "title": "a",
            "attachment": {
                "id": dangling.to_string(),
                "name": "a.txt",
                "mimeType": "text/plain"
            }
        });
        let err = service
            .create_document(collection_id, content, Provenance::User)
            .await
            .unwrap_err();
        match err {
            DocumentError::FilesNotFound(missing) => assert_eq!(missing, vec![dangling]),
            other => panic!("expected FilesNotFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_create_document_rejects_foreign_owned_file_ref() {
        let (service, _, collection_id) = setup(StubEngine::new()).await;
        let owner = service
            .create_document(
                collection_id,
                json!({
                    "title": "owner",
                    "attachment": {
                        "name": "a.txt",
                        "mimeType": "text/plain",
                        "content": BASE64.encode(b"payload")
                    }
                }),
                Provenance::User,
            )
            .await
            .unwrap();
        let owner_version = service.latest_version(owner.id).await.unwrap();
        let file_ref = owner_version.content["attachment"].clone();
        let file_id = Uuid::parse_str(file_ref["id"].as_str().unwrap()).unwrap();

        // The file exists, but belongs to the first document.
        let err = service
            .create_document(
                collection_id,
                json!({ "title": "thief", "attachment": file_ref }),
                Provenance::User,
            )
            .await
            .unwrap_err();
        match err {
            DocumentError::FilesNotFound(missing) => assert_eq!(missing, vec![file_id]),
            other => panic!("expected FilesNotFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_update_document_keeps_owned_file_ref() {
        let (service, _, collection_id) = setup(StubEngine::new()).await;
        let document = service
            .create_document(
                collection_id,
                json!({
                    "title": "a",
                    "attachment": {
                        "name": "a.txt",
                        "mimeType": "text/plain",
                        "content": BASE64.encode(b"payload")
                    }
                }),
                Provenance::User,
            )
            .await
            .unwrap();
        let v1 = service.latest_version(document.id).await.unwrap();
        let file_ref = v1.content["attachment"].clone();

        // Re-referencing a file the document already owns is fine.
        let v2 = service
            .update_document(
                document.id,
                v1.id,
                json!({ "title": "b", "attachment": file_ref.clone() }),
                Provenance::User,
            )
            .await
            .unwrap();
        assert_eq!(v2.content["attachment"], file_ref);
    }

    #[tokio::test]
    async fn test_update_document_requires_fresh_version_id() {
        let (service, _, collection_id) = setup(StubEngine::new()).await;
        let document = service
            .create_document(collection_id, json!({ "title": "a" }), Provenance::User)
            .await
            .unwrap();
        let v1 = document.latest_version_id;

        let v2 = service
            .update_document(document.id, v1, json!({ "title": "b" }), Provenance::User)
            .await
            .unwrap();
        assert_eq!(v2.previous_version_id, Some(v1));

        // Writing against the superseded id fails without a write.
        let err = service
            .update_document(document.id, v1, json!({ "title": "c" }), Provenance::User)
            .await
            .unwrap_err();
        match err {
            DocumentError::VersionIdNotMatching { expected, actual } => {
                assert_eq!(expected, v1);
                assert_eq!(actual, v2.id);
            }
            other => panic!("expected VersionIdNotMatching, got {other:?}"),
        }
        let latest = service.latest_version(document.id).await.unwrap();
        assert_eq!(latest.content, json!({ "title": "b" }));
    }

    #[tokio::test]
    async fn test_delete_document_cascades_versions_and_files() {
        let (service, repos, collection_id) = setup(StubEngine::new()).await;
        let content = json!({
            "title": "a",
            "attachment": {
                "name": "a.txt",
                "mimeType": "text/plain",
                "content": BASE64.encode(b"payload")
            }
        });
        let document = service
            .create_document(collection_id, content, Provenance::User)
            .await
            .unwrap();
        service.delete_document(document.id).await.unwrap();

        assert!(repos.documents.find(document.id).await.unwrap().is_none());
        assert!(repos
            .document_versions
            .find_all_where_document(document.id)
            .await
            .unwrap()
            .is_empty());
        assert!(repos
            .files
            .find_all_where_owner(FileOwner::Document(document.id))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_content_summary_runs_getter_on_latest_content() {
        let engine = StubEngine::new().with_function("summary-getter", |args| {
            let title = args[0]["title"].as_str().unwrap_or("?");
            Ok(Value::String(format!("Note: {title}")))
        });
        let (service, _, collection_id) = setup(engine).await;
        let document = service
            .create_document(collection_id, json!({ "title": "a" }), Provenance::User)
            .await
            .unwrap();

        let summary = service.content_summary(document.id).await.unwrap();
        assert_eq!(summary, "Note: a");
    }

    #[tokio::test]
    async fn test_content_summary_captures_thrown_value() {
        let engine = StubEngine::new().with_throws("summary-getter", json!("boom"));
        let (service, _, collection_id) = setup(engine).await;
        let document = service
            .create_document(collection_id, json!({ "title": "a" }), Provenance::User)
            .await
            .unwrap();

        let err = service.content_summary(document.id).await.unwrap_err();
        assert!(matches!(err, DocumentError::SummaryFailed(_)));
    }

    #[tokio::test]
    async fn test_content_summary_rejects_non_string_result() {
        let engine =
            StubEngine::new().with_function("summary-getter", |_| Ok(json!({ "not": "text" })));
        let (service, _, collection_id) = setup(engine).await;
        let document = service
            .create_document(collection_id, json!({ "title": "a" }), Provenance::User)
            .await
            .unwrap();

        let err = service.content_summary(document.id).await.unwrap_err();
        assert!(matches!(err, DocumentError::SummaryNotAString(_)));
    }

    #[tokio::test]
    async fn test_create_document_in_missing_collection() {
        let (service, _, _) = setup(StubEngine::new()).await;
        let err = service
            .create_document(Uuid::new_v4(), json!({ "title": "a" }), Provenance::User)
            .await
            .unwrap_err();
        assert!(matches!(err, DocumentError::CollectionNotFound(_)));
    }
}
