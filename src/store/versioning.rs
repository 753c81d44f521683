//! Optimistic version appends.
//!
//! Appending a version is a three-step protocol: read the entity and check
//! the caller's expected latest id, insert the new chain node, then
//! compare-and-swap the entity's latest pointer. Losing the swap means
//! another writer appended in between; the orphaned node is deleted and the
//! caller gets [`StoreError::VersionConflict`] with the id that actually won.

use chrono::Utc;
use serde_json::Value;
use uuid::Uuid;

use crate::schema::Schema;

use super::entities::{
    CollectionSettings, CollectionVersion, DocumentVersion, Provenance,
};
use super::errors::{StoreError, StoreResult};
use super::repository::Repositories;

/// Payload for a new collection version node.
#[derive(Debug, Clone)]
pub struct NewCollectionVersion {
    /// The record type for the new version.
    pub schema: Schema,
    /// User-authored function sources.
    pub settings: CollectionSettings,
}

/// Payload for a new document version node.
#[derive(Debug, Clone)]
pub struct NewDocumentVersion {
    /// Already-validated content.
    pub content: Value,
    /// The collection version the content was validated against.
    pub collection_version_id: Uuid,
    /// Who is writing.
    pub created_by: Provenance,
    /// External id when synchronized from a connector.
    pub remote_id: Option<String>,
}

/// Appends version nodes with optimistic concurrency control.
#[derive(Clone)]
pub struct VersionStore {
    repos: Repositories,
}

impl VersionStore {
    /// Build a version store over the given repositories.
    pub fn new(repos: Repositories) -> Self {
        Self { repos }
    }

    /// Append a version to a document's chain.
    ///
    /// `expected_latest` is the version id the caller read before computing
    /// the new content. Exactly one of two concurrent appends against the
    /// same expected id succeeds.
    pub async fn append_document_version(
        &self,
        document_id: Uuid,
        expected_latest: Uuid,
        new: NewDocumentVersion,
    ) -> StoreResult<DocumentVersion> {
        let document = self
            .repos
            .documents
            .find(document_id)
            .await?
            .ok_or(StoreError::NotFound(document_id))?;
        if document.latest_version_id != expected_latest {
            return Err(StoreError::VersionConflict {
                expected: expected_latest,
                actual: document.latest_version_id,
            });
        }

        let version = DocumentVersion {
            id: Uuid::new_v4(),
            document_id,
            previous_version_id: Some(expected_latest),
            collection_version_id: new.collection_version_id,
            content: new.content,
            created_by: new.created_by,
            remote_id: new.remote_id,
            created_at: Utc::now(),
        };
        self.repos.document_versions.insert(version.clone()).await?;

        let swapped = self
            .repos
            .documents
            .compare_and_set_latest_version(document_id, expected_latest, version.id)
            .await?;
        if !swapped {
            // Lost the race after inserting the node; compensate.
            self.repos.document_versions.delete(version.id).await?;
            let actual = self
                .repos
                .documents
                .find(document_id)
                .await?
                .map(|doc| doc.latest_version_id)
                .ok_or(StoreError::NotFound(document_id))?;
            return Err(StoreError::VersionConflict {
                expected: expected_latest,
                actual,
            });
        }
        Ok(version)
    }

    /// Append a version to a collection's chain.
    pub async fn append_collection_version(
        &self,
        collection_id: Uuid,
        expected_latest: Uuid,
        new: NewCollectionVersion,
    ) -> StoreResult<CollectionVersion> {
        let collection = self
            .repos
            .collections
            .find(collection_id)
            .await?
            .ok_or(StoreError::NotFound(collection_id))?;
        if collection.latest_version_id != expected_latest {
            return Err(StoreError::VersionConflict {
                expected: expected_latest,
                actual: collection.latest_version_id,
            });
        }

        let version = CollectionVersion {
            id: Uuid::new_v4(),
            collection_id,
            previous_version_id: Some(expected_latest),
            schema: new.schema,
            settings: new.settings,
            created_at: Utc::now(),
        };
        self.repos
            .collection_versions
            .insert(version.clone())
            .await?;

        let swapped = self
            .repos
            .collections
            .compare_and_set_latest_version(collection_id, expected_latest, version.id)
            .await?;
        if !swapped {
            self.repos.collection_versions.delete(version.id).await?;
            let actual = self
                .repos
                .collections
                .find(collection_id)
                .await?
                .map(|col| col.latest_version_id)
                .ok_or(StoreError::NotFound(collection_id))?;
            return Err(StoreError::VersionConflict {
                expected: expected_latest,
                actual,
            });
        }
        Ok(version)
    }
}
