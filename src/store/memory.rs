//! In-memory repository implementation.
//!
//! One `RwLock` guards all tables, so every repository call is atomic and
//! `compare_and_set_latest_version` is a true linearization point. Version
//! tables keep insertion order per owner, which makes `find_latest_where_*`
//! deterministic without timestamp tie-breaking.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::files::{FileOwner, StoredFile};

use super::entities::{Collection, CollectionVersion, Document, DocumentVersion};
use super::errors::{StoreError, StoreResult};
use super::repository::{
    CollectionRepository, CollectionVersionRepository, DocumentRepository,
    DocumentVersionRepository, FileRepository,
};

#[derive(Default)]
struct State {
    collections: HashMap<Uuid, Collection>,
    collection_versions: HashMap<Uuid, CollectionVersion>,
    collection_version_order: Vec<Uuid>,
    documents: HashMap<Uuid, Document>,
    document_order: Vec<Uuid>,
    document_versions: HashMap<Uuid, DocumentVersion>,
    document_version_order: Vec<Uuid>,
    files: HashMap<Uuid, StoredFile>,
    file_bytes: HashMap<Uuid, Vec<u8>>,
}

/// All five repositories backed by one in-process table set.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CollectionRepository for MemoryStore {
    async fn find(&self, id: Uuid) -> StoreResult<Option<Collection>> {
        Ok(self.state.read().await.collections.get(&id).cloned())
    }

    async fn find_all(&self) -> StoreResult<Vec<Collection>> {
        let state = self.state.read().await;
        let mut all: Vec<_> = state.collections.values().cloned().collect();
        all.sort_by_key(|collection| (collection.created_at, collection.id));
        Ok(all)
    }

    async fn insert(&self, collection: Collection) -> StoreResult<()> {
        self.state
            .write()
            .await
            .collections
            .insert(collection.id, collection);
        Ok(())
    }

    async fn compare_and_set_latest_version(
        &self,
        id: Uuid,
        expected: Uuid,
        new: Uuid,
    ) -> StoreResult<bool> {
        let mut state = self.state.write().await;
        match state.collections.get_mut(&id) {
            Some(collection) if collection.latest_version_id == expected => {
                collection.latest_version_id = new;
                Ok(true)
            }
            Some(_) => Ok(false),
            None => Err(StoreError::NotFound(id)),
        }
    }

    async fn delete(&self, id: Uuid) -> StoreResult<()> {
        self.state.write().await.collections.remove(&id);
        Ok(())
    }
}

#[async_trait]
impl CollectionVersionRepository for MemoryStore {
    async fn find(&self, id: Uuid) -> StoreResult<Option<CollectionVersion>> {
        Ok(self.state.read().await.collection_versions.get(&id).cloned())
    }

    async fn find_all_where_collection(
        &self,
        collection_id: Uuid,
    ) -> StoreResult<Vec<CollectionVersion>> {
        let state = self.state.read().await;
        Ok(state
            .collection_version_order
            .iter()
            .filter_map(|id| state.collection_versions.get(id))
            .filter(|version| version.collection_id == collection_id)
            .cloned()
            .collect())
    }

    async fn find_latest_where_collection(
        &self,
        collection_id: Uuid,
    ) -> StoreResult<Option<CollectionVersion>> {
        let state = self.state.read().await;
        Ok(state
            .collection_version_order
            .iter()
            .rev()
            .filter_map(|id| state.collection_versions.get(id))
            .find(|version| version.collection_id == collection_id)
            .cloned())
    }

    async fn insert(&self, version: CollectionVersion) -> StoreResult<()> {
        let mut state = self.state.write().await;
        state.collection_version_order.push(version.id);
        state.collection_versions.insert(version.id, version);
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> StoreResult<()> {
        let mut state = self.state.write().await;
        state.collection_versions.remove(&id);
        state.collection_version_order.retain(|kept| *kept != id);
        Ok(())
    }
}

#[async_trait]
impl DocumentRepository for MemoryStore {
    async fn find(&self, id: Uuid) -> StoreResult<Option<Document>> {
        Ok(self.state.read().await.documents.get(&id).cloned())
    }

    async fn find_all_where_collection(
        &self,
        collection_id: Uuid,
    ) -> StoreResult<Vec<Document>> {
        let state = self.state.read().await;
        Ok(state
            .document_order
            .iter()
            .filter_map(|id| state.documents.get(id))
            .filter(|document| document.collection_id == collection_id)
            .cloned()
            .collect())
    }

    async fn insert(&self, document: Document) -> StoreResult<()> {
        let mut state = self.state.write().await;
        state.document_order.push(document.id);
        state.documents.insert(document.id, document);
        Ok(())
    }

    async fn compare_and_set_latest_version(
        &self,
        id: Uuid,
        expected: Uuid,
        new: Uuid,
    ) -> StoreResult<bool> {
        let mut state = self.state.write().await;
        match state.documents.get_mut(&id) {
            Some(document) if document.latest_version_id == expected => {
                document.latest_version_id = new;
                Ok(true)
            }
            Some(_) => Ok(false),
            None => Err(StoreError::NotFound(id)),
        }
    }

    async fn delete(&self, id: Uuid) -> StoreResult<()> {
        let mut state = self.state.write().await;
        state.documents.remove(&id);
        state.document_order.retain(|kept| *kept != id);
        Ok(())
    }
}

#[async_trait]
impl DocumentVersionRepository for MemoryStore {
    async fn find(&self, id: Uuid) -> StoreResult<Option<DocumentVersion>> {
        Ok(self.state.read().await.document_versions.get(&id).cloned())
    }

    async fn find_all_where_document(
        &self,
        document_id: Uuid,
    ) -> StoreResult<Vec<DocumentVersion>> {
        let state = self.state.read().await;
        Ok(state
            .document_version_order
            .iter()
            .filter_map(|id| state.document_versions.get(id))
            .filter(|version| version.document_id == document_id)
            .cloned()
            .collect())
    }

    async fn find_latest_where_document(
        &self,
        document_id: Uuid,
    ) -> StoreResult<Option<DocumentVersion>> {
        let state = self.state.read().await;
        Ok(state
            .document_version_order
            .iter()
            .rev()
            .filter_map(|id| state.document_versions.get(id))
            .find(|version| version.document_id == document_id)
            .cloned())
    }

    async fn insert(&self, version: DocumentVersion) -> StoreResult<()> {
        let mut state = self.state.write().await;
        state.document_version_order.push(version.id);
        state.document_versions.insert(version.id, version);
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> StoreResult<()> {
        let mut state = self.state.write().await;
        state.document_versions.remove(&id);
        state.document_version_order.retain(|kept| *kept != id);
        Ok(())
    }
}

#[async_trait]
impl FileRepository for MemoryStore {
    async fn find(&self, id: Uuid) -> StoreResult<Option<StoredFile>> {
        Ok(self.state.read().await.files.get(&id).cloned())
    }

    async fn find_all_where_ids(&self, ids: &[Uuid]) -> StoreResult<Vec<StoredFile>> {
        let state = self.state.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| state.files.get(id))
            .cloned()
            .collect())
    }

    async fn find_all_where_owner(&self, owner: FileOwner) -> StoreResult<Vec<StoredFile>> {
        let state = self.state.read().await;
        let mut owned: Vec<_> = state
            .files
            .values()
            .filter(|file| file.is_owned_by(&owner))
            .cloned()
            .collect();
        owned.sort_by_key(|file| (file.created_at, file.id));
        Ok(owned)
    }

    async fn insert(&self, file: StoredFile, bytes: Vec<u8>) -> StoreResult<()> {
        let mut state = self.state.write().await;
        state.file_bytes.insert(file.id, bytes);
        state.files.insert(file.id, file);
        Ok(())
    }

    async fn find_bytes(&self, id: Uuid) -> StoreResult<Option<Vec<u8>>> {
        Ok(self.state.read().await.file_bytes.get(&id).cloned())
    }

    async fn delete(&self, id: Uuid) -> StoreResult<()> {
        let mut state = self.state.write().await;
        state.files.remove(&id);
        state.file_bytes.remove(&id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn document(collection_id: Uuid, latest: Uuid) -> Document {
        Document {
            id: Uuid::new_v4(),
            collection_id,
            latest_version_id: latest,
            created_at: Utc::now(),
        }
    }

    fn version(document_id: Uuid, collection_version_id: Uuid) -> DocumentVersion {
        DocumentVersion {
            id: Uuid::new_v4(),
            document_id,
            previous_version_id: None,
            collection_version_id,
            content: json!({}),
            created_by: super::super::entities::Provenance::User,
            remote_id: None,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_cas_succeeds_on_match() {
        let store = MemoryStore::new();
        let v1 = Uuid::new_v4();
        let v2 = Uuid::new_v4();
        let doc = document(Uuid::new_v4(), v1);
        DocumentRepository::insert(&store, doc.clone()).await.unwrap();

        let swapped = DocumentRepository::compare_and_set_latest_version(&store, doc.id, v1, v2)
            .await
            .unwrap();
        assert!(swapped);
        let reloaded = DocumentRepository::find(&store, doc.id).await.unwrap().unwrap();
        assert_eq!(reloaded.latest_version_id, v2);
    }

    #[tokio::test]
    async fn test_cas_fails_on_stale_expected() {
        let store = MemoryStore::new();
        let v1 = Uuid::new_v4();
        let doc = document(Uuid::new_v4(), v1);
        DocumentRepository::insert(&store, doc.clone()).await.unwrap();

        let stale = Uuid::new_v4();
        let swapped = DocumentRepository::compare_and_set_latest_version(
            &store,
            doc.id,
            stale,
            Uuid::new_v4(),
        )
        .await
        .unwrap();
        assert!(!swapped);
    }

    #[tokio::test]
    async fn test_cas_on_missing_entity() {
        let store = MemoryStore::new();
        let result = DocumentRepository::compare_and_set_latest_version(
            &store,
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4(),
        )
        .await;
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_latest_version_follows_insertion_order() {
        let store = MemoryStore::new();
        let document_id = Uuid::new_v4();
        let collection_version_id = Uuid::new_v4();

        let first = version(document_id, collection_version_id);
        let second = version(document_id, collection_version_id);
        DocumentVersionRepository::insert(&store, first.clone()).await.unwrap();
        DocumentVersionRepository::insert(&store, second.clone()).await.unwrap();

        let latest = store
            .find_latest_where_document(document_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(latest.id, second.id);

        let all = store.find_all_where_document(document_id).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, first.id);
    }

    #[tokio::test]
    async fn test_find_all_where_collection_filters() {
        let store = MemoryStore::new();
        let collection_a = Uuid::new_v4();
        let collection_b = Uuid::new_v4();
        DocumentRepository::insert(&store, document(collection_a, Uuid::new_v4()))
            .await
            .unwrap();
        DocumentRepository::insert(&store, document(collection_b, Uuid::new_v4()))
            .await
            .unwrap();

        let docs = DocumentRepository::find_all_where_collection(&store, collection_a)
            .await
            .unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].collection_id, collection_a);
    }

    #[tokio::test]
    async fn test_file_bytes_stored_separately() {
        let store = MemoryStore::new();
        let file = StoredFile::owned_by(Uuid::new_v4(), FileOwner::Document(Uuid::new_v4()));
        FileRepository::insert(&store, file.clone(), b"bytes".to_vec())
            .await
            .unwrap();

        assert_eq!(
            store.find_bytes(file.id).await.unwrap(),
            Some(b"bytes".to_vec())
        );
        FileRepository::delete(&store, file.id).await.unwrap();
        assert!(FileRepository::find(&store, file.id).await.unwrap().is_none());
        assert!(store.find_bytes(file.id).await.unwrap().is_none());
    }
}
