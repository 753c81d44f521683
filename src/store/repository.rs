//! Repository interfaces.
//!
//! Persistence is consumed through these traits and implemented externally
//! (a relational store in production, [`super::memory::MemoryStore`] for
//! tests and embedders). Transaction contract: every logical operation built
//! on these traits runs inside one serializable transaction in a relational
//! implementation; an uncaught error aborts it, a normal return commits.
//! The in-memory implementation makes each call atomic under one lock, with
//! `compare_and_set_latest_version` as the linearization point for version
//! appends.

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::files::{FileOwner, StoredFile};

use super::entities::{Collection, CollectionVersion, Document, DocumentVersion};
use super::errors::StoreResult;
use super::memory::MemoryStore;

/// Collections: stable rows carrying the latest-version pointer.
#[async_trait]
pub trait CollectionRepository: Send + Sync {
    /// Look up a collection by id.
    async fn find(&self, id: Uuid) -> StoreResult<Option<Collection>>;
    /// All collections.
    async fn find_all(&self) -> StoreResult<Vec<Collection>>;
    /// Insert a new collection row.
    async fn insert(&self, collection: Collection) -> StoreResult<()>;
    /// Atomically advance the latest-version pointer if it still equals
    /// `expected`. Returns whether the swap happened.
    async fn compare_and_set_latest_version(
        &self,
        id: Uuid,
        expected: Uuid,
        new: Uuid,
    ) -> StoreResult<bool>;
    /// Remove a collection row.
    async fn delete(&self, id: Uuid) -> StoreResult<()>;
}

/// Collection version chain nodes.
#[async_trait]
pub trait CollectionVersionRepository: Send + Sync {
    /// Look up a version node by id.
    async fn find(&self, id: Uuid) -> StoreResult<Option<CollectionVersion>>;
    /// All version nodes of a collection, oldest first.
    async fn find_all_where_collection(
        &self,
        collection_id: Uuid,
    ) -> StoreResult<Vec<CollectionVersion>>;
    /// The newest version node of a collection.
    async fn find_latest_where_collection(
        &self,
        collection_id: Uuid,
    ) -> StoreResult<Option<CollectionVersion>>;
    /// Insert an immutable version node.
    async fn insert(&self, version: CollectionVersion) -> StoreResult<()>;
    /// Remove a version node. Used only to compensate a lost append race and
    /// to cascade entity deletion.
    async fn delete(&self, id: Uuid) -> StoreResult<()>;
}

/// Documents: stable rows carrying the latest-version pointer.
#[async_trait]
pub trait DocumentRepository: Send + Sync {
    /// Look up a document by id.
    async fn find(&self, id: Uuid) -> StoreResult<Option<Document>>;
    /// All documents in a collection, oldest first.
    async fn find_all_where_collection(&self, collection_id: Uuid)
        -> StoreResult<Vec<Document>>;
    /// Insert a new document row.
    async fn insert(&self, document: Document) -> StoreResult<()>;
    /// Atomically advance the latest-version pointer if it still equals
    /// `expected`. Returns whether the swap happened.
    async fn compare_and_set_latest_version(
        &self,
        id: Uuid,
        expected: Uuid,
        new: Uuid,
    ) -> StoreResult<bool>;
    /// Remove a document row.
    async fn delete(&self, id: Uuid) -> StoreResult<()>;
}

/// Document version chain nodes.
#[async_trait]
pub trait DocumentVersionRepository: Send + Sync {
    /// Look up a version node by id.
    async fn find(&self, id: Uuid) -> StoreResult<Option<DocumentVersion>>;
    /// All version nodes of a document, oldest first.
    async fn find_all_where_document(
        &self,
        document_id: Uuid,
    ) -> StoreResult<Vec<DocumentVersion>>;
    /// The newest version node of a document.
    async fn find_latest_where_document(
        &self,
        document_id: Uuid,
    ) -> StoreResult<Option<DocumentVersion>>;
    /// Insert an immutable version node.
    async fn insert(&self, version: DocumentVersion) -> StoreResult<()>;
    /// Remove a version node. Used only to compensate a lost append race and
    /// to cascade entity deletion.
    async fn delete(&self, id: Uuid) -> StoreResult<()>;
}

/// Stored file metadata plus separately stored bytes.
#[async_trait]
pub trait FileRepository: Send + Sync {
    /// Look up file metadata by id.
    async fn find(&self, id: Uuid) -> StoreResult<Option<StoredFile>>;
    /// Metadata for every id that exists, in the order given.
    async fn find_all_where_ids(&self, ids: &[Uuid]) -> StoreResult<Vec<StoredFile>>;
    /// All files owned by an entity.
    async fn find_all_where_owner(&self, owner: FileOwner) -> StoreResult<Vec<StoredFile>>;
    /// Insert file metadata and bytes.
    async fn insert(&self, file: StoredFile, bytes: Vec<u8>) -> StoreResult<()>;
    /// The stored bytes of a file.
    async fn find_bytes(&self, id: Uuid) -> StoreResult<Option<Vec<u8>>>;
    /// Remove a file and its bytes.
    async fn delete(&self, id: Uuid) -> StoreResult<()>;
}

/// The full repository surface consumed by services.
#[derive(Clone)]
pub struct Repositories {
    /// Collection rows.
    pub collections: Arc<dyn CollectionRepository>,
    /// Collection version chains.
    pub collection_versions: Arc<dyn CollectionVersionRepository>,
    /// Document rows.
    pub documents: Arc<dyn DocumentRepository>,
    /// Document version chains.
    pub document_versions: Arc<dyn DocumentVersionRepository>,
    /// Stored files.
    pub files: Arc<dyn FileRepository>,
}

impl Repositories {
    /// Wire every repository to one shared in-memory store.
    pub fn in_memory() -> Self {
        let store = Arc::new(MemoryStore::new());
        Self {
            collections: store.clone(),
            collection_versions: store.clone(),
            documents: store.clone(),
            document_versions: store.clone(),
            files: store,
        }
    }
}
