//! Versioned persistence layer.
//!
//! This module provides:
//! - `entities` - collections, documents, and their immutable version nodes
//! - `repository` - the persistence traits services are written against
//! - `memory` - an in-process implementation of all repositories
//! - `versioning` - optimistic append with compare-and-swap conflict checks
//! - `errors` - store failure taxonomy

pub mod entities;
pub mod errors;
pub mod memory;
pub mod repository;
pub mod versioning;

pub use entities::{
    Collection, CollectionSettings, CollectionVersion, Document, DocumentVersion,
    Provenance,
};
pub use errors::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use repository::{
    CollectionRepository, CollectionVersionRepository, DocumentRepository,
    DocumentVersionRepository, FileRepository, Repositories,
};
pub use versioning::{NewCollectionVersion, NewDocumentVersion, VersionStore};
