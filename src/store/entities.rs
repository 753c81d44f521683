//! Versioned entities.
//!
//! Collections and documents are stable identities whose state lives in an
//! append-only chain of immutable version nodes. The entity row carries an
//! explicit `latest_version_id` pointer so the optimistic compare-and-swap
//! is O(1); the chain itself is an arena of nodes addressed by id, linked
//! backwards through `previous_version_id`. Version nodes are created once
//! and never edited; deletion only removes whole entities with their chains.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::schema::Schema;

/// A collection of documents sharing a user-defined record type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Collection {
    /// Stable collection id.
    pub id: Uuid,
    /// Tail of the version chain.
    pub latest_version_id: Uuid,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// User-authored function sources attached to a collection version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionSettings {
    /// Derives a display summary from a document's content.
    pub content_summary_getter: String,
    /// Transforms content from the previous schema's shape to this one's.
    /// Present only on versions created by a schema change that needs it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub migration: Option<String>,
    /// Derives the keys whose edits should block concurrent assistant writes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_blocking_keys_getter: Option<String>,
}

impl CollectionSettings {
    /// Settings with only a summary getter.
    pub fn with_summary_getter(source: impl Into<String>) -> Self {
        Self {
            content_summary_getter: source.into(),
            migration: None,
            content_blocking_keys_getter: None,
        }
    }
}

/// One immutable node in a collection's version chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionVersion {
    /// Version node id.
    pub id: Uuid,
    /// Owning collection.
    pub collection_id: Uuid,
    /// Prior chain node; `None` for the initial version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_version_id: Option<Uuid>,
    /// The record type documents of this version conform to.
    pub schema: Schema,
    /// User-authored function sources.
    pub settings: CollectionSettings,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// Who created a document version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Provenance {
    /// Direct user edit.
    User,
    /// Produced by a schema-migration run.
    Migration,
    /// Written by an assistant.
    Assistant,
    /// Synchronized from an external connector.
    Connector,
}

/// A document, member of exactly one collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// Stable document id.
    pub id: Uuid,
    /// Owning collection.
    pub collection_id: Uuid,
    /// Tail of the version chain.
    pub latest_version_id: Uuid,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// One immutable node in a document's version chain.
///
/// Invariant: `content` validates against the schema of
/// `collection_version_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentVersion {
    /// Version node id.
    pub id: Uuid,
    /// Owning document.
    pub document_id: Uuid,
    /// Prior chain node; `None` for the initial version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_version_id: Option<Uuid>,
    /// The collection version whose schema this content was validated
    /// against.
    pub collection_version_id: Uuid,
    /// Validated content.
    pub content: Value,
    /// Who created this version.
    pub created_by: Provenance,
    /// External id when synchronized from a connector.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_id: Option<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}
