//! File domain types.
//!
//! A file exists in two forms inside document content:
//! - [`ProtoFile`] - an inline, not-yet-persisted payload appearing
//!   transiently before conversion
//! - [`FileRef`] - the stable reference to a persisted file
//!
//! The persisted side is [`StoredFile`] metadata plus separately stored
//! bytes; every stored file records which entities reference it so ownership
//! can be enforced and deletions can cascade.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

/// Stable reference to a persisted file, as embedded in document content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRef {
    /// Persisted file id.
    pub id: Uuid,
    /// Original file name.
    pub name: String,
    /// MIME type.
    pub mime_type: String,
}

impl FileRef {
    /// The JSON shape embedded in document content.
    pub fn to_value(&self) -> Value {
        json!({
            "id": self.id.to_string(),
            "name": self.name,
            "mimeType": self.mime_type,
        })
    }
}

/// Inline file payload carried inside content before persistence.
#[derive(Debug, Clone, PartialEq)]
pub struct ProtoFile {
    /// Original file name.
    pub name: String,
    /// MIME type.
    pub mime_type: String,
    /// Raw bytes (base64-encoded when embedded in JSON content).
    pub content: Vec<u8>,
}

impl ProtoFile {
    /// The reference that replaces this payload once persisted under `id`.
    pub fn to_ref(&self, id: Uuid) -> FileRef {
        FileRef {
            id,
            name: self.name.clone(),
            mime_type: self.mime_type.clone(),
        }
    }
}

/// A file stripped out of content during conversion: the minted id plus the
/// inline payload it replaced.
#[derive(Debug, Clone, PartialEq)]
pub struct NewFile {
    /// Freshly minted file id.
    pub id: Uuid,
    /// The stripped payload.
    pub proto: ProtoFile,
}

/// The entity owning a file reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "camelCase")]
pub enum FileOwner {
    /// Owned by a document.
    Document(Uuid),
    /// Owned by a conversation.
    Conversation(Uuid),
}

/// Persisted file metadata; bytes are stored separately.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredFile {
    /// Content-addressed file id.
    pub id: Uuid,
    /// Owning references; a file referenced from validated content must be
    /// owned by the referencing entity.
    pub referenced_by: Vec<FileOwner>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl StoredFile {
    /// Create metadata for a file owned by a single entity.
    pub fn owned_by(id: Uuid, owner: FileOwner) -> Self {
        Self {
            id,
            referenced_by: vec![owner],
            created_at: Utc::now(),
        }
    }

    /// Whether the given entity is among this file's owners.
    pub fn is_owned_by(&self, owner: &FileOwner) -> bool {
        self.referenced_by.contains(owner)
    }
}
