//! Schema type definitions.
//!
//! A schema is a flat, named arena of type definitions plus a designated root
//! type. Definitions form a closed set of variants; composite variants nest
//! either inline or through named `Ref` indirections resolved against the
//! arena. Refs may be shared (a DAG) but must be acyclic.
//!
//! The JSON representation is self-describing: every variant is tagged with a
//! `type` field and carries only JSON-compatible payloads, so a schema can be
//! persisted and exchanged without external references.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

/// One member of an enum type: the stored value plus an optional
/// human-readable description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumMember {
    /// The value a conforming document stores.
    pub value: String,
    /// Optional description shown to users.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl EnumMember {
    /// Create a member without a description.
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            description: None,
        }
    }

    /// Create a member with a description.
    pub fn described(value: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            description: Some(description.into()),
        }
    }
}

/// A single type definition, one variant of the closed type system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum TypeDefinition {
    /// UTF-8 string.
    String,
    /// JSON number (integer or float).
    Number,
    /// Boolean.
    Boolean,
    /// One of a closed set of string values.
    Enum {
        /// Declared members; a conforming value equals one member's value.
        members: Vec<EnumMember>,
    },
    /// Exactly one string value.
    StringLiteral {
        /// The only permitted value.
        value: String,
    },
    /// Exactly one numeric value.
    NumberLiteral {
        /// The only permitted value.
        value: serde_json::Number,
    },
    /// Exactly one boolean value.
    BooleanLiteral {
        /// The only permitted value.
        value: bool,
    },
    /// Any JSON object, opaque to the schema.
    JsonObject,
    /// An embedded file: either an inline not-yet-persisted payload
    /// (ProtoFile) or a persisted file's stable reference (FileRef).
    File,
    /// Object with a fixed property set.
    Struct {
        /// Declared properties; a conforming object carries no others.
        properties: BTreeMap<String, TypeDefinition>,
        /// Properties that may be `null` or absent.
        #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
        nullable_properties: BTreeSet<String>,
    },
    /// Homogeneous list.
    List {
        /// Element type (boxed to allow recursive nesting).
        items: Box<TypeDefinition>,
    },
    /// Reference to a document, stored as the document's id.
    DocumentRef {
        /// Restricts the referenced document's collection. Metadata for
        /// consumers; not checked by the structural validator.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        collection_id: Option<Uuid>,
    },
    /// Named indirection resolved against the schema's type arena.
    Ref {
        /// Name of the referenced type definition.
        name: String,
    },
}

impl TypeDefinition {
    /// Returns the variant name for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            TypeDefinition::String => "string",
            TypeDefinition::Number => "number",
            TypeDefinition::Boolean => "boolean",
            TypeDefinition::Enum { .. } => "enum",
            TypeDefinition::StringLiteral { .. } => "stringLiteral",
            TypeDefinition::NumberLiteral { .. } => "numberLiteral",
            TypeDefinition::BooleanLiteral { .. } => "booleanLiteral",
            TypeDefinition::JsonObject => "jsonObject",
            TypeDefinition::File => "file",
            TypeDefinition::Struct { .. } => "struct",
            TypeDefinition::List { .. } => "list",
            TypeDefinition::DocumentRef { .. } => "documentRef",
            TypeDefinition::Ref { .. } => "ref",
        }
    }

    /// Create a struct type with no nullable properties.
    pub fn struct_of(properties: BTreeMap<String, TypeDefinition>) -> Self {
        TypeDefinition::Struct {
            properties,
            nullable_properties: BTreeSet::new(),
        }
    }

    /// Create a list type.
    pub fn list_of(items: TypeDefinition) -> Self {
        TypeDefinition::List {
            items: Box::new(items),
        }
    }

    /// Create a named reference.
    pub fn reference(name: impl Into<String>) -> Self {
        TypeDefinition::Ref { name: name.into() }
    }

    /// Create an enum from plain string values.
    pub fn enum_of<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        TypeDefinition::Enum {
            members: values.into_iter().map(EnumMember::new).collect(),
        }
    }
}

/// A complete schema: a named arena of type definitions plus the root type.
///
/// Ordered maps/sets normalize key order, so two schemas that are equal as
/// values serialize to byte-identical JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schema {
    /// Named type definitions.
    pub types: BTreeMap<String, TypeDefinition>,
    /// Name of the root type; must resolve to a `Struct`.
    pub root_type: String,
}

impl Schema {
    /// Create a schema from an arena and root type name.
    pub fn new(types: BTreeMap<String, TypeDefinition>, root_type: impl Into<String>) -> Self {
        Self {
            types,
            root_type: root_type.into(),
        }
    }

    /// Create a single-type schema whose root struct has the given
    /// properties, none of them nullable.
    pub fn single_struct(properties: BTreeMap<String, TypeDefinition>) -> Self {
        let mut types = BTreeMap::new();
        types.insert("Root".to_string(), TypeDefinition::struct_of(properties));
        Self::new(types, "Root")
    }

    /// Look up a type definition by name.
    pub fn get(&self, name: &str) -> Option<&TypeDefinition> {
        self.types.get(name)
    }
}
