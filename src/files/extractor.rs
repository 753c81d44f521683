//! Schema-guided file extraction.
//!
//! Both operations walk validated content depth-first, guided by the schema
//! rather than by the raw value shape: only nodes the schema types as `File`
//! are touched, so a user object that merely looks like a file is left alone.
//!
//! - [`extract_referenced_file_ids`] collects the id of every file node in
//!   reference form, deduplicated, insertion order preserved.
//! - [`extract_and_convert_proto_files`] replaces every inline payload with a
//!   freshly minted reference and returns the stripped bytes as a sidecar, in
//!   encounter order. Running it again on the converted content yields no new
//!   files.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde_json::Value;
use uuid::Uuid;

use crate::schema::errors::PathSegment;
use crate::schema::{classify_file_value, FileForm, Schema, SchemaError, TypeDefinition};
use crate::schema::MAX_RESOLUTION_DEPTH;

use super::errors::{FileExtractError, FileExtractResult};
use super::types::{NewFile, ProtoFile};

/// Result of converting inline file payloads out of content.
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    /// The content with every inline payload replaced by a file reference.
    pub converted_content: Value,
    /// Stripped payloads in encounter order.
    pub new_files: Vec<NewFile>,
}

/// Collects the ids of all persisted files referenced from content.
pub fn extract_referenced_file_ids(
    schema: &Schema,
    content: &Value,
) -> FileExtractResult<Vec<Uuid>> {
    let root = root_type(schema)?;
    let mut ids = Vec::new();
    let mut path = Vec::new();
    walk(schema, root, content, &mut path, 0, &mut |node, path| {
        if let Ok(FileForm::Stored) = classify_file_value(node) {
            let raw = node["id"].as_str().unwrap_or_default();
            let id = Uuid::parse_str(raw).map_err(|_| FileExtractError::InvalidFileId {
                path: path_string(path),
                id: raw.to_string(),
            })?;
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        Ok(())
    })?;
    Ok(ids)
}

/// Replaces every inline file payload with a freshly minted reference.
pub fn extract_and_convert_proto_files(
    schema: &Schema,
    content: Value,
) -> FileExtractResult<Extraction> {
    let root = root_type(schema)?;
    let mut converted = content;
    let mut new_files = Vec::new();
    let mut path = Vec::new();
    walk_mut(schema, root, &mut converted, &mut path, 0, &mut |node, path| {
        match classify_file_value(node) {
            Ok(FileForm::Proto) => {
                let name = node["name"].as_str().unwrap_or_default().to_string();
                let mime_type = node["mimeType"].as_str().unwrap_or_default().to_string();
                let encoded = node["content"].as_str().unwrap_or_default();
                let content =
                    BASE64
                        .decode(encoded)
                        .map_err(|_| FileExtractError::InvalidContent {
                            path: path_string(path),
                        })?;

                let proto = ProtoFile {
                    name,
                    mime_type,
                    content,
                };
                let id = Uuid::new_v4();
                *node = proto.to_ref(id).to_value();
                new_files.push(NewFile { id, proto });
                Ok(())
            }
            // Already-persisted references pass through unchanged.
            Ok(FileForm::Stored) => Ok(()),
            Err(message) => Err(FileExtractError::MalformedFileNode {
                path: path_string(path),
                message,
            }),
        }
    })?;
    Ok(Extraction {
        converted_content: converted,
        new_files,
    })
}

fn root_type(schema: &Schema) -> Result<&TypeDefinition, SchemaError> {
    schema
        .get(&schema.root_type)
        .ok_or_else(|| SchemaError::UnknownRootType(schema.root_type.clone()))
}

/// Depth-first, schema-guided walk over file-typed nodes.
///
/// Descends only where the schema and the value agree structurally; content
/// is validated before it gets here, so disagreements are simply skipped.
/// Only ref hops count toward the resolution depth guard.
fn walk(
    schema: &Schema,
    expected: &TypeDefinition,
    value: &Value,
    path: &mut Vec<PathSegment>,
    depth: usize,
    visit: &mut impl FnMut(&Value, &[PathSegment]) -> FileExtractResult<()>,
) -> FileExtractResult<()> {
    if depth > MAX_RESOLUTION_DEPTH {
        return Err(SchemaError::DepthExceeded(MAX_RESOLUTION_DEPTH).into());
    }
    match expected {
        TypeDefinition::File => {
            if !value.is_null() {
                visit(value, path)?;
            }
        }
        TypeDefinition::Struct { properties, .. } => {
            if let Some(object) = value.as_object() {
                for (name, property_type) in properties {
                    if let Some(property_value) = object.get(name) {
                        path.push(PathSegment::Key(name.clone()));
                        walk(schema, property_type, property_value, path, depth, visit)?;
                        path.pop();
                    }
                }
            }
        }
        TypeDefinition::List { items } => {
            if let Some(elements) = value.as_array() {
                for (index, element) in elements.iter().enumerate() {
                    path.push(PathSegment::Index(index));
                    walk(schema, items, element, path, depth, visit)?;
                    path.pop();
                }
            }
        }
        TypeDefinition::Ref { name } => {
            let target = schema
                .get(name)
                .ok_or_else(|| SchemaError::UnresolvedRef(name.clone()))?;
            walk(schema, target, value, path, depth + 1, visit)?;
        }
        _ => {}
    }
    Ok(())
}

/// Mutable twin of [`walk`], used by conversion to replace nodes in place.
fn walk_mut(
    schema: &Schema,
    expected: &TypeDefinition,
    value: &mut Value,
    path: &mut Vec<PathSegment>,
    depth: usize,
    visit: &mut impl FnMut(&mut Value, &[PathSegment]) -> FileExtractResult<()>,
) -> FileExtractResult<()> {
    if depth > MAX_RESOLUTION_DEPTH {
        return Err(SchemaError::DepthExceeded(MAX_RESOLUTION_DEPTH).into());
    }
    match expected {
        TypeDefinition::File => {
            if !value.is_null() {
                visit(value, path)?;
            }
        }
        TypeDefinition::Struct { properties, .. } => {
            if let Some(object) = value.as_object_mut() {
                for (name, property_type) in properties {
                    if let Some(property_value) = object.get_mut(name) {
                        path.push(PathSegment::Key(name.clone()));
                        walk_mut(schema, property_type, property_value, path, depth, visit)?;
                        path.pop();
                    }
                }
            }
        }
        TypeDefinition::List { items } => {
            if let Some(elements) = value.as_array_mut() {
                for (index, element) in elements.iter_mut().enumerate() {
                    path.push(PathSegment::Index(index));
                    walk_mut(schema, items, element, path, depth, visit)?;
                    path.pop();
                }
            }
        }
        TypeDefinition::Ref { name } => {
            let target = schema
                .get(name)
                .ok_or_else(|| SchemaError::UnresolvedRef(name.clone()))?
                .clone();
            walk_mut(schema, &target, value, path, depth + 1, visit)?;
        }
        _ => {}
    }
    Ok(())
}

fn path_string(path: &[PathSegment]) -> String {
    let mut out = String::from("$");
    for segment in path {
        out.push_str(&segment.to_string());
    }
    out
}
