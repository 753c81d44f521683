//! Content validation against a schema.
//!
//! Validation semantics:
//! - Structs match exactly: all declared properties, no extras; properties
//!   listed as nullable may be `null` or absent.
//! - Lists validate every element against the item type.
//! - Enums and literals compare against the declared values.
//! - File nodes match exactly one of the two file shapes: an inline
//!   ProtoFile (`name`, `mimeType`, `content`) or a persisted FileRef
//!   (`id`, `name`, `mimeType`). Never both, never neither.
//! - Document references are stored as the referenced document's id.
//!
//! Invalid user data never raises: findings come back as a list of
//! [`Issue`]s, and an empty list means the value conforms. Only a malformed
//! schema (unresolved ref, runaway ref depth) produces a `SchemaError`.

use serde_json::{Map, Value};

use super::errors::{Issue, PathSegment, SchemaError};
use super::resolver;
use super::types::{Schema, TypeDefinition};

/// Which of the two file shapes a JSON value takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileForm {
    /// Inline not-yet-persisted payload: `name`, `mimeType`, `content`.
    Proto,
    /// Persisted file reference: `id`, `name`, `mimeType`.
    Stored,
}

/// Classifies a value as one of the two file shapes.
///
/// Returns a description of the mismatch otherwise.
pub fn classify_file_value(value: &Value) -> Result<FileForm, String> {
    let object = match value.as_object() {
        Some(object) => object,
        None => return Err(format!("expected file, got {}", json_type_name(value))),
    };

    let has_id = object.contains_key("id");
    let has_content = object.contains_key("content");
    if has_id && has_content {
        return Err("file matches both the inline and the reference shape".into());
    }

    let string_key = |key: &str| object.get(key).map(Value::is_string).unwrap_or(false);
    if !string_key("name") || !string_key("mimeType") {
        return Err("file requires string 'name' and 'mimeType'".into());
    }

    if has_content {
        if object.len() != 3 || !string_key("content") {
            return Err("inline file must be exactly {name, mimeType, content}".into());
        }
        return Ok(FileForm::Proto);
    }
    if has_id {
        if object.len() != 3 || !string_key("id") {
            return Err("file reference must be exactly {id, name, mimeType}".into());
        }
        return Ok(FileForm::Stored);
    }
    Err("file matches neither the inline nor the reference shape".into())
}

/// Validates a value against a schema.
///
/// An empty issue list means the value conforms to the schema's root type.
pub fn validate(schema: &Schema, value: &Value) -> Result<Vec<Issue>, SchemaError> {
    let root = schema
        .get(&schema.root_type)
        .ok_or_else(|| SchemaError::UnknownRootType(schema.root_type.clone()))?;

    let mut issues = Vec::new();
    let mut path = Vec::new();
    validate_value(schema, root, value, &mut path, &mut issues)?;
    Ok(issues)
}

fn validate_value(
    schema: &Schema,
    expected: &TypeDefinition,
    value: &Value,
    path: &mut Vec<PathSegment>,
    issues: &mut Vec<Issue>,
) -> Result<(), SchemaError> {
    // Only ref hops are depth-guarded; plain nesting is bounded by the
    // content itself.
    let expected = resolver::resolve(schema, expected)?;

    match expected {
        TypeDefinition::String => {
            if !value.is_string() {
                report(issues, path, format!("expected string, got {}", json_type_name(value)));
            }
        }
        TypeDefinition::Number => {
            if !value.is_number() {
                report(issues, path, format!("expected number, got {}", json_type_name(value)));
            }
        }
        TypeDefinition::Boolean => {
            if !value.is_boolean() {
                report(issues, path, format!("expected boolean, got {}", json_type_name(value)));
            }
        }
        TypeDefinition::Enum { members } => match value.as_str() {
            Some(candidate) if members.iter().any(|member| member.value == candidate) => {}
            Some(candidate) => report(
                issues,
                path,
                format!("'{}' is not a member of the enum", candidate),
            ),
            None => report(
                issues,
                path,
                format!("expected enum value, got {}", json_type_name(value)),
            ),
        },
        TypeDefinition::StringLiteral { value: literal } => {
            if value.as_str() != Some(literal.as_str()) {
                report(issues, path, format!("expected the literal \"{}\"", literal));
            }
        }
        TypeDefinition::NumberLiteral { value: literal } => {
            let matches = value
                .as_number()
                .map(|number| number == literal)
                .unwrap_or(false);
            if !matches {
                report(issues, path, format!("expected the literal {}", literal));
            }
        }
        TypeDefinition::BooleanLiteral { value: literal } => {
            if value.as_bool() != Some(*literal) {
                report(issues, path, format!("expected the literal {}", literal));
            }
        }
        TypeDefinition::JsonObject => {
            if !value.is_object() {
                report(issues, path, format!("expected object, got {}", json_type_name(value)));
            }
        }
        TypeDefinition::File => {
            if let Err(message) = classify_file_value(value) {
                report(issues, path, message);
            }
        }
        TypeDefinition::DocumentRef { .. } => {
            if !value.is_string() {
                report(
                    issues,
                    path,
                    format!("expected document id, got {}", json_type_name(value)),
                );
            }
        }
        TypeDefinition::Struct {
            properties,
            nullable_properties,
        } => match value.as_object() {
            Some(object) => {
                validate_struct(schema, properties, nullable_properties, object, path, issues)?
            }
            None => report(issues, path, format!("expected object, got {}", json_type_name(value))),
        },
        TypeDefinition::List { items } => match value.as_array() {
            Some(elements) => {
                for (index, element) in elements.iter().enumerate() {
                    path.push(PathSegment::Index(index));
                    validate_value(schema, items, element, path, issues)?;
                    path.pop();
                }
            }
            None => report(issues, path, format!("expected list, got {}", json_type_name(value))),
        },
        // Refs were resolved above.
        TypeDefinition::Ref { .. } => unreachable!("resolve returns concrete definitions"),
    }
    Ok(())
}

fn validate_struct(
    schema: &Schema,
    properties: &std::collections::BTreeMap<String, TypeDefinition>,
    nullable_properties: &std::collections::BTreeSet<String>,
    object: &Map<String, Value>,
    path: &mut Vec<PathSegment>,
    issues: &mut Vec<Issue>,
) -> Result<(), SchemaError> {
    // No undeclared properties.
    for key in object.keys() {
        if !properties.contains_key(key) {
            path.push(PathSegment::Key(key.clone()));
            report(issues, path, "undeclared property");
            path.pop();
        }
    }

    for (name, property_type) in properties {
        let nullable = nullable_properties.contains(name);
        match object.get(name) {
            Some(Value::Null) => {
                if !nullable {
                    path.push(PathSegment::Key(name.clone()));
                    report(issues, path, "property is not nullable");
                    path.pop();
                }
            }
            Some(property_value) => {
                path.push(PathSegment::Key(name.clone()));
                validate_value(schema, property_type, property_value, path, issues)?;
                path.pop();
            }
            None => {
                if !nullable {
                    path.push(PathSegment::Key(name.clone()));
                    report(issues, path, "missing required property");
                    path.pop();
                }
            }
        }
    }
    Ok(())
}

fn report(issues: &mut Vec<Issue>, path: &[PathSegment], message: impl Into<String>) {
    issues.push(Issue::new(path.to_vec(), message));
}

/// Returns the JSON type name for error messages.
fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}
