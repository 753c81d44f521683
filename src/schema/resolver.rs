//! Ref resolution and schema well-formedness.
//!
//! The type arena is a flat name-to-definition map; `Ref` variants are
//! resolved by name lookup rather than language-native pointers. Resolution
//! is depth-guarded so a cyclic schema that slipped past load-time checks
//! surfaces as a `SchemaError` instead of unbounded recursion.
//!
//! Well-formedness rules enforced by [`check_schema`]:
//! - every `Ref` (anywhere in the graph) resolves to a defined type name
//! - the root type resolves to a `Struct`
//! - `nullable_properties` only names declared properties
//! - named refs form no cycle

use std::collections::BTreeMap;

use super::errors::{Issue, SchemaError};
use super::types::{Schema, TypeDefinition};

/// Maximum number of `Ref` hops followed during resolution.
pub const MAX_RESOLUTION_DEPTH: usize = 64;

/// Follows `Ref` indirections until a concrete definition is reached.
///
/// Non-ref definitions are returned unchanged. Errors are programmer errors:
/// the schema should have been checked with [`check_schema`] first.
pub fn resolve<'a>(
    schema: &'a Schema,
    definition: &'a TypeDefinition,
) -> Result<&'a TypeDefinition, SchemaError> {
    let mut current = definition;
    let mut depth = 0;
    while let TypeDefinition::Ref { name } = current {
        depth += 1;
        if depth > MAX_RESOLUTION_DEPTH {
            return Err(SchemaError::DepthExceeded(MAX_RESOLUTION_DEPTH));
        }
        current = schema
            .get(name)
            .ok_or_else(|| SchemaError::UnresolvedRef(name.clone()))?;
    }
    Ok(current)
}

/// Resolves a type by name, following any further `Ref` indirections.
pub fn resolve_name<'a>(schema: &'a Schema, name: &str) -> Result<&'a TypeDefinition, SchemaError> {
    let definition = schema
        .get(name)
        .ok_or_else(|| SchemaError::UnresolvedRef(name.to_string()))?;
    resolve(schema, definition)
}

/// Resolves the schema's root type.
pub fn resolve_root(schema: &Schema) -> Result<&TypeDefinition, SchemaError> {
    schema
        .get(&schema.root_type)
        .ok_or_else(|| SchemaError::UnknownRootType(schema.root_type.clone()))
        .and_then(|definition| resolve(schema, definition))
}

/// Checks a schema for well-formedness, returning all findings as data.
///
/// An empty result means the schema is safe to validate against, feed to
/// codegen, and walk for file extraction.
pub fn check_schema(schema: &Schema) -> Vec<Issue> {
    let mut issues = Vec::new();

    // Root must exist and resolve to a struct.
    match resolve_root(schema) {
        Ok(TypeDefinition::Struct { .. }) => {}
        Ok(other) => issues.push(Issue::at_root(format!(
            "root type '{}' must be a struct, got {}",
            schema.root_type,
            other.type_name()
        ))),
        Err(SchemaError::DepthExceeded(_)) => {
            // Reported below by the cycle check with the offending name.
        }
        Err(_) => issues.push(Issue::at_root(format!(
            "root type '{}' is not defined",
            schema.root_type
        ))),
    }

    // Every ref in every definition must resolve.
    for (name, definition) in &schema.types {
        check_refs(schema, name, definition, &mut issues);
    }

    // Named refs must form no cycle.
    let mut states: BTreeMap<&str, VisitState> = BTreeMap::new();
    for name in schema.types.keys() {
        if detect_cycle(schema, name, &mut states) {
            issues.push(Issue::at_root(format!(
                "type '{}' participates in a reference cycle",
                name
            )));
        }
    }

    issues
}

fn check_refs(schema: &Schema, owner: &str, definition: &TypeDefinition, issues: &mut Vec<Issue>) {
    match definition {
        TypeDefinition::Ref { name } => {
            if schema.get(name).is_none() {
                issues.push(Issue::at_root(format!(
                    "type '{}' references undefined type '{}'",
                    owner, name
                )));
            }
        }
        TypeDefinition::Struct {
            properties,
            nullable_properties,
        } => {
            for missing in nullable_properties
                .iter()
                .filter(|name| !properties.contains_key(*name))
            {
                issues.push(Issue::at_root(format!(
                    "type '{}' marks undeclared property '{}' nullable",
                    owner, missing
                )));
            }
            for property in properties.values() {
                check_refs(schema, owner, property, issues);
            }
        }
        TypeDefinition::List { items } => check_refs(schema, owner, items, issues),
        _ => {}
    }
}

#[derive(Clone, Copy, PartialEq)]
enum VisitState {
    InProgress,
    Done,
}

/// DFS over the named-ref graph. Returns true if `name` sits on a cycle not
/// already reported through an earlier entry point.
fn detect_cycle<'a>(
    schema: &'a Schema,
    name: &'a str,
    states: &mut BTreeMap<&'a str, VisitState>,
) -> bool {
    match states.get(name) {
        Some(VisitState::Done) => return false,
        Some(VisitState::InProgress) => return true,
        None => {}
    }
    states.insert(name, VisitState::InProgress);

    let mut cyclic = false;
    if let Some(definition) = schema.get(name) {
        for target in named_refs(definition) {
            if detect_cycle(schema, target, states) {
                cyclic = true;
                break;
            }
        }
    }

    states.insert(name, VisitState::Done);
    cyclic
}

/// Names referenced directly from a definition, without following them.
fn named_refs(definition: &TypeDefinition) -> Vec<&str> {
    let mut names = Vec::new();
    collect_named_refs(definition, &mut names);
    names
}

fn collect_named_refs<'a>(definition: &'a TypeDefinition, names: &mut Vec<&'a str>) {
    match definition {
        TypeDefinition::Ref { name } => names.push(name),
        TypeDefinition::Struct { properties, .. } => {
            for property in properties.values() {
                collect_named_refs(property, names);
            }
        }
        TypeDefinition::List { items } => collect_named_refs(items, names),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn schema_with(types: Vec<(&str, TypeDefinition)>, root: &str) -> Schema {
        let types: BTreeMap<String, TypeDefinition> = types
            .into_iter()
            .map(|(name, definition)| (name.to_string(), definition))
            .collect();
        Schema::new(types, root)
    }

    #[test]
    fn test_resolve_follows_ref_chain() {
        let schema = schema_with(
            vec![
                ("A", TypeDefinition::reference("B")),
                ("B", TypeDefinition::String),
            ],
            "A",
        );
        let resolved = resolve_name(&schema, "A").unwrap();
        assert_eq!(resolved, &TypeDefinition::String);
    }

    #[test]
    fn test_resolve_unknown_name() {
        let schema = schema_with(vec![("A", TypeDefinition::String)], "A");
        assert_eq!(
            resolve_name(&schema, "Nope"),
            Err(SchemaError::UnresolvedRef("Nope".into()))
        );
    }

    #[test]
    fn test_resolve_cycle_hits_depth_guard() {
        let schema = schema_with(
            vec![
                ("A", TypeDefinition::reference("B")),
                ("B", TypeDefinition::reference("A")),
            ],
            "A",
        );
        assert_eq!(
            resolve_name(&schema, "A"),
            Err(SchemaError::DepthExceeded(MAX_RESOLUTION_DEPTH))
        );
    }

    #[test]
    fn test_check_valid_schema() {
        let mut properties = BTreeMap::new();
        properties.insert("title".to_string(), TypeDefinition::String);
        properties.insert("status".to_string(), TypeDefinition::reference("Status"));

        let schema = schema_with(
            vec![
                ("Root", TypeDefinition::struct_of(properties)),
                ("Status", TypeDefinition::enum_of(["open", "closed"])),
            ],
            "Root",
        );
        assert!(check_schema(&schema).is_empty());
    }

    #[test]
    fn test_check_root_must_be_struct() {
        let schema = schema_with(vec![("Root", TypeDefinition::String)], "Root");
        let issues = check_schema(&schema);
        assert_eq!(issues.len(), 1);
        assert!(issues[0].message.contains("must be a struct"));
    }

    #[test]
    fn test_check_missing_root() {
        let schema = schema_with(vec![("A", TypeDefinition::String)], "Root");
        let issues = check_schema(&schema);
        assert!(issues
            .iter()
            .any(|issue| issue.message.contains("'Root' is not defined")));
    }

    #[test]
    fn test_check_undefined_ref() {
        let mut properties = BTreeMap::new();
        properties.insert("other".to_string(), TypeDefinition::reference("Missing"));
        let schema = schema_with(vec![("Root", TypeDefinition::struct_of(properties))], "Root");

        let issues = check_schema(&schema);
        assert!(issues
            .iter()
            .any(|issue| issue.message.contains("undefined type 'Missing'")));
    }

    #[test]
    fn test_check_nullable_must_be_declared() {
        let mut properties = BTreeMap::new();
        properties.insert("title".to_string(), TypeDefinition::String);
        let mut nullable = std::collections::BTreeSet::new();
        nullable.insert("ghost".to_string());

        let schema = schema_with(
            vec![(
                "Root",
                TypeDefinition::Struct {
                    properties,
                    nullable_properties: nullable,
                },
            )],
            "Root",
        );

        let issues = check_schema(&schema);
        assert!(issues
            .iter()
            .any(|issue| issue.message.contains("'ghost' nullable")));
    }

    #[test]
    fn test_check_rejects_cycles() {
        let mut a_props = BTreeMap::new();
        a_props.insert("b".to_string(), TypeDefinition::reference("B"));
        let mut b_props = BTreeMap::new();
        b_props.insert("a".to_string(), TypeDefinition::reference("A"));

        let schema = schema_with(
            vec![
                ("A", TypeDefinition::struct_of(a_props)),
                ("B", TypeDefinition::struct_of(b_props)),
            ],
            "A",
        );

        let issues = check_schema(&schema);
        assert!(issues
            .iter()
            .any(|issue| issue.message.contains("reference cycle")));
    }

    #[test]
    fn test_check_allows_shared_refs() {
        // Diamond sharing is a DAG, not a cycle.
        let mut root_props = BTreeMap::new();
        root_props.insert("left".to_string(), TypeDefinition::reference("Shared"));
        root_props.insert("right".to_string(), TypeDefinition::reference("Shared"));

        let schema = schema_with(
            vec![
                ("Root", TypeDefinition::struct_of(root_props)),
                ("Shared", TypeDefinition::String),
            ],
            "Root",
        );
        assert!(check_schema(&schema).is_empty());
    }
}
