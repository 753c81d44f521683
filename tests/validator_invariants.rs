//! Content validation invariants: findings are data, validation is
//! deterministic, struct matching is exact, and file nodes match exactly one
//! of the two file shapes.

use std::collections::{BTreeMap, BTreeSet};

use proptest::prelude::*;
use serde_json::{json, Value};

use morphdb::schema::{check_schema, validate, Schema, SchemaError, TypeDefinition};

fn article_schema() -> Schema {
    let mut author = BTreeMap::new();
    author.insert("name".to_string(), TypeDefinition::String);
    author.insert(
        "role".to_string(),
        TypeDefinition::enum_of(["writer", "editor"]),
    );

    let mut properties = BTreeMap::new();
    properties.insert("title".to_string(), TypeDefinition::String);
    properties.insert("stars".to_string(), TypeDefinition::Number);
    properties.insert(
        "authors".to_string(),
        TypeDefinition::list_of(TypeDefinition::reference("Author")),
    );
    properties.insert("cover".to_string(), TypeDefinition::File);
    let mut nullable = BTreeSet::new();
    nullable.insert("cover".to_string());

    let mut types = BTreeMap::new();
    types.insert(
        "Root".to_string(),
        TypeDefinition::Struct {
            properties,
            nullable_properties: nullable,
        },
    );
    types.insert("Author".to_string(), TypeDefinition::struct_of(author));
    Schema::new(types, "Root")
}

fn conforming() -> Value {
    json!({
        "title": "a",
        "stars": 4,
        "authors": [{ "name": "n", "role": "writer" }]
    })
}

#[test]
fn conforming_content_has_no_issues() {
    let issues = validate(&article_schema(), &conforming()).unwrap();
    assert!(issues.is_empty(), "unexpected issues: {issues:?}");
}

#[test]
fn missing_and_extra_properties_are_both_issues() {
    let schema = article_schema();

    let missing = json!({ "title": "a", "stars": 4 });
    let issues = validate(&schema, &missing).unwrap();
    assert!(issues.iter().any(|issue| issue.to_string().contains("authors")));

    let mut extra = conforming();
    extra["surprise"] = json!(true);
    let issues = validate(&schema, &extra).unwrap();
    assert!(issues.iter().any(|issue| issue.to_string().contains("surprise")));
}

#[test]
fn nullable_properties_accept_null_and_absence() {
    let schema = article_schema();
    let mut with_null = conforming();
    with_null["cover"] = Value::Null;
    assert!(validate(&schema, &with_null).unwrap().is_empty());
    assert!(validate(&schema, &conforming()).unwrap().is_empty());

    // Non-nullable properties accept neither.
    let mut null_title = conforming();
    null_title["title"] = Value::Null;
    assert!(!validate(&schema, &null_title).unwrap().is_empty());
}

#[test]
fn issues_carry_full_paths_into_nested_content() {
    let schema = article_schema();
    let mut content = conforming();
    content["authors"][0]["role"] = json!("intern");

    let issues = validate(&schema, &content).unwrap();
    assert_eq!(issues.len(), 1);
    assert!(issues[0].to_string().starts_with("$.authors[0].role"));
}

#[test]
fn validation_is_deterministic() {
    let schema = article_schema();
    let broken = json!({
        "title": 1,
        "stars": "four",
        "authors": [{ "name": 2, "role": "ghost" }],
        "extra": null
    });

    let first: Vec<String> = validate(&schema, &broken)
        .unwrap()
        .iter()
        .map(ToString::to_string)
        .collect();
    let second: Vec<String> = validate(&schema, &broken)
        .unwrap()
        .iter()
        .map(ToString::to_string)
        .collect();
    assert_eq!(first, second);
    assert!(!first.is_empty());
}

#[test]
fn file_nodes_match_exactly_one_shape() {
    let schema = article_schema();

    let mut proto = conforming();
    proto["cover"] = json!({ "name": "c.png", "mimeType": "image/png", "content": "aGk=" });
    assert!(validate(&schema, &proto).unwrap().is_empty());

    let mut stored = conforming();
    stored["cover"] = json!({ "id": "x", "name": "c.png", "mimeType": "image/png" });
    assert!(validate(&schema, &stored).unwrap().is_empty());

    // Both shapes at once is not a file.
    let mut both = conforming();
    both["cover"] = json!({
        "id": "x", "name": "c.png", "mimeType": "image/png", "content": "aGk="
    });
    assert!(!validate(&schema, &both).unwrap().is_empty());

    // Neither shape is not a file either.
    let mut neither = conforming();
    neither["cover"] = json!({ "name": "c.png" });
    assert!(!validate(&schema, &neither).unwrap().is_empty());
}

#[test]
fn malformed_schema_is_an_error_not_an_issue() {
    let mut properties = BTreeMap::new();
    properties.insert("x".to_string(), TypeDefinition::reference("Nowhere"));
    let schema = Schema::single_struct(properties);

    assert!(!check_schema(&schema).is_empty());
    let result = validate(&schema, &json!({ "x": 1 }));
    assert!(matches!(result, Err(SchemaError::UnresolvedRef(_))));
}

/// Flat schemas over the primitive kinds, paired with a conforming value.
fn flat_schema_strategy() -> impl Strategy<Value = (Schema, Value)> {
    prop::collection::btree_map("[a-z][a-z0-9]{0,7}", 0..3u8, 1..6).prop_map(|fields| {
        let mut properties = BTreeMap::new();
        let mut object = serde_json::Map::new();
        for (name, kind) in fields {
            let (definition, value) = match kind {
                0 => (TypeDefinition::String, json!("s")),
                1 => (TypeDefinition::Number, json!(1.5)),
                _ => (TypeDefinition::Boolean, json!(true)),
            };
            properties.insert(name.clone(), definition);
            object.insert(name, value);
        }
        (Schema::single_struct(properties), Value::Object(object))
    })
}

proptest! {
    #[test]
    fn generated_conforming_values_validate((schema, value) in flat_schema_strategy()) {
        let issues = validate(&schema, &value).unwrap();
        prop_assert!(issues.is_empty());
    }

    #[test]
    fn extra_key_is_always_flagged((schema, mut value) in flat_schema_strategy()) {
        value["zzzz_extra"] = json!(null);
        let issues = validate(&schema, &value).unwrap();
        prop_assert!(!issues.is_empty());
    }

    #[test]
    fn wrong_type_is_always_flagged((schema, mut value) in flat_schema_strategy()) {
        let key = value
            .as_object()
            .unwrap()
            .keys()
            .next()
            .cloned()
            .expect("strategy emits at least one property");
        // An array conforms to none of the primitive kinds.
        value[&key] = json!([]);
        let issues = validate(&schema, &value).unwrap();
        prop_assert!(!issues.is_empty());
    }
}
