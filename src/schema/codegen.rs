//! Schema-to-declaration codegen.
//!
//! Renders a schema as WIT (WebAssembly Interface Types) declarations, the
//! declaration language of the sandbox toolchain. The output is handed to
//! [`crate::sandbox::SandboxEngine::compile`] as a library module so that
//! user functions are compiled against the collection's current shape.
//!
//! Output contract:
//! - one declaration per named schema type (`enum` for enums, `record` for
//!   structs, a `type` alias otherwise)
//! - inline composites are hoisted into synthesized named declarations
//! - built-in helper declarations (json-object, document-ref, the file
//!   variant) are emitted once, and only if referenced
//! - deterministic: identical schemas yield byte-identical output, because
//!   compiled output is keyed by content hash downstream

use super::errors::SchemaError;
use super::types::{EnumMember, Schema, TypeDefinition};

/// Name of the generated library module handed to the sandbox compiler.
pub const GENERATED_MODULE_NAME: &str = "schema.wit";

/// Renders a schema as WIT type declarations.
pub fn codegen(schema: &Schema) -> Result<String, SchemaError> {
    let mut renderer = Renderer::new(schema);
    for (name, definition) in &schema.types {
        renderer.render_named(name, definition)?;
    }

    let mut out = String::new();
    out.push_str("package morphdb:collections;\n\n");
    out.push_str("interface schema-types {\n");
    for helper in renderer.helpers() {
        out.push_str(helper);
        out.push('\n');
    }
    for declaration in &renderer.declarations {
        out.push_str(declaration);
        out.push('\n');
    }
    out.push_str("}\n");
    Ok(out)
}

struct Renderer<'a> {
    schema: &'a Schema,
    declarations: Vec<String>,
    uses_json_object: bool,
    uses_document_ref: bool,
    uses_file: bool,
}

impl<'a> Renderer<'a> {
    fn new(schema: &'a Schema) -> Self {
        Self {
            schema,
            declarations: Vec::new(),
            uses_json_object: false,
            uses_document_ref: false,
            uses_file: false,
        }
    }

    fn helpers(&self) -> Vec<&'static str> {
        let mut helpers = Vec::new();
        if self.uses_json_object {
            helpers.push(
                "  /// Arbitrary JSON value, encoded as a string.\n  type json-object = string;\n",
            );
        }
        if self.uses_document_ref {
            helpers
                .push("  /// Id of a document in another collection.\n  type document-ref = string;\n");
        }
        if self.uses_file {
            helpers.push(
                "  /// Inline not-yet-persisted file payload.\n  record proto-file {\n    name: string,\n    mime-type: string,\n    content: list<u8>,\n  }\n",
            );
            helpers.push(
                "  /// Reference to a persisted file.\n  record file-ref {\n    id: string,\n    name: string,\n    mime-type: string,\n  }\n",
            );
            helpers.push(
                "  /// An embedded file, inline or persisted.\n  variant file-value {\n    proto(proto-file),\n    stored(file-ref),\n  }\n",
            );
        }
        helpers
    }

    /// Renders one named declaration plus any composites hoisted out of it.
    fn render_named(&mut self, name: &str, definition: &TypeDefinition) -> Result<(), SchemaError> {
        let mut hoisted: Vec<(String, TypeDefinition)> = Vec::new();
        let declaration = self.declaration(&wit_ident(name), definition, &mut hoisted)?;
        self.declarations.push(declaration);
        // Hoisted composites may hoist further; process in encounter order.
        while !hoisted.is_empty() {
            let batch: Vec<_> = hoisted.drain(..).collect();
            for (synthesized_name, synthesized) in batch {
                let declaration = self.declaration(&synthesized_name, &synthesized, &mut hoisted)?;
                self.declarations.push(declaration);
            }
        }
        Ok(())
    }

    fn declaration(
        &mut self,
        name: &str,
        definition: &TypeDefinition,
        hoisted: &mut Vec<(String, TypeDefinition)>,
    ) -> Result<String, SchemaError> {
        Ok(match definition {
            TypeDefinition::Struct {
                properties,
                nullable_properties,
            } => {
                let mut out = format!("  record {} {{\n", name);
                for (property, property_type) in properties {
                    let rendered =
                        self.type_expr(name, property, property_type, hoisted)?;
                    let rendered = if nullable_properties.contains(property) {
                        format!("option<{}>", rendered)
                    } else {
                        rendered
                    };
                    out.push_str(&format!("    {}: {},\n", wit_ident(property), rendered));
                }
                out.push_str("  }\n");
                out
            }
            TypeDefinition::Enum { members } => render_enum(name, members),
            other => {
                let mut doc = String::new();
                match other {
                    TypeDefinition::StringLiteral { value } => {
                        doc = format!("  /// Always the literal \"{}\".\n", value);
                    }
                    TypeDefinition::NumberLiteral { value } => {
                        doc = format!("  /// Always the literal {}.\n", value);
                    }
                    TypeDefinition::BooleanLiteral { value } => {
                        doc = format!("  /// Always the literal {}.\n", value);
                    }
                    _ => {}
                }
                let rendered = self.type_expr(name, "alias", other, hoisted)?;
                format!("{}  type {} = {};\n", doc, name, rendered)
            }
        })
    }

    /// Renders a type expression usable in a field or alias position.
    fn type_expr(
        &mut self,
        owner: &str,
        property: &str,
        definition: &TypeDefinition,
        hoisted: &mut Vec<(String, TypeDefinition)>,
    ) -> Result<String, SchemaError> {
        Ok(match definition {
            TypeDefinition::String | TypeDefinition::StringLiteral { .. } => "string".to_string(),
            TypeDefinition::Number | TypeDefinition::NumberLiteral { .. } => "f64".to_string(),
            TypeDefinition::Boolean | TypeDefinition::BooleanLiteral { .. } => "bool".to_string(),
            TypeDefinition::JsonObject => {
                self.uses_json_object = true;
                "json-object".to_string()
            }
            TypeDefinition::DocumentRef { .. } => {
                self.uses_document_ref = true;
                "document-ref".to_string()
            }
            TypeDefinition::File => {
                self.uses_file = true;
                "file-value".to_string()
            }
            TypeDefinition::List { items } => {
                format!("list<{}>", self.type_expr(owner, property, items, hoisted)?)
            }
            TypeDefinition::Ref { name } => {
                if self.schema.get(name).is_none() {
                    return Err(SchemaError::UnresolvedRef(name.clone()));
                }
                wit_ident(name)
            }
            composite @ (TypeDefinition::Struct { .. } | TypeDefinition::Enum { .. }) => {
                let synthesized = format!("{}-{}", owner, wit_ident(property));
                hoisted.push((synthesized.clone(), composite.clone()));
                synthesized
            }
        })
    }
}

fn render_enum(name: &str, members: &[EnumMember]) -> String {
    let mut out = format!("  enum {} {{\n", name);
    let mut used = Vec::new();
    for member in members {
        let mut case = wit_ident(&member.value);
        if used.contains(&case) {
            case = format!("{}-{}", case, used.len());
        }
        match &member.description {
            Some(description) => {
                out.push_str(&format!(
                    "    /// value: \"{}\" - {}\n",
                    member.value, description
                ));
            }
            None => out.push_str(&format!("    /// value: \"{}\"\n", member.value)),
        }
        out.push_str(&format!("    {},\n", case));
        used.push(case);
    }
    out.push_str("  }\n");
    out
}

/// Mangles an arbitrary name into a WIT kebab-case identifier.
fn wit_ident(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    let mut previous_lower = false;
    for character in name.chars() {
        if character.is_ascii_alphanumeric() {
            if character.is_ascii_uppercase() {
                if previous_lower {
                    out.push('-');
                }
                out.push(character.to_ascii_lowercase());
                previous_lower = false;
            } else {
                out.push(character);
                previous_lower = true;
            }
        } else if !out.ends_with('-') && !out.is_empty() {
            out.push('-');
            previous_lower = false;
        }
    }
    let trimmed = out.trim_matches('-');
    let mut ident = trimmed.to_string();
    if ident.is_empty() {
        ident = "v".to_string();
    } else if ident.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        ident = format!("v{}", ident);
    }
    ident
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn sample_schema() -> Schema {
        let mut author = BTreeMap::new();
        author.insert("name".to_string(), TypeDefinition::String);

        let mut properties = BTreeMap::new();
        properties.insert("title".to_string(), TypeDefinition::String);
        properties.insert("views".to_string(), TypeDefinition::Number);
        properties.insert("author".to_string(), TypeDefinition::reference("Author"));
        properties.insert(
            "status".to_string(),
            TypeDefinition::enum_of(["draft", "published"]),
        );

        let mut nullable = std::collections::BTreeSet::new();
        nullable.insert("views".to_string());

        let mut types = BTreeMap::new();
        types.insert(
            "BlogPost".to_string(),
            TypeDefinition::Struct {
                properties,
                nullable_properties: nullable,
            },
        );
        types.insert("Author".to_string(), TypeDefinition::struct_of(author));
        Schema::new(types, "BlogPost")
    }

    #[test]
    fn test_codegen_is_deterministic() {
        let schema = sample_schema();
        let first = codegen(&schema).unwrap();
        for _ in 0..5 {
            assert_eq!(codegen(&schema).unwrap(), first);
        }
    }

    #[test]
    fn test_record_rendering() {
        let output = codegen(&sample_schema()).unwrap();
        assert!(output.contains("record blog-post {"));
        assert!(output.contains("title: string,"));
        assert!(output.contains("views: option<f64>,"));
        assert!(output.contains("author: author,"));
        assert!(output.contains("record author {"));
    }

    #[test]
    fn test_inline_enum_is_hoisted() {
        let output = codegen(&sample_schema()).unwrap();
        assert!(output.contains("status: blog-post-status,"));
        assert!(output.contains("enum blog-post-status {"));
        assert!(output.contains("/// value: \"draft\""));
    }

    #[test]
    fn test_helpers_only_when_referenced() {
        let output = codegen(&sample_schema()).unwrap();
        assert!(!output.contains("json-object"));
        assert!(!output.contains("file-value"));

        let mut properties = BTreeMap::new();
        properties.insert("meta".to_string(), TypeDefinition::JsonObject);
        properties.insert("attachment".to_string(), TypeDefinition::File);
        let with_helpers = codegen(&Schema::single_struct(properties)).unwrap();
        assert!(with_helpers.contains("type json-object = string;"));
        assert!(with_helpers.contains("variant file-value {"));
        assert!(with_helpers.contains("record proto-file {"));
        // Emitted once.
        assert_eq!(with_helpers.matches("record file-ref {").count(), 1);
    }

    #[test]
    fn test_named_literal_alias() {
        let mut types = BTreeMap::new();
        types.insert(
            "Kind".to_string(),
            TypeDefinition::StringLiteral {
                value: "post".into(),
            },
        );
        let mut properties = BTreeMap::new();
        properties.insert("kind".to_string(), TypeDefinition::reference("Kind"));
        types.insert("Root".to_string(), TypeDefinition::struct_of(properties));

        let output = codegen(&Schema::new(types, "Root")).unwrap();
        assert!(output.contains("/// Always the literal \"post\"."));
        assert!(output.contains("type kind = string;"));
        assert!(output.contains("kind: kind,"));
    }

    #[test]
    fn test_nested_lists() {
        let mut properties = BTreeMap::new();
        properties.insert(
            "matrix".to_string(),
            TypeDefinition::list_of(TypeDefinition::list_of(TypeDefinition::Number)),
        );
        let output = codegen(&Schema::single_struct(properties)).unwrap();
        assert!(output.contains("matrix: list<list<f64>>,"));
    }

    #[test]
    fn test_unresolved_ref_is_an_error() {
        let mut properties = BTreeMap::new();
        properties.insert("x".to_string(), TypeDefinition::reference("Missing"));
        let schema = Schema::single_struct(properties);
        assert_eq!(
            codegen(&schema),
            Err(SchemaError::UnresolvedRef("Missing".into()))
        );
    }

    #[test]
    fn test_key_order_is_normalized() {
        // Two construction orders, same schema value, same bytes out.
        let mut a = BTreeMap::new();
        a.insert("z".to_string(), TypeDefinition::String);
        a.insert("a".to_string(), TypeDefinition::Number);
        let mut b = BTreeMap::new();
        b.insert("a".to_string(), TypeDefinition::Number);
        b.insert("z".to_string(), TypeDefinition::String);

        assert_eq!(
            codegen(&Schema::single_struct(a)).unwrap(),
            codegen(&Schema::single_struct(b)).unwrap()
        );
    }

    #[test]
    fn test_ident_mangling() {
        assert_eq!(wit_ident("BlogPost"), "blog-post");
        assert_eq!(wit_ident("mimeType"), "mime-type");
        assert_eq!(wit_ident("with spaces!"), "with-spaces");
        assert_eq!(wit_ident("2fast"), "v2fast");
        assert_eq!(wit_ident(""), "v");
    }
}
