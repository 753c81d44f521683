//! Recursive, self-describing schema system.
//!
//! This module provides:
//! - `types` - the closed type-definition set and the `Schema` arena
//! - `resolver` - ref resolution and schema well-formedness checks
//! - `validator` - content validation returning findings as data
//! - `codegen` - deterministic rendering into sandbox type declarations

pub mod codegen;
pub mod errors;
pub mod resolver;
pub mod types;
pub mod validator;

pub use codegen::{codegen, GENERATED_MODULE_NAME};
pub use errors::{Issue, PathSegment, SchemaError};
pub use resolver::{check_schema, resolve, resolve_name, resolve_root, MAX_RESOLUTION_DEPTH};
pub use types::{EnumMember, Schema, TypeDefinition};
pub use validator::{classify_file_value, validate, FileForm};
