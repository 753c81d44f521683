//! Schema error and issue types.
//!
//! Two distinct shapes, deliberately kept apart:
//! - `Issue` — validation findings about user-supplied data (or a
//!   user-supplied schema). Always returned as data, never raised.
//! - `SchemaError` — programmer errors: a malformed schema reached a code
//!   path that assumes well-formedness (unresolved ref, runaway ref depth).

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// One step of a path into a JSON value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum PathSegment {
    /// Object property name.
    Key(String),
    /// List index.
    Index(usize),
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Key(key) => write!(f, ".{}", key),
            PathSegment::Index(index) => write!(f, "[{}]", index),
        }
    }
}

/// A single validation finding: where it was found and what was wrong.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Issue {
    /// Path from the root of the validated value to the offending node.
    pub path: Vec<PathSegment>,
    /// Human-readable description of the violation.
    pub message: String,
}

impl Issue {
    /// Create an issue at the given path.
    pub fn new(path: Vec<PathSegment>, message: impl Into<String>) -> Self {
        Self {
            path,
            message: message.into(),
        }
    }

    /// Create an issue at the root of the value.
    pub fn at_root(message: impl Into<String>) -> Self {
        Self::new(Vec::new(), message)
    }
}

// Renders as `$.posts[2].title: expected string, got number`.
impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "$")?;
        for segment in &self.path {
            write!(f, "{}", segment)?;
        }
        write!(f, ": {}", self.message)
    }
}

/// Programmer errors raised while resolving or walking a schema.
///
/// These indicate a malformed schema reaching code that assumes
/// well-formedness; user data never produces them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    /// A `Ref` names a type missing from the arena.
    #[error("unresolved type reference '{0}'")]
    UnresolvedRef(String),

    /// The root type names a type missing from the arena.
    #[error("root type '{0}' is not defined")]
    UnknownRootType(String),

    /// Ref resolution exceeded the depth guard; refs must be acyclic.
    #[error("type resolution exceeded depth {0}; refs must be acyclic")]
    DepthExceeded(usize),
}
