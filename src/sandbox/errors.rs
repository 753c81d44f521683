//! Sandbox error types.
//!
//! Both pipeline stages return these as data; nothing here is thrown across
//! the sandbox boundary. Compile failures are split into syntax and type
//! families, each carrying file:line:column diagnostics. Execution failures
//! classify everything that can go wrong loading and calling untrusted code,
//! including a captured thrown value and budget exhaustion.

use serde::Serialize;
use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// A single compiler diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    /// Module name the diagnostic points into.
    pub file: String,
    /// 1-based line; 0 when unknown.
    pub line: u32,
    /// 1-based column; 0 when unknown.
    pub column: u32,
    /// Compiler message.
    pub message: String,
}

impl Diagnostic {
    /// Create a diagnostic with a known position.
    pub fn new(
        file: impl Into<String>,
        line: u32,
        column: u32,
        message: impl Into<String>,
    ) -> Self {
        Self {
            file: file.into(),
            line,
            column,
            message: message.into(),
        }
    }

    /// Create a diagnostic without position information.
    pub fn unpositioned(file: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(file, 0, 0, message)
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}: {}",
            self.file, self.line, self.column, self.message
        )
    }
}

/// Compilation failure, returned as data from the compile stage.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileError {
    /// The main module does not parse.
    #[error("syntax error: {}", first_message(.diagnostics))]
    Syntax {
        /// At least one diagnostic.
        diagnostics: Vec<Diagnostic>,
    },

    /// The main module parses but does not type-check against the declared
    /// types (typically the codegen'd library declarations).
    #[error("type error: {}", first_message(.diagnostics))]
    Type {
        /// At least one diagnostic.
        diagnostics: Vec<Diagnostic>,
    },
}

impl CompileError {
    /// All diagnostics, regardless of family.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            CompileError::Syntax { diagnostics } | CompileError::Type { diagnostics } => {
                diagnostics
            }
        }
    }
}

fn first_message(diagnostics: &[Diagnostic]) -> String {
    match diagnostics {
        [] => "unknown".to_string(),
        [only] => only.to_string(),
        [first, rest @ ..] => format!("{} (+{} more)", first, rest.len()),
    }
}

/// Execution failure, returned as data from the execute stage.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExecutionError {
    /// The module threw or trapped while being evaluated/instantiated.
    #[error("module failed to load: {message}")]
    ModuleLoadFailed {
        /// What the loader reported.
        message: String,
    },

    /// The module loaded but its default export is not callable.
    #[error("default export is not callable")]
    DefaultExportNotCallable,

    /// The function threw; the thrown value is captured whether or not it is
    /// a structured error.
    #[error("function threw: {thrown}")]
    ThrownDuringCall {
        /// The captured thrown value.
        thrown: Value,
    },

    /// The function returned a value that cannot be serialized across the
    /// sandbox boundary.
    #[error("return value is not serializable: {message}")]
    ReturnValueNotSerializable {
        /// What the decoder reported.
        message: String,
    },

    /// The execution budget was exhausted. Wall-clock timeouts imposed by
    /// callers map to this variant too.
    #[error("execution exceeded its budget")]
    TimedOut,
}

/// Sandbox engine construction failure; an environment problem, not a
/// property of any user module.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The underlying runtime could not be initialized.
    #[error("sandbox engine initialization failed: {0}")]
    Init(String),
}
