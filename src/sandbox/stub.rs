//! Stubbed sandbox engine for tests and embedders without a wasm toolchain.
//!
//! Sources are mapped to host behaviors in a registry: a callable closure, a
//! not-callable marker, or a load failure. Compilation performs a
//! delimiter-balance syntax check so that obviously broken sources are
//! rejected the same way a real compiler would reject them, and unknown but
//! well-formed sources execute as an echo of their first argument.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde_json::Value;

use super::engine::SandboxEngine;
use super::errors::{CompileError, Diagnostic, ExecutionError};
use super::module::{CompiledModule, SourceModule};

type StubFn = Arc<dyn Fn(&[Value]) -> Result<Value, ExecutionError> + Send + Sync>;

enum Behavior {
    Callable(StubFn),
    NotCallable,
    LoadFailure(String),
}

/// Registry-backed engine with deterministic, host-defined behaviors.
#[derive(Default)]
pub struct StubEngine {
    behaviors: Mutex<HashMap<String, Behavior>>,
}

impl StubEngine {
    /// Create an empty stub engine.
    pub fn new() -> Self {
        Self::default()
    }

    /// Map a source to a host closure acting as its default export.
    pub fn with_function<F>(self, source: impl Into<String>, function: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, ExecutionError> + Send + Sync + 'static,
    {
        self.register(source, Behavior::Callable(Arc::new(function)));
        self
    }

    /// Map a source to a module whose default export throws the given value.
    pub fn with_throws(self, source: impl Into<String>, thrown: Value) -> Self {
        self.register(
            source,
            Behavior::Callable(Arc::new(move |_args| {
                Err(ExecutionError::ThrownDuringCall {
                    thrown: thrown.clone(),
                })
            })),
        );
        self
    }

    /// Map a source to a module whose default export is not callable.
    pub fn with_not_callable(self, source: impl Into<String>) -> Self {
        self.register(source, Behavior::NotCallable);
        self
    }

    /// Map a source to a module that fails during evaluation.
    pub fn with_load_failure(self, source: impl Into<String>, message: impl Into<String>) -> Self {
        self.register(source, Behavior::LoadFailure(message.into()));
        self
    }

    fn register(&self, source: impl Into<String>, behavior: Behavior) {
        self.behaviors
            .lock()
            .expect("stub registry poisoned")
            .insert(source.into(), behavior);
    }
}

impl SandboxEngine for StubEngine {
    fn compile(
        &self,
        main: &SourceModule,
        libraries: &[SourceModule],
    ) -> Result<CompiledModule, CompileError> {
        if let Some(diagnostic) = check_delimiters(&main.name, &main.source) {
            return Err(CompileError::Syntax {
                diagnostics: vec![diagnostic],
            });
        }
        Ok(CompiledModule::new(main.clone(), libraries.to_vec()))
    }

    fn execute_sync(
        &self,
        compiled: &CompiledModule,
        args: &[Value],
    ) -> Result<Value, ExecutionError> {
        let behaviors = self.behaviors.lock().expect("stub registry poisoned");
        match behaviors.get(&compiled.main.source) {
            Some(Behavior::Callable(function)) => function(args),
            Some(Behavior::NotCallable) => Err(ExecutionError::DefaultExportNotCallable),
            Some(Behavior::LoadFailure(message)) => Err(ExecutionError::ModuleLoadFailed {
                message: message.clone(),
            }),
            // Unregistered sources echo their first argument.
            None => Ok(args.first().cloned().unwrap_or(Value::Null)),
        }
    }

    fn default_export_is_callable(
        &self,
        compiled: &CompiledModule,
    ) -> Result<bool, ExecutionError> {
        let behaviors = self.behaviors.lock().expect("stub registry poisoned");
        match behaviors.get(&compiled.main.source) {
            Some(Behavior::Callable(_)) | None => Ok(true),
            Some(Behavior::NotCallable) => Ok(false),
            Some(Behavior::LoadFailure(message)) => Err(ExecutionError::ModuleLoadFailed {
                message: message.clone(),
            }),
        }
    }

    fn name(&self) -> &'static str {
        "stub"
    }
}

/// Scans for unbalanced brackets outside string literals. Returns the first
/// offending position, 1-based.
fn check_delimiters(file: &str, source: &str) -> Option<Diagnostic> {
    let mut stack: Vec<(char, u32, u32)> = Vec::new();
    let mut line = 1u32;
    let mut column = 0u32;
    let mut in_string: Option<char> = None;
    let mut escaped = false;

    for character in source.chars() {
        if character == '\n' {
            line += 1;
            column = 0;
            continue;
        }
        column += 1;

        if let Some(quote) = in_string {
            if escaped {
                escaped = false;
            } else if character == '\\' {
                escaped = true;
            } else if character == quote {
                in_string = None;
            }
            continue;
        }

        match character {
            '"' | '\'' | '`' => in_string = Some(character),
            '(' | '[' | '{' => stack.push((character, line, column)),
            ')' | ']' | '}' => {
                let expected = match character {
                    ')' => '(',
                    ']' => '[',
                    _ => '{',
                };
                match stack.pop() {
                    Some((opener, ..)) if opener == expected => {}
                    _ => {
                        return Some(Diagnostic::new(
                            file,
                            line,
                            column,
                            format!("unmatched '{}'", character),
                        ))
                    }
                }
            }
            _ => {}
        }
    }

    stack
        .pop()
        .map(|(opener, line, column)| Diagnostic::new(file, line, column, format!("unclosed '{}'", opener)))
}
