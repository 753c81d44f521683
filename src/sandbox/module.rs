//! Source and compiled module containers.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A named source module handed to the sandbox compiler: either the main
/// module (executable) or a library module (type declarations only).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceModule {
    /// Module name, used in diagnostics.
    pub name: String,
    /// Source text.
    pub source: String,
}

impl SourceModule {
    /// Create a source module.
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
        }
    }

    /// Conventional name for a user-authored main module.
    pub fn main(source: impl Into<String>) -> Self {
        Self::new("main", source)
    }
}

/// Output of a successful compile: the validated sources plus a
/// content-derived cache key.
///
/// Plain data: engines hold no handles in here, so compiled code can be
/// cached, cloned across tasks, and replayed. Engines keyed on
/// [`CompiledModule::cache_key`] may reuse their own backing artifacts;
/// identical sources always produce an identical key, which is why codegen
/// output must be deterministic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompiledModule {
    /// sha256 over all module names and sources.
    pub cache_key: String,
    /// The executable main module.
    pub main: SourceModule,
    /// Library declaration modules the main module was checked against.
    pub libraries: Vec<SourceModule>,
}

impl CompiledModule {
    /// Seal a validated main module and its libraries.
    pub fn new(main: SourceModule, libraries: Vec<SourceModule>) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(main.name.as_bytes());
        hasher.update([0]);
        hasher.update(main.source.as_bytes());
        for library in &libraries {
            hasher.update([0]);
            hasher.update(library.name.as_bytes());
            hasher.update([0]);
            hasher.update(library.source.as_bytes());
        }
        let cache_key = format!("{:x}", hasher.finalize());
        Self {
            cache_key,
            main,
            libraries,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key_is_stable() {
        let a = CompiledModule::new(SourceModule::main("(module)"), vec![]);
        let b = CompiledModule::new(SourceModule::main("(module)"), vec![]);
        assert_eq!(a.cache_key, b.cache_key);
    }

    #[test]
    fn test_cache_key_covers_libraries() {
        let main = SourceModule::main("(module)");
        let without = CompiledModule::new(main.clone(), vec![]);
        let with = CompiledModule::new(
            main,
            vec![SourceModule::new("schema.wit", "interface t {}")],
        );
        assert_ne!(without.cache_key, with.cache_key);
    }

    #[test]
    fn test_cache_key_differs_on_source_change() {
        let a = CompiledModule::new(SourceModule::main("(module)"), vec![]);
        let b = CompiledModule::new(SourceModule::main("(module (func))"), vec![]);
        assert_ne!(a.cache_key, b.cache_key);
    }
}
