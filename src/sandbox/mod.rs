//! Sandboxed compile-and-execute pipeline for untrusted user code.
//!
//! This module provides:
//! - `engine` - the [`SandboxEngine`] boundary contract and resource limits
//! - `module` - source and compiled module containers
//! - `wasm` - the wasmtime-backed engine (fuel, memory caps, no ambient I/O)
//! - `stub` - a registry-backed engine for tests and wasm-less embedders
//! - `errors` - structured compile/execution failure taxonomies

pub mod engine;
pub mod errors;
pub mod module;
pub mod stub;
pub mod wasm;

pub use engine::{SandboxConfig, SandboxEngine};
pub use errors::{CompileError, Diagnostic, EngineError, ExecutionError};
pub use module::{CompiledModule, SourceModule};
pub use stub::StubEngine;
pub use wasm::WasmEngine;
