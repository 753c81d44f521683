//! wasmtime-backed sandbox engine.
//!
//! Isolation properties:
//! - instantiation through an empty linker: the guest gets no host imports,
//!   so there is no network, timer, or filesystem capability to reach for
//! - a fuel budget bounds execution deterministically; exhaustion surfaces
//!   as `TimedOut`
//! - guest memory is capped through the store's resource limiter
//! - every call instantiates a fresh store; no state survives between calls
//!
//! Main modules are WebAssembly, text or binary; library modules are the
//! WIT declarations produced by schema codegen. Values cross the boundary as
//! JSON: arguments are written into guest memory through the guest's `alloc`
//! export, and `default(ptr, len) -> i64` returns a packed pointer/length
//! pair addressing the JSON-encoded result.

use std::collections::HashMap;
use std::sync::Mutex;

use serde_json::Value;
use wasmtime::{Engine, Instance, Linker, Module, Store, StoreLimits, StoreLimitsBuilder, Trap};

use super::engine::{SandboxConfig, SandboxEngine};
use super::errors::{CompileError, Diagnostic, EngineError, ExecutionError};
use super::module::{CompiledModule, SourceModule};

/// Sandboxed wasm engine with a per-cache-key module cache.
pub struct WasmEngine {
    engine: Engine,
    config: SandboxConfig,
    modules: Mutex<HashMap<String, Module>>,
}

impl WasmEngine {
    /// Create an engine with the given limits.
    pub fn new(config: SandboxConfig) -> Result<Self, EngineError> {
        let mut engine_config = wasmtime::Config::new();
        engine_config.consume_fuel(true);
        let engine =
            Engine::new(&engine_config).map_err(|error| EngineError::Init(error.to_string()))?;
        Ok(Self {
            engine,
            config,
            modules: Mutex::new(HashMap::new()),
        })
    }

    /// Create an engine with default limits.
    pub fn with_defaults() -> Result<Self, EngineError> {
        Self::new(SandboxConfig::default())
    }

    /// Instantiates compiled code in a fresh, import-free store.
    fn instantiate(
        &self,
        compiled: &CompiledModule,
    ) -> Result<(Store<StoreLimits>, Instance), ExecutionError> {
        let module = self.module(compiled)?;

        let limits = StoreLimitsBuilder::new()
            .memory_size(self.config.max_memory_bytes)
            .build();
        let mut store = Store::new(&self.engine, limits);
        store.limiter(|limits| limits);
        store
            .set_fuel(self.config.fuel)
            .map_err(|error| ExecutionError::ModuleLoadFailed {
                message: error.to_string(),
            })?;

        // Empty linker: no ambient capability is importable.
        let linker: Linker<StoreLimits> = Linker::new(&self.engine);
        let instance = linker
            .instantiate(&mut store, &module)
            .map_err(|error| classify_trap(error, true))?;
        Ok((store, instance))
    }

    /// Fetches or builds the validated module for this cache key.
    fn module(&self, compiled: &CompiledModule) -> Result<Module, ExecutionError> {
        let mut cache = self.modules.lock().expect("module cache poisoned");
        if let Some(module) = cache.get(&compiled.cache_key) {
            tracing::debug!(cache_key = %compiled.cache_key, "sandbox module cache hit");
            return Ok(module.clone());
        }
        let module = Module::new(&self.engine, compiled.main.source.as_bytes()).map_err(
            |error| ExecutionError::ModuleLoadFailed {
                message: error.to_string(),
            },
        )?;
        cache.insert(compiled.cache_key.clone(), module.clone());
        Ok(module)
    }
}

impl SandboxEngine for WasmEngine {
    fn compile(
        &self,
        main: &SourceModule,
        libraries: &[SourceModule],
    ) -> Result<CompiledModule, CompileError> {
        // Stage one: text parsing. Failures carry line:column positions.
        let binary = wat::parse_str(&main.source).map_err(|error| CompileError::Syntax {
            diagnostics: vec![wat_diagnostic(&main.name, &error)],
        })?;

        // Stage two: validation against the module's declared types.
        Module::validate(&self.engine, &binary).map_err(|error| CompileError::Type {
            diagnostics: vec![Diagnostic::unpositioned(&main.name, error.to_string())],
        })?;

        Ok(CompiledModule::new(main.clone(), libraries.to_vec()))
    }

    fn execute_sync(
        &self,
        compiled: &CompiledModule,
        args: &[Value],
    ) -> Result<Value, ExecutionError> {
        let (mut store, instance) = self.instantiate(compiled)?;

        let memory = instance.get_memory(&mut store, "memory").ok_or_else(|| {
            ExecutionError::ModuleLoadFailed {
                message: "module does not export a memory".into(),
            }
        })?;
        let alloc = instance
            .get_typed_func::<i32, i32>(&mut store, "alloc")
            .map_err(|error| ExecutionError::ModuleLoadFailed {
                message: format!("module does not export alloc(i32) -> i32: {}", error),
            })?;
        let default = instance
            .get_typed_func::<(i32, i32), i64>(&mut store, "default")
            .map_err(|_| ExecutionError::DefaultExportNotCallable)?;

        // Arguments cross the boundary as a JSON array in guest memory.
        let encoded = serde_json::to_vec(args).map_err(|error| {
            ExecutionError::ReturnValueNotSerializable {
                message: format!("arguments failed to encode: {}", error),
            }
        })?;
        let args_ptr = alloc
            .call(&mut store, encoded.len() as i32)
            .map_err(|error| classify_trap(error, true))?;
        memory
            .write(&mut store, args_ptr as usize, &encoded)
            .map_err(|error| ExecutionError::ModuleLoadFailed {
                message: format!("argument buffer out of bounds: {}", error),
            })?;

        let packed = default
            .call(&mut store, (args_ptr, encoded.len() as i32))
            .map_err(|error| classify_trap(error, false))?;

        // High 32 bits: pointer. Low 32 bits: length.
        let result_ptr = (packed >> 32) as u32 as usize;
        let result_len = packed as u32 as usize;
        let data = memory.data(&store);
        let bytes = data.get(result_ptr..result_ptr + result_len).ok_or_else(|| {
            ExecutionError::ReturnValueNotSerializable {
                message: "result range out of bounds".into(),
            }
        })?;
        serde_json::from_slice(bytes).map_err(|error| {
            ExecutionError::ReturnValueNotSerializable {
                message: error.to_string(),
            }
        })
    }

    fn default_export_is_callable(
        &self,
        compiled: &CompiledModule,
    ) -> Result<bool, ExecutionError> {
        let (mut store, instance) = self.instantiate(compiled)?;
        Ok(instance.get_func(&mut store, "default").is_some())
    }

    fn name(&self) -> &'static str {
        "wasmtime"
    }
}

/// Maps a runtime error to the sandbox taxonomy. Fuel exhaustion is the
/// budget running out; any other trap is the guest throwing.
fn classify_trap(error: wasmtime::Error, loading: bool) -> ExecutionError {
    if let Some(&trap) = error.downcast_ref::<Trap>() {
        if trap == Trap::OutOfFuel {
            return ExecutionError::TimedOut;
        }
        if !loading {
            return ExecutionError::ThrownDuringCall {
                thrown: Value::String(trap.to_string()),
            };
        }
    }
    ExecutionError::ModuleLoadFailed {
        message: error.to_string(),
    }
}

/// Extracts `line:column` from a rendered wat error.
///
/// wat renders positions as `--> <name>:line:column`; fall back to 0:0 when
/// the shape changes.
fn wat_diagnostic(file: &str, error: &wat::Error) -> Diagnostic {
    let rendered = error.to_string();
    let (mut line, mut column) = (0u32, 0u32);
    if let Some(marker) = rendered.find("-->") {
        let location = rendered[marker + 3..].lines().next().unwrap_or("").trim();
        let mut parts = location.rsplitn(3, ':');
        let column_part = parts.next().unwrap_or("");
        let line_part = parts.next().unwrap_or("");
        line = line_part.trim().parse().unwrap_or(0);
        column = column_part.trim().parse().unwrap_or(0);
    }
    let message = rendered.lines().next().unwrap_or("syntax error").to_string();
    Diagnostic::new(file, line, column, message)
}
