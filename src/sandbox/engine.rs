//! The sandbox boundary.
//!
//! A message-passing contract for running untrusted, user-authored code:
//! send sources in, get one structured result back. Implementations must
//! guarantee
//! - no ambient I/O: no network, timer, or filesystem capability
//! - synchronous-only execution; the executed function cannot suspend
//! - fresh, self-contained instantiation per call; no state shared between
//!   calls
//! - structured results: nothing thrown by user code crosses the boundary
//!
//! Budgets come from [`SandboxConfig`]. Engines enforce a deterministic
//! execution budget; callers additionally impose a wall-clock timeout and
//! treat it as [`super::errors::ExecutionError::TimedOut`], terminating the
//! isolated context rather than leaving it running.

use serde_json::Value;

use super::errors::{CompileError, ExecutionError};
use super::module::{CompiledModule, SourceModule};

/// Sandbox resource limits.
#[derive(Debug, Clone)]
pub struct SandboxConfig {
    /// Execution budget in abstract instruction fuel.
    pub fuel: u64,

    /// Maximum guest memory in bytes.
    pub max_memory_bytes: usize,

    /// Wall-clock limit in milliseconds, imposed by callers.
    pub timeout_ms: u64,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            fuel: 10_000_000,
            max_memory_bytes: 64 * 1024 * 1024, // 64 MB
            timeout_ms: 5_000,
        }
    }
}

/// Compile-and-execute pipeline for untrusted user functions.
pub trait SandboxEngine: Send + Sync {
    /// Compiles a main module against zero or more library declaration
    /// modules. No side effects; independent across calls.
    fn compile(
        &self,
        main: &SourceModule,
        libraries: &[SourceModule],
    ) -> Result<CompiledModule, CompileError>;

    /// Loads compiled code in a fresh isolated context and invokes its
    /// default export synchronously with JSON-serializable arguments.
    fn execute_sync(
        &self,
        compiled: &CompiledModule,
        args: &[Value],
    ) -> Result<Value, ExecutionError>;

    /// Loads compiled code far enough to test whether its default export is
    /// callable, without invoking it.
    fn default_export_is_callable(
        &self,
        compiled: &CompiledModule,
    ) -> Result<bool, ExecutionError>;

    /// Engine name for logging.
    fn name(&self) -> &'static str;
}
