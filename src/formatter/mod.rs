//! Sandboxed execution of dynamically supplied formatting logic.
//!
//! A task's formatter source is an opaque, externally derived artifact that
//! turns a field map plus task metadata into notification text. It runs
//! behind the [`FormatterBackend`] trait so the scripting backend can be
//! swapped; the built-in backend embeds a restricted Rhai engine.
//!
//! Validation (entry-point signature, capability denylist, hardcoded-literal
//! heuristic) always runs before any execution. Runtime failures surface as
//! typed errors and abort the run's notification step rather than emit a
//! degraded placeholder message.
//!
//! The capability restriction is best-effort denial, not a hard security
//! boundary.

pub mod engine;
pub mod validate;

pub use engine::RhaiFormatter;
pub use validate::HeuristicPolicy;

use crate::error::Result;
use crate::fields::FieldMap;
use crate::task::TaskMeta;

/// Fixed name of the formatter entry point.
pub const ENTRY_POINT: &str = "format_notification";

/// A pluggable formatter execution backend.
///
/// Implementors compile and run task-supplied formatter source under a
/// restricted capability set: the two input arguments plus primitive
/// arithmetic, string, and collection operations, and nothing else.
pub trait FormatterBackend: Send + Sync {
    /// Statically validate formatter source without executing it.
    ///
    /// # Errors
    ///
    /// Returns [`crate::MonitorError::FormatterRejected`] when the source
    /// lacks the required entry point, references a disallowed capability,
    /// or confidently appears to hard-code snapshot data.
    fn validate(&self, source: &str) -> Result<()>;

    /// Validate, then execute the formatter against a field map.
    ///
    /// # Errors
    ///
    /// Returns [`crate::MonitorError::FormatterRejected`] on validation
    /// failure, or [`crate::MonitorError::FormatterRuntime`] when the script
    /// raises an error or returns a non-string value.
    fn execute(&self, source: &str, fields: &FieldMap, meta: &TaskMeta) -> Result<String>;
}
