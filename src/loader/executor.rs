//! Execution port for bound units.
//!
//! The loader never runs code itself. It hands a [`LoadedUnit`] to a
//! [`ScriptExecutor`], which decides how the entry point is invoked
//! (child process, embedded interpreter, test double).

use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Name of the zero-argument callable every app must expose
pub const ENTRY_POINT: &str = "run";

/// Error types for executing a unit.
#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    /// The executor could not be started
    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    /// The unit loaded but exposes no entry point
    #[error("Entry point `run` not found")]
    EntryPointMissing,

    /// Loading or running the unit raised an error
    #[error("Execution failed (exit code {code:?}): {stderr}")]
    Failed { code: Option<i32>, stderr: String },
}

/// An app's source bound under its id, ready to execute
#[derive(Debug, Clone, Serialize)]
pub struct LoadedUnit {
    pub app_id: String,
    /// Namespace the source is bound under
    pub module: String,
    pub source_path: PathBuf,
    #[serde(skip)]
    pub source: String,
    /// SHA-256 of the source, hex encoded
    pub digest: String,
    pub loaded_at: DateTime<Utc>,
}

/// Outcome of a successful run
#[derive(Debug, Clone, Default)]
pub struct ExecutionReport {
    pub app_id: String,
    pub stdout: String,
    pub stderr: String,
    pub elapsed: Duration,
}

/// Strategy for invoking a unit's entry point.
pub trait ScriptExecutor: Send {
    /// Executor identifier, for logs.
    fn name(&self) -> &str;

    /// Load the unit into a fresh namespace and call its entry point.
    fn execute(&self, unit: &LoadedUnit) -> Result<ExecutionReport, ExecError>;
}

impl<T: ScriptExecutor + Sync + ?Sized> ScriptExecutor for std::sync::Arc<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn execute(&self, unit: &LoadedUnit) -> Result<ExecutionReport, ExecError> {
        (**self).execute(unit)
    }
}
