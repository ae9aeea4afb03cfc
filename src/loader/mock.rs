//! Mock executor for testing.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;

use super::executor::{ExecError, ExecutionReport, LoadedUnit, ScriptExecutor, ENTRY_POINT};

/// In-process executor that never runs anything.
///
/// Reports a missing entry point when the source has no `def run(`, and can
/// be switched to fail every call.
pub struct MockExecutor {
    failing: AtomicBool,
    call_count: AtomicU32,
    executed: Mutex<Vec<(String, String)>>,
}

impl MockExecutor {
    pub fn new() -> Self {
        Self {
            failing: AtomicBool::new(false),
            call_count: AtomicU32::new(0),
            executed: Mutex::new(Vec::new()),
        }
    }

    /// Make every execution fail.
    pub fn with_failure(self, failing: bool) -> Self {
        self.failing.store(failing, Ordering::SeqCst);
        self
    }

    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::SeqCst)
    }

    /// `(app_id, digest)` of every executed unit, in call order.
    pub fn executed(&self) -> Vec<(String, String)> {
        self.executed
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }
}

impl Default for MockExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptExecutor for MockExecutor {
    fn name(&self) -> &str {
        "mock"
    }

    fn execute(&self, unit: &LoadedUnit) -> Result<ExecutionReport, ExecError> {
        self.call_count.fetch_add(1, Ordering::SeqCst);

        if self.failing.load(Ordering::SeqCst) {
            return Err(ExecError::Failed {
                code: Some(1),
                stderr: "Mock executor disabled".to_string(),
            });
        }
        if !unit.source.contains(&format!("def {}(", ENTRY_POINT)) {
            return Err(ExecError::EntryPointMissing);
        }

        if let Ok(mut calls) = self.executed.lock() {
            calls.push((unit.app_id.clone(), unit.digest.clone()));
        }
        Ok(ExecutionReport {
            app_id: unit.app_id.clone(),
            ..Default::default()
        })
    }
}
