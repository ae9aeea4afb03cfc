//! Child-process executor.
//!
//! Runs the configured interpreter with a small launcher that imports the
//! code file as a fresh module named after the app, looks up `run` and calls
//! it. Every run gets its own process, so a crashing app cannot take the host
//! down with it.

use std::process::{Command, Stdio};
use std::time::Instant;

use tracing::debug;

use super::executor::{ExecError, ExecutionReport, LoadedUnit, ScriptExecutor, ENTRY_POINT};

/// Exit status the launcher uses when `run` is absent
pub const ENTRY_POINT_MISSING_EXIT: i32 = 86;

/// Launcher for Python-compatible interpreters.
///
/// Receives `<module> <path>` as its arguments.
fn python_launcher() -> String {
    format!(
        r#"
import importlib.machinery, importlib.util, sys
name, path = sys.argv[1], sys.argv[2]
loader = importlib.machinery.SourceFileLoader(name, path)
spec = importlib.util.spec_from_loader(name, loader)
module = importlib.util.module_from_spec(spec)
sys.modules[name] = module
loader.exec_module(module)
entry = getattr(module, "{entry}", None)
if not callable(entry):
    sys.exit({missing})
entry()
"#,
        entry = ENTRY_POINT,
        missing = ENTRY_POINT_MISSING_EXIT,
    )
}

/// Executes units in a child interpreter process
pub struct ProcessExecutor {
    interpreter: String,
    /// Arguments placed before `<module> <path>`
    launcher_args: Vec<String>,
}

impl ProcessExecutor {
    /// Executor using the built-in Python launcher.
    pub fn python(interpreter: impl Into<String>) -> Self {
        Self {
            interpreter: interpreter.into(),
            launcher_args: vec!["-c".to_string(), python_launcher()],
        }
    }
}

impl ScriptExecutor for ProcessExecutor {
    fn name(&self) -> &str {
        &self.interpreter
    }

    fn execute(&self, unit: &LoadedUnit) -> Result<ExecutionReport, ExecError> {
        debug!(
            app_id = %unit.app_id,
            interpreter = %self.interpreter,
            path = %unit.source_path.display(),
            "Spawning interpreter"
        );

        let started = Instant::now();
        let output = Command::new(&self.interpreter)
            .args(&self.launcher_args)
            .arg(&unit.module)
            .arg(&unit.source_path)
            .stdin(Stdio::null())
            .output()
            .map_err(|source| ExecError::Spawn {
                program: self.interpreter.clone(),
                source,
            })?;
        let elapsed = started.elapsed();

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        match output.status.code() {
            Some(0) => Ok(ExecutionReport {
                app_id: unit.app_id.clone(),
                stdout,
                stderr,
                elapsed,
            }),
            Some(ENTRY_POINT_MISSING_EXIT) => Err(ExecError::EntryPointMissing),
            code => Err(ExecError::Failed { code, stderr }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::path::Path;
    use tempfile::TempDir;

    fn python_available() -> bool {
        Command::new("python3")
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }

    fn unit_for(dir: &Path, id: &str, source: &str) -> LoadedUnit {
        let path = dir.join(format!("{}.py", id));
        std::fs::write(&path, source).unwrap();
        LoadedUnit {
            app_id: id.to_string(),
            module: id.to_string(),
            source_path: path,
            source: source.to_string(),
            digest: String::new(),
            loaded_at: Utc::now(),
        }
    }

    #[test]
    fn test_runs_entry_point() {
        if !python_available() {
            eprintln!("python3 not found, skipping");
            return;
        }
        let dir = TempDir::new().unwrap();
        let unit = unit_for(dir.path(), "abc12345", "def run():\n    print('hello')\n");

        let report = ProcessExecutor::python("python3").execute(&unit).unwrap();
        assert_eq!(report.app_id, "abc12345");
        assert_eq!(report.stdout.trim(), "hello");
    }

    #[test]
    fn test_missing_entry_point() {
        if !python_available() {
            eprintln!("python3 not found, skipping");
            return;
        }
        let dir = TempDir::new().unwrap();
        let unit = unit_for(dir.path(), "noentry", "x = 1\n");

        let err = ProcessExecutor::python("python3").execute(&unit).unwrap_err();
        assert!(matches!(err, ExecError::EntryPointMissing));
    }

    #[test]
    fn test_raising_app_is_reported() {
        if !python_available() {
            eprintln!("python3 not found, skipping");
            return;
        }
        let dir = TempDir::new().unwrap();
        let unit = unit_for(dir.path(), "boom", "def run():\n    raise ValueError('boom')\n");

        match ProcessExecutor::python("python3").execute(&unit) {
            Err(ExecError::Failed { code, stderr }) => {
                assert_eq!(code, Some(1));
                assert!(stderr.contains("ValueError"));
            }
            other => panic!("expected failure, got {:?}", other.map(|r| r.stdout)),
        }
    }

    #[test]
    fn test_launcher_uses_entry_point_constants() {
        let launcher = python_launcher();
        assert!(launcher.contains(&format!("getattr(module, \"{}\", None)", ENTRY_POINT)));
        assert!(launcher.contains(&format!("sys.exit({})", ENTRY_POINT_MISSING_EXIT)));
    }

    #[test]
    fn test_unknown_interpreter_is_spawn_error() {
        let dir = TempDir::new().unwrap();
        let unit = unit_for(dir.path(), "a", "def run():\n    pass\n");

        let err = ProcessExecutor::python("definitely-not-an-interpreter-xyz")
            .execute(&unit)
            .unwrap_err();
        assert!(matches!(err, ExecError::Spawn { .. }));
    }
}
