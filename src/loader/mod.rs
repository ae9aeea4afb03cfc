//! Code loader - binds app sources into units and runs their entry point
//!
//! Flow for `load_and_run`:
//! 1. Resolve the app and its code file through the registry layout
//! 2. Read the source and bind a fresh unit under the app id (replacing any
//!    earlier unit, so an edited app runs its new code)
//! 3. Hand the unit to the configured [`ScriptExecutor`]
//!
//! Failures at any step come back as [`LoaderError`]; nothing here panics or
//! exits the host.

pub mod cache;
pub mod executor;
pub mod mock;
pub mod process;

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::Utc;
use sha2::{Digest, Sha256};
use tracing::{debug, error, info, warn};

use crate::registry::AppRegistry;
pub use cache::UnitCache;
pub use executor::{ExecError, ExecutionReport, LoadedUnit, ScriptExecutor, ENTRY_POINT};
pub use mock::MockExecutor;
pub use process::ProcessExecutor;

#[derive(Debug, thiserror::Error)]
pub enum LoaderError {
    #[error("App not found: {0}")]
    AppNotFound(String),

    #[error("Code file not found: {}", .0.display())]
    CodeFileMissing(PathBuf),

    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("App {0} has no `run()` entry point")]
    EntryPointMissing(String),

    #[error("App {app_id} failed: {source}")]
    Execution {
        app_id: String,
        #[source]
        source: ExecError,
    },
}

/// Owns the unit cache and the execution strategy
pub struct CodeLoader {
    executor: Box<dyn ScriptExecutor>,
    units: UnitCache,
}

impl CodeLoader {
    pub fn new(executor: Box<dyn ScriptExecutor>, max_units: usize) -> Self {
        let units = UnitCache::new(max_units);
        debug!(executor = executor.name(), capacity = units.capacity(), "Code loader ready");
        Self { executor, units }
    }

    /// Load the app's current code and invoke its entry point.
    pub fn load_and_run(
        &mut self,
        registry: &AppRegistry,
        app_id: &str,
    ) -> Result<ExecutionReport, LoaderError> {
        let app = registry
            .get(app_id)
            .ok_or_else(|| LoaderError::AppNotFound(app_id.to_string()))?;
        let module = if app.module.is_empty() {
            app.id.clone()
        } else {
            app.module.clone()
        };
        let code_path = registry.layout().code_path(app_id);

        let unit = self.bind(app_id, &module, &code_path)?.clone();

        info!(app_id, executor = self.executor.name(), digest = %short(&unit.digest), "Running app");
        match self.executor.execute(&unit) {
            Ok(report) => {
                info!(app_id, elapsed_ms = report.elapsed.as_millis() as u64, "App finished");
                Ok(report)
            }
            Err(ExecError::EntryPointMissing) => {
                warn!(app_id, "App has no entry point");
                Err(LoaderError::EntryPointMissing(app_id.to_string()))
            }
            Err(source) => {
                error!(app_id, error = %source, "App failed");
                Err(LoaderError::Execution {
                    app_id: app_id.to_string(),
                    source,
                })
            }
        }
    }

    /// Read `path` and bind it under `app_id`, replacing any earlier unit.
    pub fn bind(&mut self, app_id: &str, module: &str, path: &Path) -> Result<&LoadedUnit, LoaderError> {
        let source = match fs::read_to_string(path) {
            Ok(source) => source,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                error!(app_id, path = %path.display(), "Code file not found");
                return Err(LoaderError::CodeFileMissing(path.to_path_buf()));
            }
            Err(source) => {
                return Err(LoaderError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        let digest = hex::encode(Sha256::digest(source.as_bytes()));
        if let Some(previous) = self.units.get(app_id) {
            if previous.digest != digest {
                info!(app_id, "Source changed, rebinding unit");
            }
        }

        Ok(self.units.insert(LoadedUnit {
            app_id: app_id.to_string(),
            module: module.to_string(),
            source_path: path.to_path_buf(),
            source,
            digest,
            loaded_at: Utc::now(),
        }))
    }

    /// Drop the unit bound for `app_id`, if any.
    pub fn unload(&mut self, app_id: &str) -> Option<LoadedUnit> {
        let removed = self.units.remove(app_id);
        if removed.is_some() {
            info!(app_id, "Unloaded unit");
        }
        removed
    }

    /// Drop every bound unit.
    pub fn clear(&mut self) {
        self.units.clear();
    }

    pub fn loaded(&self) -> Vec<&LoadedUnit> {
        self.units.units()
    }

    pub fn is_loaded(&self, app_id: &str) -> bool {
        self.units.contains(app_id)
    }
}

fn short(digest: &str) -> &str {
    digest.get(..12).unwrap_or(digest)
}
