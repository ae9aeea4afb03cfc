//! Host facade wiring the registry, loader and backup manager together
//!
//! Operations that touch more than one component live here so the
//! cross-component effects happen in one place: deleting an app also drops
//! its loaded unit, and a restore or reset reloads the registry and forgets
//! every loaded unit.

use tracing::info;

use crate::backup::{BackupError, BackupInfo, BackupManager};
use crate::config::HostConfig;
use crate::layout::HostLayout;
use crate::loader::{CodeLoader, ExecutionReport, LoaderError, ProcessExecutor, ScriptExecutor};
use crate::registry::{AppPatch, AppRecord, AppRegistry, NewApp, RegistryError};

#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Loader(#[from] LoaderError),

    #[error(transparent)]
    Backup(#[from] BackupError),
}

pub struct AppHost {
    registry: AppRegistry,
    loader: CodeLoader,
    backups: BackupManager,
}

impl AppHost {
    /// Open a host that runs apps with the configured interpreter.
    pub fn open(config: &HostConfig) -> Self {
        let executor = ProcessExecutor::python(config.loader.interpreter.clone());
        Self::with_executor(config, Box::new(executor))
    }

    pub fn with_executor(config: &HostConfig, executor: Box<dyn ScriptExecutor>) -> Self {
        let layout = HostLayout::from_config(config);
        info!(root = %layout.root().display(), executor = executor.name(), "Opening app host");

        Self {
            registry: AppRegistry::open(layout.clone()),
            loader: CodeLoader::new(executor, config.loader.max_loaded_units),
            backups: BackupManager::new(layout),
        }
    }

    pub fn registry(&self) -> &AppRegistry {
        &self.registry
    }

    /// Direct registry access for category management and queries.
    pub fn registry_mut(&mut self) -> &mut AppRegistry {
        &mut self.registry
    }

    pub fn loader(&self) -> &CodeLoader {
        &self.loader
    }

    pub fn backups(&self) -> &BackupManager {
        &self.backups
    }

    pub fn add_app(&mut self, new_app: NewApp) -> Result<AppRecord, HostError> {
        Ok(self.registry.add(new_app)?)
    }

    pub fn update_app(&mut self, app_id: &str, patch: AppPatch) -> Result<AppRecord, HostError> {
        let updated = self.registry.update(app_id, patch)?;
        self.loader.unload(app_id);
        Ok(updated)
    }

    pub fn delete_app(&mut self, app_id: &str) -> Result<AppRecord, HostError> {
        let removed = self.registry.delete(app_id)?;
        self.loader.unload(app_id);
        Ok(removed)
    }

    pub fn run_app(&mut self, app_id: &str) -> Result<ExecutionReport, HostError> {
        Ok(self.loader.load_and_run(&self.registry, app_id)?)
    }

    pub fn create_backup(&self, label: Option<&str>) -> Result<BackupInfo, HostError> {
        Ok(self.backups.create(label)?)
    }

    pub fn restore_backup(&mut self, backup_id: &str) -> Result<(), HostError> {
        self.backups.restore(backup_id)?;
        self.registry.reload();
        self.loader.clear();
        Ok(())
    }

    pub fn reset_to_factory(&mut self) -> Result<(), HostError> {
        self.loader.clear();
        Ok(self.registry.reset_to_factory()?)
    }
}
