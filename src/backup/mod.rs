//! Backup snapshots of the registry document and code directory
//!
//! Directory structure:
//!   <root>/backups/
//!     ├── backup_20250101_120000/
//!     │   ├── apps_config.json
//!     │   └── uploaded_apps/
//!     └── backup_nightly_20250102_000000/
//!
//! Restores are all-or-nothing: both artifacts must be present, the code
//! directory is staged next to the live one and swapped in with renames, and
//! the live state is left alone if anything fails before the swap.

pub mod archive;

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::layout::HostLayout;

/// Every backup directory name starts with this
pub const BACKUP_PREFIX: &str = "backup_";

#[derive(Debug, thiserror::Error)]
pub enum BackupError {
    #[error("Invalid backup id: {0}")]
    InvalidId(String),

    #[error("Backup not found: {0}")]
    NotFound(String),

    #[error("Backup is missing {}", .0.display())]
    MissingArtifact(PathBuf),

    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
}

impl BackupError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// A backup on disk
#[derive(Debug, Clone, Serialize)]
pub struct BackupInfo {
    pub id: String,
    pub path: PathBuf,
    pub created_at: DateTime<Local>,
}

/// Creates, lists, restores, deletes and exports backups
pub struct BackupManager {
    layout: HostLayout,
}

impl BackupManager {
    pub fn new(layout: HostLayout) -> Self {
        Self { layout }
    }

    pub fn backup_dir(&self) -> &Path {
        self.layout.backup_dir()
    }

    /// Snapshot the config file and code directory.
    ///
    /// A partially written backup is removed before the error is returned.
    pub fn create(&self, label: Option<&str>) -> Result<BackupInfo, BackupError> {
        let root = self.layout.backup_dir();
        fs::create_dir_all(root).map_err(|e| BackupError::io(root, e))?;

        let timestamp = Local::now().format("%Y%m%d_%H%M%S").to_string();
        let base = match label.map(sanitize_label).filter(|l| !l.is_empty()) {
            Some(label) => format!("{}{}_{}", BACKUP_PREFIX, label, timestamp),
            None => format!("{}{}", BACKUP_PREFIX, timestamp),
        };

        let mut id = base.clone();
        let mut suffix = 1;
        while root.join(&id).exists() {
            id = format!("{}_{}", base, suffix);
            suffix += 1;
        }
        let path = root.join(&id);

        fs::create_dir(&path).map_err(|e| BackupError::io(&path, e))?;
        if let Err(e) = self.copy_into(&path) {
            error!(backup_id = %id, error = %e, "Backup failed, removing partial copy");
            fs::remove_dir_all(&path).ok();
            return Err(e);
        }

        info!(backup_id = %id, "Backup created");
        Ok(BackupInfo {
            created_at: created_at(&path).unwrap_or_else(Local::now),
            id,
            path,
        })
    }

    fn copy_into(&self, path: &Path) -> Result<(), BackupError> {
        let config = self.layout.config_file();
        if config.exists() {
            let target = path.join(self.layout.config_file_name());
            fs::copy(config, &target).map_err(|e| BackupError::io(&target, e))?;
        } else {
            warn!(path = %config.display(), "No registry document to back up");
        }

        let code_target = path.join(self.layout.code_dir_name());
        let code_dir = self.layout.code_dir();
        if code_dir.is_dir() {
            archive::copy_dir_all(code_dir, &code_target).map_err(|e| BackupError::io(code_dir, e))?;
        } else {
            fs::create_dir_all(&code_target).map_err(|e| BackupError::io(&code_target, e))?;
        }
        Ok(())
    }

    /// Backups under the backup root, newest first.
    pub fn list_available(&self) -> Result<Vec<BackupInfo>, BackupError> {
        let root = self.layout.backup_dir();
        let entries = match fs::read_dir(root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(BackupError::io(root, e)),
        };

        let mut backups: Vec<BackupInfo> = entries
            .filter_map(|entry| {
                let entry = entry.ok()?;
                if !entry.file_type().ok()?.is_dir() {
                    return None;
                }
                let id = entry.file_name().to_str()?.to_string();
                if !id.starts_with(BACKUP_PREFIX) {
                    return None;
                }
                let path = entry.path();
                Some(BackupInfo {
                    created_at: created_at(&path)?,
                    id,
                    path,
                })
            })
            .collect();

        backups.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        Ok(backups)
    }

    /// Replace the live config file and code directory with a backup's.
    ///
    /// The caller is responsible for reloading anything read from them.
    pub fn restore(&self, backup_id: &str) -> Result<(), BackupError> {
        let backup = self.resolve(backup_id)?;
        let config_copy = backup.join(self.layout.config_file_name());
        let code_copy = backup.join(self.layout.code_dir_name());

        for artifact in [&config_copy, &code_copy] {
            if !artifact.exists() {
                error!(backup_id, missing = %artifact.display(), "Backup incomplete, not restoring");
                return Err(BackupError::MissingArtifact(artifact.clone()));
            }
        }

        let code_dir = self.layout.code_dir();
        let config = self.layout.config_file();
        let staged_code = sibling(code_dir, "restore");
        let staged_config = sibling(config, "restore");
        let old_code = sibling(code_dir, "old");

        // Stage both artifacts first; the live state is untouched until both copies succeed.
        remove_path(&staged_code);
        if let Err(e) = archive::copy_dir_all(&code_copy, &staged_code) {
            remove_path(&staged_code);
            return Err(BackupError::io(&code_copy, e));
        }
        if let Err(e) = fs::copy(&config_copy, &staged_config) {
            remove_path(&staged_code);
            remove_path(&staged_config);
            return Err(BackupError::io(&config_copy, e));
        }

        remove_path(&old_code);
        let had_code_dir = code_dir.exists();
        if had_code_dir {
            if let Err(e) = fs::rename(code_dir, &old_code) {
                remove_path(&staged_code);
                remove_path(&staged_config);
                return Err(BackupError::io(code_dir, e));
            }
        }

        let swapped = fs::rename(&staged_code, code_dir)
            .map_err(|e| BackupError::io(code_dir, e))
            .and_then(|()| fs::rename(&staged_config, config).map_err(|e| BackupError::io(config, e)));

        if let Err(e) = swapped {
            error!(backup_id, error = %e, "Restore swap failed, rolling back");
            if had_code_dir {
                remove_path(code_dir);
                fs::rename(&old_code, code_dir).ok();
            }
            remove_path(&staged_code);
            remove_path(&staged_config);
            return Err(e);
        }

        remove_path(&old_code);
        info!(backup_id, "Backup restored");
        Ok(())
    }

    /// Remove a backup and everything in it.
    pub fn delete(&self, backup_id: &str) -> Result<(), BackupError> {
        let path = self.resolve(backup_id)?;
        fs::remove_dir_all(&path).map_err(|e| BackupError::io(&path, e))?;
        info!(backup_id, "Backup deleted");
        Ok(())
    }

    /// Zip a backup's contents for download.
    pub fn export(&self, backup_id: &str) -> Result<Vec<u8>, BackupError> {
        let path = self.resolve(backup_id)?;
        let bytes = archive::zip_dir(&path)?;
        info!(backup_id, bytes = bytes.len(), "Backup exported");
        Ok(bytes)
    }

    fn resolve(&self, backup_id: &str) -> Result<PathBuf, BackupError> {
        if !is_valid_backup_id(backup_id) {
            return Err(BackupError::InvalidId(backup_id.to_string()));
        }
        let path = self.layout.backup_dir().join(backup_id);
        if !path.is_dir() {
            return Err(BackupError::NotFound(backup_id.to_string()));
        }
        Ok(path)
    }
}

fn is_valid_backup_id(id: &str) -> bool {
    id.starts_with(BACKUP_PREFIX) && !id.contains(['/', '\\']) && !id.contains("..")
}

/// Keep labels usable inside a directory name.
fn sanitize_label(label: &str) -> String {
    label
        .trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '-' })
        .collect()
}

fn created_at(path: &Path) -> Option<DateTime<Local>> {
    let meta = fs::metadata(path).ok()?;
    let time = meta.created().or_else(|_| meta.modified()).ok()?;
    Some(DateTime::<Local>::from(time))
}

/// `<parent>/.<name>.<tag>`, used for staging next to a live path.
fn sibling(path: &Path, tag: &str) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{}.{}", name, tag))
}

fn remove_path(path: &Path) {
    if path.is_dir() {
        fs::remove_dir_all(path).ok();
    } else if path.exists() {
        fs::remove_file(path).ok();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn seeded() -> (TempDir, HostLayout) {
        let dir = TempDir::new().unwrap();
        let layout = HostLayout::new(dir.path());
        fs::create_dir_all(layout.code_dir()).unwrap();
        fs::write(layout.config_file(), r#"{"apps": [], "categories": []}"#).unwrap();
        fs::write(layout.code_path("a"), "def run(): pass").unwrap();
        (dir, layout)
    }

    #[test]
    fn test_create_copies_both_artifacts() {
        let (_dir, layout) = seeded();
        let backups = BackupManager::new(layout.clone());

        let info = backups.create(None).unwrap();
        assert!(info.id.starts_with(BACKUP_PREFIX));
        assert!(info.path.join("apps_config.json").exists());
        assert!(info.path.join("uploaded_apps/a.py").exists());
    }

    #[test]
    fn test_label_is_sanitized_and_names_stay_unique() {
        let (_dir, layout) = seeded();
        let backups = BackupManager::new(layout);

        let first = backups.create(Some("before upgrade/x")).unwrap();
        let second = backups.create(Some("before upgrade/x")).unwrap();

        assert!(first.id.starts_with("backup_before-upgrade-x_"));
        assert_ne!(first.id, second.id);
        assert_eq!(backups.list_available().unwrap().len(), 2);
    }

    #[test]
    fn test_list_ignores_foreign_entries() {
        let (_dir, layout) = seeded();
        let backups = BackupManager::new(layout.clone());
        assert!(backups.list_available().unwrap().is_empty());

        fs::create_dir_all(layout.backup_dir().join("not-a-backup")).unwrap();
        fs::write(layout.backup_dir().join("backup_file"), "").unwrap();
        backups.create(None).unwrap();

        let listed = backups.list_available().unwrap();
        assert_eq!(listed.len(), 1);
    }

    #[test]
    fn test_restore_requires_both_artifacts() {
        let (_dir, layout) = seeded();
        let backups = BackupManager::new(layout.clone());
        let info = backups.create(None).unwrap();
        fs::remove_dir_all(info.path.join("uploaded_apps")).unwrap();

        fs::write(layout.code_path("b"), "live").unwrap();
        assert!(matches!(backups.restore(&info.id), Err(BackupError::MissingArtifact(_))));
        assert!(layout.code_path("b").exists());
    }

    #[test]
    fn test_restore_replaces_code_dir() {
        let (_dir, layout) = seeded();
        let backups = BackupManager::new(layout.clone());
        let info = backups.create(None).unwrap();

        fs::write(layout.code_path("b"), "added later").unwrap();
        fs::write(layout.config_file(), "changed").unwrap();

        backups.restore(&info.id).unwrap();
        assert!(layout.code_path("a").exists());
        assert!(!layout.code_path("b").exists());
        assert_eq!(
            fs::read_to_string(layout.config_file()).unwrap(),
            r#"{"apps": [], "categories": []}"#
        );
        assert!(!sibling(layout.code_dir(), "old").exists());
        assert!(!sibling(layout.code_dir(), "restore").exists());
    }

    #[test]
    fn test_ids_are_validated() {
        let (_dir, layout) = seeded();
        let backups = BackupManager::new(layout);

        assert!(matches!(backups.delete("../etc"), Err(BackupError::InvalidId(_))));
        assert!(matches!(backups.delete("backup_/x"), Err(BackupError::InvalidId(_))));
        assert!(matches!(backups.export("backup_missing"), Err(BackupError::NotFound(_))));
    }

    #[test]
    fn test_delete_and_export() {
        let (_dir, layout) = seeded();
        let backups = BackupManager::new(layout);
        let info = backups.create(Some("x")).unwrap();

        let zip = backups.export(&info.id).unwrap();
        assert_eq!(&zip[..2], b"PK");

        backups.delete(&info.id).unwrap();
        assert!(!info.path.exists());
    }
}
