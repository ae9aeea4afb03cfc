//! On-disk layout shared by the registry, loader and backup manager
//!
//! ```text
//! <root>/
//!   ├── apps_config.json        # registry document
//!   ├── uploaded_apps/
//!   │   └── <app-id>.py         # one code file per app
//!   └── backups/
//!       └── backup_<ts>/        # snapshot: config copy + uploaded_apps/
//! ```

use std::path::{Path, PathBuf};

use crate::config::HostConfig;

/// Resolved paths for one host root
#[derive(Debug, Clone)]
pub struct HostLayout {
    root: PathBuf,
    config_file: PathBuf,
    code_dir: PathBuf,
    backup_dir: PathBuf,
    extension: String,
}

impl HostLayout {
    pub fn from_config(config: &HostConfig) -> Self {
        let root = config.paths.root.clone();
        Self {
            config_file: root.join(&config.paths.config_file),
            code_dir: root.join(&config.paths.code_dir),
            backup_dir: root.join(&config.paths.backup_dir),
            extension: config.loader.extension.clone(),
            root,
        }
    }

    /// Layout with default file names under `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::from_config(&HostConfig::rooted_at(root))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_file(&self) -> &Path {
        &self.config_file
    }

    /// File name of the registry document, used inside backups too.
    pub fn config_file_name(&self) -> &std::ffi::OsStr {
        self.config_file
            .file_name()
            .unwrap_or_else(|| std::ffi::OsStr::new("apps_config.json"))
    }

    pub fn code_dir(&self) -> &Path {
        &self.code_dir
    }

    /// Directory name of the code dir, mirrored inside backups.
    pub fn code_dir_name(&self) -> &std::ffi::OsStr {
        self.code_dir
            .file_name()
            .unwrap_or_else(|| std::ffi::OsStr::new("uploaded_apps"))
    }

    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    /// Path of the code file for `app_id`.
    pub fn code_path(&self, app_id: &str) -> PathBuf {
        self.code_dir.join(format!("{}.{}", app_id, self.extension))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_layout() {
        let layout = HostLayout::new("/srv/apps");
        assert_eq!(layout.config_file(), Path::new("/srv/apps/apps_config.json"));
        assert_eq!(layout.code_dir(), Path::new("/srv/apps/uploaded_apps"));
        assert_eq!(layout.backup_dir(), Path::new("/srv/apps/backups"));
        assert_eq!(
            layout.code_path("abc12345"),
            PathBuf::from("/srv/apps/uploaded_apps/abc12345.py")
        );
        assert_eq!(layout.config_file_name(), "apps_config.json");
        assert_eq!(layout.code_dir_name(), "uploaded_apps");
    }

    #[test]
    fn test_custom_extension() {
        let mut config = HostConfig::rooted_at("/tmp/h");
        config.loader.extension = "lua".to_string();
        let layout = HostLayout::from_config(&config);
        assert_eq!(layout.code_path("x"), PathBuf::from("/tmp/h/uploaded_apps/x.lua"));
    }
}
