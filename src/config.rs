//! Host configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HostConfig {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub loader: LoaderConfig,
}

/// Where the registry document, code files and backups live
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Root directory all other paths are relative to
    #[serde(default = "default_root")]
    pub root: PathBuf,

    /// Registry document file name
    #[serde(default = "default_config_file")]
    pub config_file: String,

    /// Directory holding one code file per app
    #[serde(default = "default_code_dir")]
    pub code_dir: String,

    /// Directory holding backup snapshots
    #[serde(default = "default_backup_dir")]
    pub backup_dir: String,
}

/// Code loader configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoaderConfig {
    /// Interpreter used by the process executor
    #[serde(default = "default_interpreter")]
    pub interpreter: String,

    /// Extension of per-app code files
    #[serde(default = "default_extension")]
    pub extension: String,

    /// Maximum number of bound units kept in memory
    #[serde(default = "default_max_loaded_units")]
    pub max_loaded_units: usize,
}

fn default_root() -> PathBuf { PathBuf::from(".") }
fn default_config_file() -> String { "apps_config.json".to_string() }
fn default_code_dir() -> String { "uploaded_apps".to_string() }
fn default_backup_dir() -> String { "backups".to_string() }
fn default_interpreter() -> String { "python3".to_string() }
fn default_extension() -> String { "py".to_string() }
fn default_max_loaded_units() -> usize { 64 }

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            config_file: default_config_file(),
            code_dir: default_code_dir(),
            backup_dir: default_backup_dir(),
        }
    }
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            interpreter: default_interpreter(),
            extension: default_extension(),
            max_loaded_units: default_max_loaded_units(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

impl HostConfig {
    /// Load from a TOML file, or defaults if the file does not exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Config rooted at `root` with every other setting at its default.
    pub fn rooted_at(root: impl Into<PathBuf>) -> Self {
        let mut config = Self::default();
        config.paths.root = root.into();
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: HostConfig = toml::from_str(
            r#"
[paths]
root = "/srv/apphost"

[loader]
max_loaded_units = 8
"#,
        )
        .unwrap();

        assert_eq!(config.paths.root, PathBuf::from("/srv/apphost"));
        assert_eq!(config.paths.config_file, "apps_config.json");
        assert_eq!(config.paths.code_dir, "uploaded_apps");
        assert_eq!(config.loader.max_loaded_units, 8);
        assert_eq!(config.loader.interpreter, "python3");
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let config = HostConfig::load(Path::new("/nonexistent/apphost.toml")).unwrap();
        assert_eq!(config.paths.backup_dir, "backups");
        assert_eq!(config.loader.extension, "py");
    }
}
