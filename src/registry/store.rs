//! JSON-backed persistence for the registry document
//!
//! The whole document is read at once and rewritten at once. Writes go to a
//! sibling temp file first and are renamed over the target, so a reader never
//! sees a half-written document.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::model::RegistryDocument;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("JSON error in {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// Valid JSON, but not a document with both top-level lists.
    #[error("Registry document {path} has no {missing:?} key")]
    Incomplete { path: PathBuf, missing: &'static str },
}

impl StoreError {
    /// The file does not exist yet.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Io { source, .. } if source.kind() == std::io::ErrorKind::NotFound)
    }
}

/// Reads and writes the registry document file
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the document, falling back to the default on any problem.
    pub fn load(&self) -> RegistryDocument {
        match self.try_load() {
            Ok(doc) => doc,
            Err(e) => {
                warn!(error = %e, "Registry document unusable, using defaults");
                RegistryDocument::default()
            }
        }
    }

    /// Load the document, reporting why it could not be used.
    ///
    /// A missing file is reported as `StoreError::Io` with `NotFound`, a
    /// parseable file lacking `apps` or `categories` as `Incomplete`. Records
    /// whose id is not a valid slug are dropped.
    pub fn try_load(&self) -> Result<RegistryDocument, StoreError> {
        let content = fs::read_to_string(&self.path).map_err(|source| StoreError::Io {
            path: self.path.clone(),
            source,
        })?;
        let json_err = |source: serde_json::Error| StoreError::Json {
            path: self.path.clone(),
            source,
        };
        let value: serde_json::Value = serde_json::from_str(&content).map_err(&json_err)?;

        for key in ["apps", "categories"] {
            if value.get(key).is_none() {
                return Err(StoreError::Incomplete {
                    path: self.path.clone(),
                    missing: key,
                });
            }
        }

        let mut doc: RegistryDocument = serde_json::from_value(value).map_err(&json_err)?;
        for rejected in doc.normalize() {
            warn!(path = %self.path.display(), app_id = %rejected, "Dropping app with invalid id");
        }
        debug!(
            path = %self.path.display(),
            apps = doc.apps.len(),
            categories = doc.categories.len(),
            "Loaded registry document"
        );
        Ok(doc)
    }

    /// Serialize and atomically replace the document file.
    pub fn save(&self, doc: &RegistryDocument) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(doc).map_err(|source| StoreError::Json {
            path: self.path.clone(),
            source,
        })?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|source| StoreError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        let staged = self.staging_path();
        if let Err(source) = fs::write(&staged, json.as_bytes()) {
            fs::remove_file(&staged).ok();
            return Err(StoreError::Io { path: staged, source });
        }
        if let Err(source) = fs::rename(&staged, &self.path) {
            fs::remove_file(&staged).ok();
            return Err(StoreError::Io {
                path: self.path.clone(),
                source,
            });
        }

        debug!(path = %self.path.display(), apps = doc.apps.len(), "Saved registry document");
        Ok(())
    }

    fn staging_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}
