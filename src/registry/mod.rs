//! App registry - the in-memory view over the registry document
//!
//! Every mutation rewrites the whole document through [`ConfigStore`]. If the
//! write fails the in-memory document is put back the way it was, so a failed
//! mutation never leaves memory and disk disagreeing.

pub mod ids;
pub mod model;
pub mod store;

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use tracing::{debug, error, info, warn};

use crate::layout::HostLayout;
pub use model::*;
pub use store::{ConfigStore, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Invalid id {0:?}: use lowercase letters, digits, '-' or '_'")]
    InvalidId(String),

    #[error("Id already registered: {0}")]
    DuplicateId(String),

    #[error("App not found: {0}")]
    AppNotFound(String),

    #[error("Category not found: {0}")]
    CategoryNotFound(String),

    #[error("Category {id} is still used by {apps} app(s)")]
    CategoryInUse { id: String, apps: usize },

    #[error("Category {0} cannot be removed")]
    ProtectedCategory(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("IO error on {path}: {source}")]
    Io {
        path: std::path::PathBuf,
        source: std::io::Error,
    },
}

impl RegistryError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Owns the registry document and keeps it in sync with disk
pub struct AppRegistry {
    layout: HostLayout,
    store: ConfigStore,
    doc: RegistryDocument,
}

impl AppRegistry {
    /// Open the registry under `layout`.
    ///
    /// - no document yet: the default document is written, code files are left alone
    /// - parseable document missing `apps` or `categories`: factory reset
    /// - unreadable or malformed document: defaults in memory, disk untouched
    pub fn open(layout: HostLayout) -> Self {
        let store = ConfigStore::new(layout.config_file());
        let registry = match store.try_load() {
            Ok(doc) => Self { layout, store, doc },
            Err(e) if e.is_not_found() => {
                info!(path = %store.path().display(), "No registry document, writing defaults");
                let registry = Self {
                    layout,
                    store,
                    doc: RegistryDocument::default(),
                };
                if let Err(e) = registry.store.save(&registry.doc) {
                    error!(error = %e, "Could not write default registry document");
                }
                registry
            }
            Err(e @ StoreError::Incomplete { .. }) => {
                warn!(error = %e, "Registry document incomplete, resetting to factory state");
                let mut registry = Self {
                    layout,
                    store,
                    doc: RegistryDocument::default(),
                };
                if let Err(e) = registry.reset_to_factory() {
                    error!(error = %e, "Factory reset failed, continuing with in-memory defaults");
                }
                return registry;
            }
            Err(e) => {
                warn!(error = %e, "Registry document unusable, using defaults without touching disk");
                Self {
                    layout,
                    store,
                    doc: RegistryDocument::default(),
                }
            }
        };

        if let Err(e) = fs::create_dir_all(registry.layout.code_dir()) {
            warn!(error = %e, "Could not create code directory");
        }
        registry
    }

    pub fn layout(&self) -> &HostLayout {
        &self.layout
    }

    pub fn store(&self) -> &ConfigStore {
        &self.store
    }

    pub fn document(&self) -> &RegistryDocument {
        &self.doc
    }

    pub fn apps(&self) -> &[AppRecord] {
        &self.doc.apps
    }

    pub fn categories(&self) -> &[CategoryRecord] {
        &self.doc.categories
    }

    pub fn get(&self, app_id: &str) -> Option<&AppRecord> {
        self.doc.app(app_id)
    }

    pub fn category(&self, category_id: &str) -> Option<&CategoryRecord> {
        self.doc.category(category_id)
    }

    /// Apps filed under `category_id`, in document order.
    pub fn list_by_category(&self, category_id: &str) -> Vec<&AppRecord> {
        self.doc
            .apps
            .iter()
            .filter(|app| app.category == category_id)
            .collect()
    }

    /// Case-insensitive substring search. An empty query returns the scope.
    pub fn search(&self, query: &str, scope: SearchScope<'_>, fields: SearchFields) -> Vec<&AppRecord> {
        let needle = query.trim().to_lowercase();
        self.doc
            .apps
            .iter()
            .filter(|app| match scope {
                SearchScope::All => true,
                SearchScope::Category(id) => app.category == id,
            })
            .filter(|app| needle.is_empty() || matches_query(app, &needle, fields))
            .collect()
    }

    /// Apps grouped by category for the home view and navigation menu.
    ///
    /// Categories without a matching app are left out.
    pub fn navigation(&self, query: &str, fields: SearchFields) -> Vec<CategoryView> {
        self.doc
            .categories
            .iter()
            .filter_map(|category| {
                let apps: Vec<AppRecord> = self
                    .search(query, SearchScope::Category(&category.id), fields)
                    .into_iter()
                    .cloned()
                    .collect();
                (!apps.is_empty()).then(|| CategoryView {
                    category: category.clone(),
                    apps,
                })
            })
            .collect()
    }

    /// Register a new app and write its code file.
    pub fn add(&mut self, new_app: NewApp) -> Result<AppRecord, RegistryError> {
        if new_app.code.trim().is_empty() {
            return Err(RegistryError::Validation("no code provided".to_string()));
        }

        let id = match non_blank(new_app.id) {
            Some(id) => {
                if !ids::is_valid_id(&id) {
                    return Err(RegistryError::InvalidId(id));
                }
                if self.doc.has_app(&id) {
                    return Err(RegistryError::DuplicateId(id));
                }
                id
            }
            None => ids::generate_unique_id(|candidate| self.doc.has_app(candidate)),
        };

        if !self.doc.has_category(&new_app.category) {
            return Err(RegistryError::CategoryNotFound(new_app.category));
        }

        let record = AppRecord {
            module: id.clone(),
            title: non_blank(new_app.title).unwrap_or_else(ids::placeholder_title),
            description: non_blank(new_app.description).unwrap_or_else(ids::placeholder_description),
            icon: non_blank(new_app.icon).unwrap_or_else(ids::random_icon),
            category: new_app.category,
            code: new_app.code,
            id,
        };

        let code_path = self.layout.code_path(&record.id);
        self.write_code(&code_path, &record.code)?;

        let before = self.doc.clone();
        self.doc.apps.push(record.clone());
        if let Err(e) = self.persist(before) {
            fs::remove_file(&code_path).ok();
            return Err(e);
        }

        info!(app_id = %record.id, category = %record.category, "App added");
        Ok(record)
    }

    /// Merge `patch` into an existing app.
    pub fn update(&mut self, app_id: &str, patch: AppPatch) -> Result<AppRecord, RegistryError> {
        let current = self
            .doc
            .app(app_id)
            .cloned()
            .ok_or_else(|| RegistryError::AppNotFound(app_id.to_string()))?;

        if let Some(category) = &patch.category {
            if !self.doc.has_category(category) {
                return Err(RegistryError::CategoryNotFound(category.clone()));
            }
        }
        if let Some(code) = &patch.code {
            if code.trim().is_empty() {
                return Err(RegistryError::Validation("no code provided".to_string()));
            }
        }

        let mut updated = current.clone();
        if let Some(title) = patch.title {
            updated.title = title;
        }
        if let Some(description) = patch.description {
            updated.description = description;
        }
        if let Some(icon) = patch.icon {
            updated.icon = icon;
        }
        if let Some(category) = patch.category {
            updated.category = category;
        }

        let code_path = self.layout.code_path(app_id);
        let previous_code = match patch.code {
            Some(code) if code != current.code || !code_path.exists() => {
                let previous = fs::read_to_string(&code_path).ok();
                self.write_code(&code_path, &code)?;
                updated.code = code;
                Some(previous)
            }
            _ => None,
        };

        let before = self.doc.clone();
        if let Some(slot) = self.doc.app_mut(app_id) {
            *slot = updated.clone();
        }
        if let Err(e) = self.persist(before) {
            match previous_code {
                Some(Some(code)) => {
                    fs::write(&code_path, code).ok();
                }
                Some(None) => {
                    fs::remove_file(&code_path).ok();
                }
                None => {}
            }
            return Err(e);
        }

        info!(app_id, "App updated");
        Ok(updated)
    }

    /// Current source of an app: its code file, or the copy kept in the record.
    pub fn code_of(&self, app_id: &str) -> Result<String, RegistryError> {
        let app = self
            .doc
            .app(app_id)
            .ok_or_else(|| RegistryError::AppNotFound(app_id.to_string()))?;
        match fs::read_to_string(self.layout.code_path(app_id)) {
            Ok(code) => Ok(code),
            Err(e) => {
                debug!(app_id, error = %e, "Code file unreadable, using record copy");
                Ok(app.code.clone())
            }
        }
    }

    /// Remove an app and its code file. A missing code file is not an error.
    pub fn delete(&mut self, app_id: &str) -> Result<AppRecord, RegistryError> {
        let index = self
            .doc
            .apps
            .iter()
            .position(|app| app.id == app_id)
            .ok_or_else(|| RegistryError::AppNotFound(app_id.to_string()))?;

        let before = self.doc.clone();
        let removed = self.doc.apps.remove(index);
        self.persist(before)?;

        let code_path = self.layout.code_path(app_id);
        match fs::remove_file(&code_path) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(app_id, "Code file already gone");
            }
            Err(e) => {
                warn!(app_id, error = %e, "Could not remove code file");
            }
        }

        info!(app_id, "App deleted");
        Ok(removed)
    }

    /// Add a category. A blank `id` gets a generated one.
    pub fn add_category(
        &mut self,
        name: &str,
        icon: &str,
        id: Option<String>,
    ) -> Result<CategoryRecord, RegistryError> {
        if name.trim().is_empty() {
            return Err(RegistryError::Validation("category name is empty".to_string()));
        }

        let id = match non_blank(id) {
            Some(id) => {
                if !ids::is_valid_id(&id) {
                    return Err(RegistryError::InvalidId(id));
                }
                if self.doc.has_category(&id) {
                    return Err(RegistryError::DuplicateId(id));
                }
                id
            }
            None => ids::generate_unique_id(|candidate| self.doc.has_category(candidate)),
        };

        let category = CategoryRecord {
            id,
            name: name.to_string(),
            icon: icon.to_string(),
        };

        let before = self.doc.clone();
        self.doc.categories.push(category.clone());
        self.persist(before)?;

        info!(category_id = %category.id, "Category added");
        Ok(category)
    }

    pub fn update_category(
        &mut self,
        category_id: &str,
        patch: CategoryPatch,
    ) -> Result<CategoryRecord, RegistryError> {
        let before = self.doc.clone();
        let category = self
            .doc
            .category_mut(category_id)
            .ok_or_else(|| RegistryError::CategoryNotFound(category_id.to_string()))?;

        if let Some(name) = patch.name {
            category.name = name;
        }
        if let Some(icon) = patch.icon {
            category.icon = icon;
        }
        let updated = category.clone();
        self.persist(before)?;

        info!(category_id, "Category updated");
        Ok(updated)
    }

    /// Remove a category nobody references. The default category stays.
    pub fn remove_category(&mut self, category_id: &str) -> Result<CategoryRecord, RegistryError> {
        if category_id == DEFAULT_CATEGORY_ID {
            return Err(RegistryError::ProtectedCategory(category_id.to_string()));
        }
        let index = self
            .doc
            .categories
            .iter()
            .position(|cat| cat.id == category_id)
            .ok_or_else(|| RegistryError::CategoryNotFound(category_id.to_string()))?;

        let in_use = self.list_by_category(category_id).len();
        if in_use > 0 {
            return Err(RegistryError::CategoryInUse {
                id: category_id.to_string(),
                apps: in_use,
            });
        }

        let before = self.doc.clone();
        let removed = self.doc.categories.remove(index);
        self.persist(before)?;

        info!(category_id, "Category removed");
        Ok(removed)
    }

    /// Wipe every app and code file and go back to the default document.
    ///
    /// The default document is written first; if that fails nothing changes.
    pub fn reset_to_factory(&mut self) -> Result<(), RegistryError> {
        let defaults = RegistryDocument::default();
        self.store.save(&defaults)?;
        self.doc = defaults;

        let code_dir = self.layout.code_dir().to_path_buf();
        match fs::remove_dir_all(&code_dir) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(RegistryError::io(&code_dir, e)),
        }
        fs::create_dir_all(&code_dir).map_err(|e| RegistryError::io(&code_dir, e))?;

        warn!("Registry reset to factory state");
        Ok(())
    }

    /// Re-read the document from disk, e.g. after a restore.
    pub fn reload(&mut self) {
        self.doc = self.store.load();
        info!(apps = self.doc.apps.len(), "Registry reloaded");
    }

    fn persist(&mut self, before: RegistryDocument) -> Result<(), RegistryError> {
        if let Err(e) = self.store.save(&self.doc) {
            error!(error = %e, "Failed to save registry document, reverting");
            self.doc = before;
            return Err(e.into());
        }
        Ok(())
    }

    fn write_code(&self, path: &Path, code: &str) -> Result<(), RegistryError> {
        let dir = self.layout.code_dir();
        fs::create_dir_all(dir).map_err(|e| RegistryError::io(dir, e))?;
        fs::write(path, code).map_err(|e| RegistryError::io(path, e))
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn matches_query(app: &AppRecord, needle: &str, fields: SearchFields) -> bool {
    if app.title.to_lowercase().contains(needle) {
        return true;
    }
    fields == SearchFields::TitleAndDescription && app.description.to_lowercase().contains(needle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open(dir: &TempDir) -> AppRegistry {
        AppRegistry::open(HostLayout::new(dir.path()))
    }

    #[test]
    fn test_open_fresh_root_writes_defaults() {
        let dir = TempDir::new().unwrap();
        let registry = open(&dir);

        assert_eq!(registry.document(), &RegistryDocument::default());
        assert!(dir.path().join("apps_config.json").exists());
        assert!(dir.path().join("uploaded_apps").is_dir());
    }

    #[test]
    fn test_add_generates_missing_fields() {
        let dir = TempDir::new().unwrap();
        let mut registry = open(&dir);

        let app = registry
            .add(NewApp::new(DEFAULT_CATEGORY_ID, "def run():\n    pass"))
            .unwrap();

        assert_eq!(app.id.len(), 8);
        assert_eq!(app.module, app.id);
        assert!(!app.title.is_empty());
        assert!(!app.description.is_empty());
        assert!(ICON_LIST.contains(&app.icon.as_str()));
        assert!(registry.layout().code_path(&app.id).exists());
    }

    #[test]
    fn test_add_rejects_blank_code() {
        let dir = TempDir::new().unwrap();
        let mut registry = open(&dir);
        let before = registry.document().clone();

        let err = registry
            .add(NewApp::new(DEFAULT_CATEGORY_ID, "  \n").with_id("blank"))
            .unwrap_err();

        assert!(matches!(err, RegistryError::Validation(_)));
        assert_eq!(registry.document(), &before);
        assert!(!registry.layout().code_path("blank").exists());
    }

    #[test]
    fn test_add_rejects_duplicate_and_invalid_ids() {
        let dir = TempDir::new().unwrap();
        let mut registry = open(&dir);
        registry
            .add(NewApp::new(DEFAULT_CATEGORY_ID, "x").with_id("dup"))
            .unwrap();

        assert!(matches!(
            registry.add(NewApp::new(DEFAULT_CATEGORY_ID, "y").with_id("dup")),
            Err(RegistryError::DuplicateId(_))
        ));
        assert!(matches!(
            registry.add(NewApp::new(DEFAULT_CATEGORY_ID, "y").with_id("../evil")),
            Err(RegistryError::InvalidId(_))
        ));
        assert_eq!(registry.apps().len(), 1);
    }

    #[test]
    fn test_add_requires_known_category() {
        let dir = TempDir::new().unwrap();
        let mut registry = open(&dir);
        assert!(matches!(
            registry.add(NewApp::new("nowhere", "x")),
            Err(RegistryError::CategoryNotFound(_))
        ));
    }

    #[test]
    fn test_update_rewrites_code_file() {
        let dir = TempDir::new().unwrap();
        let mut registry = open(&dir);
        registry
            .add(NewApp::new(DEFAULT_CATEGORY_ID, "old").with_id("app1").with_title("Old"))
            .unwrap();

        let updated = registry
            .update(
                "app1",
                AppPatch {
                    title: Some("New".to_string()),
                    code: Some("new".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();

        assert_eq!(updated.title, "New");
        assert_eq!(registry.code_of("app1").unwrap(), "new");
        assert_eq!(registry.get("app1").unwrap().code, "new");
    }

    #[test]
    fn test_code_of_falls_back_to_record() {
        let dir = TempDir::new().unwrap();
        let mut registry = open(&dir);
        registry
            .add(NewApp::new(DEFAULT_CATEGORY_ID, "body").with_id("app1"))
            .unwrap();
        fs::remove_file(registry.layout().code_path("app1")).unwrap();

        assert_eq!(registry.code_of("app1").unwrap(), "body");
    }

    #[test]
    fn test_delete_is_idempotent_on_missing_file() {
        let dir = TempDir::new().unwrap();
        let mut registry = open(&dir);
        registry
            .add(NewApp::new(DEFAULT_CATEGORY_ID, "body").with_id("app1"))
            .unwrap();
        fs::remove_file(registry.layout().code_path("app1")).unwrap();

        registry.delete("app1").unwrap();
        assert!(registry.get("app1").is_none());
        assert!(matches!(registry.delete("app1"), Err(RegistryError::AppNotFound(_))));
    }

    #[test]
    fn test_search_title_only() {
        let dir = TempDir::new().unwrap();
        let mut registry = open(&dir);
        registry
            .add(
                NewApp::new(DEFAULT_CATEGORY_ID, "x")
                    .with_id("a")
                    .with_title("Plotter")
                    .with_description("thermal model"),
            )
            .unwrap();

        assert_eq!(registry.search("THERMAL", SearchScope::All, SearchFields::TitleAndDescription).len(), 1);
        assert!(registry.search("thermal", SearchScope::All, SearchFields::Title).is_empty());
        assert_eq!(registry.search("   ", SearchScope::All, SearchFields::Title).len(), 1);
    }

    #[test]
    fn test_category_lifecycle() {
        let dir = TempDir::new().unwrap();
        let mut registry = open(&dir);

        let cat = registry.add_category("Tools", "tools", None).unwrap();
        assert_eq!(cat.id.len(), 8);

        registry
            .update_category(
                &cat.id,
                CategoryPatch {
                    name: Some("Toolbox".to_string()),
                    icon: None,
                },
            )
            .unwrap();
        assert_eq!(registry.category(&cat.id).unwrap().name, "Toolbox");
        assert_eq!(registry.category(&cat.id).unwrap().icon, "tools");

        registry
            .add(NewApp::new(cat.id.clone(), "x").with_id("app1"))
            .unwrap();
        assert!(matches!(
            registry.remove_category(&cat.id),
            Err(RegistryError::CategoryInUse { apps: 1, .. })
        ));

        registry.delete("app1").unwrap();
        registry.remove_category(&cat.id).unwrap();
        assert!(registry.category(&cat.id).is_none());

        assert!(matches!(
            registry.remove_category(DEFAULT_CATEGORY_ID),
            Err(RegistryError::ProtectedCategory(_))
        ));
    }

    #[test]
    fn test_failed_save_reverts_memory() {
        let dir = TempDir::new().unwrap();
        let mut registry = open(&dir);

        // A directory squatting on the staging path makes the write fail.
        fs::create_dir(dir.path().join("apps_config.json.tmp")).unwrap();

        let before = registry.document().clone();
        assert!(registry.add_category("Tools", "tools", None).is_err());
        assert_eq!(registry.document(), &before);

        assert!(registry
            .add(NewApp::new(DEFAULT_CATEGORY_ID, "x").with_id("app1"))
            .is_err());
        assert_eq!(registry.document(), &before);
        assert!(!registry.layout().code_path("app1").exists());
    }

    #[test]
    fn test_failed_reset_keeps_apps_and_code() {
        let dir = TempDir::new().unwrap();
        let mut registry = open(&dir);
        registry
            .add(NewApp::new(DEFAULT_CATEGORY_ID, "def run(): pass").with_id("app1"))
            .unwrap();
        fs::create_dir(dir.path().join("apps_config.json.tmp")).unwrap();

        let before = registry.document().clone();
        assert!(registry.reset_to_factory().is_err());

        assert_eq!(registry.document(), &before);
        assert!(registry.layout().code_path("app1").exists());
    }
}
