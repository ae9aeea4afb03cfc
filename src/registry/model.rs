//! Registry document types

use serde::{Deserialize, Serialize};

use super::ids::is_valid_id;

/// Id of the category every fresh registry starts with
pub const DEFAULT_CATEGORY_ID: &str = "default";

/// Icons offered for new apps
pub const ICON_LIST: &[&str] = &[
    "https://img.icons8.com/color/48/000000/bar-chart.png",
    "https://img.icons8.com/color/48/000000/data-configuration.png",
    "https://img.icons8.com/ios-filled/50/000000/electricity.png",
    "https://img.icons8.com/color/48/000000/python.png",
    "https://img.icons8.com/color/48/000000/code.png",
];

/// One registered app
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppRecord {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub icon: String,
    #[serde(default = "default_category")]
    pub category: String,
    /// Namespace the unit is bound under; empty in older documents
    #[serde(default)]
    pub module: String,
    #[serde(default)]
    pub code: String,
}

fn default_category() -> String {
    DEFAULT_CATEGORY_ID.to_string()
}

/// A navigation group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRecord {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub icon: String,
}

/// Full persisted registry state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryDocument {
    pub apps: Vec<AppRecord>,
    pub categories: Vec<CategoryRecord>,
}

impl Default for RegistryDocument {
    fn default() -> Self {
        Self {
            apps: Vec::new(),
            categories: vec![CategoryRecord {
                id: DEFAULT_CATEGORY_ID.to_string(),
                name: "Default".to_string(),
                icon: "folder".to_string(),
            }],
        }
    }
}

impl RegistryDocument {
    pub fn app(&self, app_id: &str) -> Option<&AppRecord> {
        self.apps.iter().find(|app| app.id == app_id)
    }

    pub fn app_mut(&mut self, app_id: &str) -> Option<&mut AppRecord> {
        self.apps.iter_mut().find(|app| app.id == app_id)
    }

    pub fn category(&self, category_id: &str) -> Option<&CategoryRecord> {
        self.categories.iter().find(|cat| cat.id == category_id)
    }

    pub fn category_mut(&mut self, category_id: &str) -> Option<&mut CategoryRecord> {
        self.categories.iter_mut().find(|cat| cat.id == category_id)
    }

    pub fn has_app(&self, app_id: &str) -> bool {
        self.app(app_id).is_some()
    }

    pub fn has_category(&self, category_id: &str) -> bool {
        self.category(category_id).is_some()
    }

    /// Drop apps whose id is not a valid slug and fill in `module` for
    /// records written before it existed. Returns the dropped ids.
    pub(crate) fn normalize(&mut self) -> Vec<String> {
        let mut rejected = Vec::new();
        self.apps.retain(|app| {
            let valid = is_valid_id(&app.id);
            if !valid {
                rejected.push(app.id.clone());
            }
            valid
        });
        for app in &mut self.apps {
            if app.module.is_empty() {
                app.module = app.id.clone();
            }
        }
        rejected
    }
}

/// Upload form for a new app; unset fields are generated
#[derive(Debug, Clone, Default)]
pub struct NewApp {
    pub id: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub category: String,
    pub code: String,
}

impl NewApp {
    pub fn new(category: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            code: code.into(),
            ..Default::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }
}

/// Edit form for an existing app; `None` leaves a field unchanged
#[derive(Debug, Clone, Default)]
pub struct AppPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub category: Option<String>,
    pub code: Option<String>,
}

impl AppPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.icon.is_none()
            && self.category.is_none()
            && self.code.is_none()
    }
}

/// Edit form for a category
#[derive(Debug, Clone, Default)]
pub struct CategoryPatch {
    pub name: Option<String>,
    pub icon: Option<String>,
}

/// Which apps a search looks at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchScope<'a> {
    All,
    Category(&'a str),
}

/// Which text fields a search matches against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchFields {
    /// Navigation menu search
    Title,
    /// Home view search
    #[default]
    TitleAndDescription,
}

/// One category and the apps listed under it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryView {
    pub category: CategoryRecord,
    pub apps: Vec<AppRecord>,
}
