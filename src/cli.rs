//! Command-line surface over [`AppHost`]
//!
//! Each command performs one operation and returns the text to print.

use std::fmt::Write as _;
use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Args, Subcommand};

use crate::backup::BackupInfo;
use crate::host::AppHost;
use crate::registry::{
    AppPatch, AppRecord, CategoryPatch, CategoryView, NewApp, SearchFields, SearchScope,
};

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Show apps grouped by category
    Home {
        /// Filter by title or description
        #[arg(short, long, default_value = "")]
        search: String,
    },

    /// Manage apps
    #[command(subcommand)]
    Apps(AppCommands),

    /// Manage categories
    #[command(subcommand)]
    Categories(CategoryCommands),

    /// Manage backups
    #[command(subcommand)]
    Backup(BackupCommands),

    /// Delete every app and restore the default registry
    Reset {
        /// Confirm the reset
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Debug, Subcommand)]
pub enum AppCommands {
    /// List apps
    List {
        /// Only apps in this category
        #[arg(short, long)]
        category: Option<String>,
        /// Case-insensitive search text
        #[arg(short, long, default_value = "")]
        search: String,
        /// Match the search against titles only
        #[arg(long)]
        title_only: bool,
    },

    /// Show an app and its code
    Show {
        id: String,
    },

    /// Upload a new app
    Add {
        #[command(flatten)]
        fields: AppFields,
        /// App id (generated if omitted)
        #[arg(long)]
        id: Option<String>,
    },

    /// Edit an app
    Update {
        id: String,
        #[command(flatten)]
        fields: AppFields,
    },

    /// Delete an app and its code file
    Remove {
        id: String,
    },

    /// Run an app's entry point
    Run {
        id: String,
    },
}

#[derive(Debug, Args)]
pub struct AppFields {
    #[arg(long)]
    pub title: Option<String>,
    #[arg(long)]
    pub description: Option<String>,
    #[arg(long)]
    pub icon: Option<String>,
    #[arg(short, long)]
    pub category: Option<String>,
    /// Read code from this file
    #[arg(long, conflicts_with = "code")]
    pub code_file: Option<PathBuf>,
    /// Code given inline
    #[arg(long)]
    pub code: Option<String>,
}

impl AppFields {
    fn read_code(&self) -> anyhow::Result<Option<String>> {
        match (&self.code_file, &self.code) {
            (Some(path), _) => std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))
                .map(Some),
            (None, code) => Ok(code.clone()),
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum CategoryCommands {
    /// List categories
    List,

    /// Add a category
    Add {
        #[arg(short, long)]
        name: String,
        #[arg(short, long, default_value = "folder")]
        icon: String,
        /// Category id (generated if omitted)
        #[arg(long)]
        id: Option<String>,
    },

    /// Rename or re-icon a category
    Update {
        id: String,
        #[arg(short, long)]
        name: Option<String>,
        #[arg(short, long)]
        icon: Option<String>,
    },

    /// Remove a category no app uses
    Remove {
        id: String,
    },
}

#[derive(Debug, Subcommand)]
pub enum BackupCommands {
    /// Snapshot the registry and code directory
    Create {
        /// Optional label placed in the backup name
        #[arg(short, long)]
        label: Option<String>,
    },

    /// List backups, newest first
    List,

    /// Replace the current state with a backup
    Restore {
        id: String,
    },

    /// Delete a backup
    Delete {
        id: String,
    },

    /// Write a backup as a zip archive
    Export {
        id: String,
        /// Output file (defaults to <id>.zip)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
}

/// Execute a command against the host
pub fn execute_command(host: &mut AppHost, command: Commands) -> anyhow::Result<String> {
    match command {
        Commands::Home { search } => {
            let view = host
                .registry()
                .navigation(&search, SearchFields::TitleAndDescription);
            Ok(format_navigation(&view))
        }
        Commands::Apps(cmd) => execute_app_command(host, cmd),
        Commands::Categories(cmd) => execute_category_command(host, cmd),
        Commands::Backup(cmd) => execute_backup_command(host, cmd),
        Commands::Reset { yes } => {
            if !yes {
                bail!("Reset deletes every app; pass --yes to confirm");
            }
            host.reset_to_factory()?;
            Ok("Registry reset to factory state".to_string())
        }
    }
}

fn execute_app_command(host: &mut AppHost, command: AppCommands) -> anyhow::Result<String> {
    match command {
        AppCommands::List {
            category,
            search,
            title_only,
        } => {
            let scope = match category.as_deref() {
                Some(id) => SearchScope::Category(id),
                None => SearchScope::All,
            };
            let fields = if title_only {
                SearchFields::Title
            } else {
                SearchFields::TitleAndDescription
            };
            let apps = host.registry().search(&search, scope, fields);
            Ok(format_apps(apps))
        }

        AppCommands::Show { id } => {
            let app = host
                .registry()
                .get(&id)
                .cloned()
                .with_context(|| format!("App not found: {}", id))?;
            let code = host.registry().code_of(&id)?;
            Ok(format!("{}\n\n{}", format_app(&app), code))
        }

        AppCommands::Add { fields, id } => {
            let code = fields.read_code()?.unwrap_or_default();
            let new_app = NewApp {
                id,
                title: fields.title,
                description: fields.description,
                icon: fields.icon,
                category: fields
                    .category
                    .unwrap_or_else(|| crate::registry::DEFAULT_CATEGORY_ID.to_string()),
                code,
            };
            let app = host.add_app(new_app)?;
            Ok(format!("Added {}", format_app(&app)))
        }

        AppCommands::Update { id, fields } => {
            let patch = AppPatch {
                code: fields.read_code()?,
                title: fields.title,
                description: fields.description,
                icon: fields.icon,
                category: fields.category,
            };
            if patch.is_empty() {
                bail!("Nothing to update");
            }
            let app = host.update_app(&id, patch)?;
            Ok(format!("Updated {}", format_app(&app)))
        }

        AppCommands::Remove { id } => {
            let app = host.delete_app(&id)?;
            Ok(format!("Removed {} ({})", app.id, app.title))
        }

        AppCommands::Run { id } => {
            let report = host.run_app(&id)?;
            let mut out = report.stdout;
            if !report.stderr.is_empty() {
                out.push_str(&report.stderr);
            }
            let _ = write!(out, "\n[{} finished in {:.2?}]", report.app_id, report.elapsed);
            Ok(out)
        }
    }
}

fn execute_category_command(host: &mut AppHost, command: CategoryCommands) -> anyhow::Result<String> {
    let registry = host.registry_mut();
    match command {
        CategoryCommands::List => {
            let mut out = String::new();
            for cat in registry.categories() {
                let count = registry.list_by_category(&cat.id).len();
                let _ = writeln!(out, "{:<10} {:<20} {:<12} {} app(s)", cat.id, cat.name, cat.icon, count);
            }
            Ok(out)
        }
        CategoryCommands::Add { name, icon, id } => {
            let cat = registry.add_category(&name, &icon, id)?;
            Ok(format!("Added category {} ({})", cat.id, cat.name))
        }
        CategoryCommands::Update { id, name, icon } => {
            let cat = registry.update_category(&id, CategoryPatch { name, icon })?;
            Ok(format!("Updated category {} ({})", cat.id, cat.name))
        }
        CategoryCommands::Remove { id } => {
            let cat = registry.remove_category(&id)?;
            Ok(format!("Removed category {} ({})", cat.id, cat.name))
        }
    }
}

fn execute_backup_command(host: &mut AppHost, command: BackupCommands) -> anyhow::Result<String> {
    match command {
        BackupCommands::Create { label } => {
            let info = host.create_backup(label.as_deref())?;
            Ok(format!("Backup created at {}", info.path.display()))
        }
        BackupCommands::List => {
            let backups = host.backups().list_available()?;
            if backups.is_empty() {
                return Ok("No backups".to_string());
            }
            Ok(format_backups(&backups))
        }
        BackupCommands::Restore { id } => {
            host.restore_backup(&id)?;
            Ok(format!("Restored {}", id))
        }
        BackupCommands::Delete { id } => {
            host.backups().delete(&id)?;
            Ok(format!("Deleted {}", id))
        }
        BackupCommands::Export { id, out } => {
            let bytes = host.backups().export(&id)?;
            let out = out.unwrap_or_else(|| PathBuf::from(format!("{}.zip", id)));
            std::fs::write(&out, &bytes).with_context(|| format!("writing {}", out.display()))?;
            Ok(format!("Exported {} ({} bytes) to {}", id, bytes.len(), out.display()))
        }
    }
}

fn format_app(app: &AppRecord) -> String {
    format!(
        "{} [{}] {}\n  {}\n  icon: {}",
        app.id, app.category, app.title, app.description, app.icon
    )
}

fn format_apps(apps: Vec<&AppRecord>) -> String {
    if apps.is_empty() {
        return "No apps".to_string();
    }
    let mut out = String::new();
    for app in apps {
        let _ = writeln!(out, "{:<10} {:<12} {}", app.id, app.category, app.title);
    }
    out
}

fn format_navigation(view: &[CategoryView]) -> String {
    if view.is_empty() {
        return "No apps".to_string();
    }
    let mut out = String::new();
    for group in view {
        let _ = writeln!(out, "== {} ({})", group.category.name, group.category.id);
        for app in &group.apps {
            let _ = writeln!(out, "  {:<10} {} - {}", app.id, app.title, app.description);
        }
    }
    out
}

fn format_backups(backups: &[BackupInfo]) -> String {
    let mut out = String::new();
    for backup in backups {
        let _ = writeln!(
            out,
            "{:<40} {}",
            backup.id,
            backup.created_at.format("%Y-%m-%d %H:%M:%S")
        );
    }
    out
}
