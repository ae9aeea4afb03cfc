//! apphost - a host for user-submitted app snippets
//!
//! Apps are registered in a JSON document, their code lives in one file per
//! app, and the host binds that code at runtime and calls its `run()` entry
//! point.
//!
//! ## Components
//!
//! - **Registry**: the registry document, its JSON store and all app/category
//!   queries and mutations
//! - **Loader**: binds app sources into units and runs them through a
//!   swappable executor
//! - **Backup**: timestamped snapshots with restore, delete and zip export
//! - **Host**: facade sequencing effects that span components

pub mod backup;
pub mod cli;
pub mod config;
pub mod host;
pub mod layout;
pub mod loader;
pub mod registry;

pub use config::HostConfig;
pub use host::{AppHost, HostError};
pub use layout::HostLayout;
