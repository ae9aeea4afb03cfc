//! Configuration loading tests

use std::fs;
use std::path::PathBuf;

use apphost::config::ConfigError;
use apphost::{HostConfig, HostLayout};
use tempfile::TempDir;

#[test]
fn test_missing_file_gives_defaults() {
    let dir = TempDir::new().unwrap();
    let config = HostConfig::load(&dir.path().join("absent.toml")).unwrap();

    assert_eq!(config.paths.root, PathBuf::from("."));
    assert_eq!(config.paths.config_file, "apps_config.json");
    assert_eq!(config.loader.interpreter, "python3");
    assert_eq!(config.loader.max_loaded_units, 64);
}

#[test]
fn test_sample_config_parses() {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("apphost.toml");
    let config = HostConfig::load(&path).unwrap();
    assert_eq!(config.paths.code_dir, "uploaded_apps");
    assert_eq!(config.loader.extension, "py");
}

#[test]
fn test_layout_follows_config() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("apphost.toml");
    fs::write(
        &path,
        format!(
            r#"
[paths]
root = "{}"
code_dir = "scripts"
backup_dir = "snapshots"

[loader]
extension = "pyw"
"#,
            dir.path().display()
        ),
    )
    .unwrap();

    let layout = HostLayout::from_config(&HostConfig::load(&path).unwrap());

    assert_eq!(layout.code_dir(), dir.path().join("scripts"));
    assert_eq!(layout.backup_dir(), dir.path().join("snapshots"));
    assert_eq!(layout.config_file(), dir.path().join("apps_config.json"));
    assert_eq!(layout.code_path("abc"), dir.path().join("scripts").join("abc.pyw"));
}

#[test]
fn test_invalid_toml_is_parse_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bad.toml");
    fs::write(&path, "[loader]\nmax_loaded_units = \"many\"\n").unwrap();

    assert!(matches!(HostConfig::load(&path), Err(ConfigError::Parse { .. })));
}
