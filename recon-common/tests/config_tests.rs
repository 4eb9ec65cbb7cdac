//! Tests for configuration file loading and resolution priority
//!
//! Tests touching the process environment are marked #[serial] so they do
//! not race each other.

use recon_common::config::{
    default_config_paths, load_toml_config, ConfigOverrides, ServiceConfig, TomlConfig,
    DEFAULT_PORT,
};
use recon_common::Error;
use serial_test::serial;
use std::path::PathBuf;
use tempfile::TempDir;

#[test]
fn test_explicit_config_file_loaded() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
port = 4200
database_path = "/tmp/recon-test/contacts.db"
lock_wait_ms = 750
"#,
    )
    .unwrap();

    let file = load_toml_config(Some(&path)).unwrap();
    assert_eq!(file.port, Some(4200));
    assert_eq!(file.lock_wait_ms, Some(750));
    assert_eq!(file.bind, None);

    let config = ServiceConfig::resolve(ConfigOverrides::default(), file).unwrap();
    assert_eq!(config.port, 4200);
    assert_eq!(config.database_path, PathBuf::from("/tmp/recon-test/contacts.db"));
}

#[test]
fn test_missing_explicit_config_is_error() {
    let dir = TempDir::new().unwrap();
    let result = load_toml_config(Some(&dir.path().join("absent.toml")));
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
fn test_malformed_config_is_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "port = \"not a number\"").unwrap();

    let result = load_toml_config(Some(&path));
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
fn test_unknown_key_is_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "prot = 3500").unwrap();

    assert!(load_toml_config(Some(&path)).is_err());
}

#[test]
#[serial]
fn test_missing_default_config_uses_defaults() {
    // Point the platform config dir at an empty directory
    let dir = TempDir::new().unwrap();
    let old = std::env::var_os("XDG_CONFIG_HOME");
    std::env::set_var("XDG_CONFIG_HOME", dir.path());

    let candidates = default_config_paths();
    let any_present = candidates.iter().any(|p| p.exists());
    let file = load_toml_config(None);

    match old {
        Some(value) => std::env::set_var("XDG_CONFIG_HOME", value),
        None => std::env::remove_var("XDG_CONFIG_HOME"),
    }

    // A system-wide /etc/recon/config.toml may legitimately exist on the host
    if !any_present {
        assert_eq!(file.unwrap(), TomlConfig::default());
        let config = ServiceConfig::resolve(ConfigOverrides::default(), TomlConfig::default())
            .unwrap();
        assert_eq!(config.port, DEFAULT_PORT);
    }
}
