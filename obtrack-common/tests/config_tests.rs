//! Configuration resolution and graceful degradation
//!
//! Tests that touch OBTRACK_ROOT_FOLDER are marked #[serial] so they do not
//! race on the process environment.

use obtrack_common::config::{
    default_root_folder, RootFolderResolver, TomlConfig, ROOT_FOLDER_ENV,
};
use serial_test::serial;
use std::env;
use std::path::PathBuf;

#[test]
#[serial]
fn test_resolver_with_no_overrides_uses_default() {
    env::remove_var(ROOT_FOLDER_ENV);

    let resolver = RootFolderResolver::new(None, &TomlConfig::default());
    assert_eq!(resolver.resolve(), default_root_folder());
}

#[test]
#[serial]
fn test_resolver_cli_beats_env() {
    env::set_var(ROOT_FOLDER_ENV, "/tmp/obtrack-env");

    let resolver = RootFolderResolver::new(Some(PathBuf::from("/tmp/obtrack-cli")), &TomlConfig::default());
    assert_eq!(resolver.resolve(), PathBuf::from("/tmp/obtrack-cli"));

    env::remove_var(ROOT_FOLDER_ENV);
}

#[test]
#[serial]
fn test_resolver_env_beats_toml() {
    env::set_var(ROOT_FOLDER_ENV, "/tmp/obtrack-env");

    let config = TomlConfig {
        root_folder: Some(PathBuf::from("/tmp/obtrack-toml")),
        ..Default::default()
    };
    let resolver = RootFolderResolver::new(None, &config);
    assert_eq!(resolver.resolve(), PathBuf::from("/tmp/obtrack-env"));

    env::remove_var(ROOT_FOLDER_ENV);
}

#[test]
#[serial]
fn test_resolver_toml_used_without_env() {
    env::remove_var(ROOT_FOLDER_ENV);

    let config = TomlConfig {
        root_folder: Some(PathBuf::from("/tmp/obtrack-toml")),
        ..Default::default()
    };
    let resolver = RootFolderResolver::new(None, &config);
    assert_eq!(resolver.resolve(), PathBuf::from("/tmp/obtrack-toml"));
}

#[test]
fn test_load_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
root_folder = "/srv/obtrack"
database_file = "compliance.db"

[logging]
level = "debug"

[planning]
months_ahead = 12
default_count = 6
"#,
    )
    .unwrap();

    let config = TomlConfig::load(&path).unwrap();
    assert_eq!(config.root_folder, Some(PathBuf::from("/srv/obtrack")));
    assert_eq!(config.logging.level, "debug");
    assert_eq!(config.planning.months_ahead, 12);
    assert_eq!(config.planning.default_count, 6);
    assert_eq!(
        config.database_path(&PathBuf::from("/srv/obtrack")),
        PathBuf::from("/srv/obtrack/compliance.db")
    );
}

#[test]
fn test_missing_config_falls_back_to_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("absent.toml");

    let config = TomlConfig::load_or_default(Some(&missing));
    assert_eq!(config, TomlConfig::default());
}

#[test]
fn test_broken_config_falls_back_to_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "this is = = not toml").unwrap();

    let config = TomlConfig::load_or_default(Some(&path));
    assert_eq!(config, TomlConfig::default());
}
