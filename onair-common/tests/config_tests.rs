//! Configuration resolution tests

use onair_common::config::{
    load_toml_config, load_toml_config_or_default, write_toml_config, RootFolderInitializer,
    RootFolderResolver, TomlConfig, ROOT_FOLDER_ENV,
};
use serial_test::serial;
use std::env;
use std::path::PathBuf;
use tempfile::TempDir;

#[test]
#[serial]
fn test_cli_argument_has_highest_priority() {
    env::set_var(ROOT_FOLDER_ENV, "/tmp/onair-from-env");
    let toml = TomlConfig {
        root_folder: Some(PathBuf::from("/tmp/onair-from-toml")),
        ..Default::default()
    };

    let resolver = RootFolderResolver::new(Some(PathBuf::from("/tmp/onair-from-cli")), Some(toml));
    assert_eq!(resolver.resolve(), PathBuf::from("/tmp/onair-from-cli"));

    env::remove_var(ROOT_FOLDER_ENV);
}

#[test]
#[serial]
fn test_environment_beats_toml() {
    env::set_var(ROOT_FOLDER_ENV, "/tmp/onair-from-env");
    let toml = TomlConfig {
        root_folder: Some(PathBuf::from("/tmp/onair-from-toml")),
        ..Default::default()
    };

    let resolver = RootFolderResolver::new(None, Some(toml));
    assert_eq!(resolver.resolve(), PathBuf::from("/tmp/onair-from-env"));

    env::remove_var(ROOT_FOLDER_ENV);
}

#[test]
#[serial]
fn test_toml_used_when_no_cli_or_env() {
    env::remove_var(ROOT_FOLDER_ENV);
    let toml = TomlConfig {
        root_folder: Some(PathBuf::from("/tmp/onair-from-toml")),
        ..Default::default()
    };

    let resolver = RootFolderResolver::new(None, Some(toml));
    assert_eq!(resolver.resolve(), PathBuf::from("/tmp/onair-from-toml"));
}

#[test]
#[serial]
fn test_default_root_folder_fallback() {
    env::remove_var(ROOT_FOLDER_ENV);
    let resolver = RootFolderResolver::new(None, None);
    let root = resolver.resolve();
    assert!(root.to_string_lossy().contains("onair"));
}

#[test]
fn test_initializer_creates_media_layout() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().join("station");
    let initializer = RootFolderInitializer::new(root.clone());

    initializer.ensure_directory_exists().unwrap();
    // Safe to call multiple times
    initializer.ensure_directory_exists().unwrap();

    assert!(root.join("playlists").is_dir());
    assert!(root.join("narration").is_dir());
    assert!(root.join("video_stream").join("hls").is_dir());
    assert_eq!(initializer.database_path(), root.join("onair.db"));
    assert!(!initializer.database_exists());
}

#[test]
fn test_toml_write_then_load_preserves_sections() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.toml");

    let mut config = TomlConfig::default();
    config.narration.base_url = "http://brain.local:9000".to_string();
    config.broadcast.control_addr = "127.0.0.1:4321".to_string();
    write_toml_config(&config, &path).unwrap();

    let loaded = load_toml_config(&path).unwrap();
    assert_eq!(loaded.narration.base_url, "http://brain.local:9000");
    assert_eq!(loaded.broadcast.control_addr, "127.0.0.1:4321");
    assert_eq!(loaded.video.ffprobe, "ffprobe");
}

#[test]
fn test_partial_toml_fills_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.toml");
    std::fs::write(&path, "root_folder = \"/srv/onair\"\n").unwrap();

    let loaded = load_toml_config(&path).unwrap();
    assert_eq!(loaded.root_folder, Some(PathBuf::from("/srv/onair")));
    assert_eq!(loaded.narration.text_timeout_secs, 30);
    assert_eq!(loaded.broadcast.control_namespace, "onair");
}

#[test]
fn test_malformed_toml_falls_back_to_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.toml");
    std::fs::write(&path, "root_folder = [[[").unwrap();

    assert!(load_toml_config(&path).is_err());
    let config = load_toml_config_or_default(Some(&path));
    assert!(config.root_folder.is_none());
}

#[test]
fn test_missing_config_file_is_not_an_error() {
    let temp_dir = TempDir::new().unwrap();
    let config = load_toml_config_or_default(Some(&temp_dir.path().join("absent.toml")));
    assert!(config.root_folder.is_none());
}
