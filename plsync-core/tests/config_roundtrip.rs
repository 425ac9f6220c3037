//! YAML roundtrip tests for `SyncConfig`.
//!
//! Each `#[case]` is isolated, with no shared state.

use std::collections::HashMap;
use std::path::PathBuf;

use plsync_core::config::{config_path_at, load_at};
use plsync_core::{Category, SyncConfig};
use rstest::rstest;
use tempfile::TempDir;

fn full_config() -> SyncConfig {
    let mut default_pipeline = HashMap::new();
    default_pipeline.insert("logging".to_string(), "nginx.p".to_string());
    default_pipeline.insert("metric".to_string(), "cpu.p".to_string());
    SyncConfig {
        install_dir: Some(PathBuf::from("/usr/local/agent")),
        site_urls: vec![
            "https://openway.example.com?token=tkn_123".to_string(),
            "https://backup.example.com?token=tkn_123".to_string(),
        ],
        pull_interval: "30s".to_string(),
        default_pipeline,
        jitter_percent: 5,
    }
}

#[rstest]
#[case::defaults(SyncConfig::default())]
#[case::full(full_config())]
fn config_survives_yaml_roundtrip(#[case] cfg: SyncConfig) {
    let tmp = TempDir::new().unwrap();
    let path = config_path_at(tmp.path());
    std::fs::write(&path, cfg.to_yaml().unwrap()).unwrap();

    let loaded = load_at(&path).unwrap();
    assert_eq!(loaded, cfg);
}

#[test]
fn empty_file_is_treated_as_defaults() {
    let tmp = TempDir::new().unwrap();
    let path = config_path_at(tmp.path());
    std::fs::write(&path, "\n").unwrap();
    assert_eq!(load_at(&path).unwrap(), SyncConfig::default());
}

#[rstest]
#[case("custom_object", Category::CustomObject)]
#[case("keyevent", Category::KeyEvent)]
#[case("profiling", Category::Profiling)]
fn category_names_match_wire_names(#[case] name: &str, #[case] category: Category) {
    assert_eq!(name.parse::<Category>().unwrap(), category);
    assert_eq!(category.to_string(), name);
}
