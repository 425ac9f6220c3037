//! Agent configuration for remote pipeline sync.
//!
//! # Storage layout
//!
//! ```text
//! <install_dir>/
//!   plsync.yaml          (this config; optional)
//!   pipeline_remote/     (owned by the reconciler)
//! ```
//!
//! A missing config file is not an error: every field has a default.
//! Like the rest of the workspace, path-taking functions come in an `_at`
//! form so tests can point them at a `TempDir`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const CONFIG_FILE_NAME: &str = "plsync.yaml";
pub const REMOTE_DIR_NAME: &str = "pipeline_remote";
pub const DEFAULT_PULL_INTERVAL: &str = "1m";
pub const DEFAULT_JITTER_PERCENT: u8 = 10;

/// Effective configuration of the sync subsystem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Agent install directory. `None` means `~/.plsync`.
    pub install_dir: Option<PathBuf>,
    /// Candidate control-point URLs; the first non-blank one is used.
    pub site_urls: Vec<String>,
    /// Polling interval in humantime syntax (`"30s"`, `"1m"`, `"1h30m"`).
    pub pull_interval: String,
    /// Local category → default script overrides.
    pub default_pipeline: HashMap<String, String>,
    /// Extra random delay per poll, as a percentage of the interval.
    pub jitter_percent: u8,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            install_dir: None,
            site_urls: Vec::new(),
            pull_interval: DEFAULT_PULL_INTERVAL.to_string(),
            default_pipeline: HashMap::new(),
            jitter_percent: DEFAULT_JITTER_PERCENT,
        }
    }
}

impl SyncConfig {
    /// Resolved install directory.
    pub fn install_dir(&self) -> Result<PathBuf, ConfigError> {
        match &self.install_dir {
            Some(dir) => Ok(dir.clone()),
            None => default_install_dir(),
        }
    }

    /// `<install_dir>/pipeline_remote`
    pub fn remote_dir(&self) -> Result<PathBuf, ConfigError> {
        Ok(remote_dir_at(&self.install_dir()?))
    }

    /// Jitter clamped to `0..=100`.
    pub fn jitter_percent(&self) -> u8 {
        self.jitter_percent.min(100)
    }

    /// First non-blank candidate site URL, trimmed.
    pub fn site_url(&self) -> Option<&str> {
        first_site_url(&self.site_urls)
    }

    /// Render as YAML for display.
    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }
}

/// First non-blank entry of `urls`, trimmed.
pub fn first_site_url(urls: &[String]) -> Option<&str> {
    urls.iter().map(|u| u.trim()).find(|u| !u.is_empty())
}

/// `~/.plsync`
pub fn default_install_dir() -> Result<PathBuf, ConfigError> {
    dirs::home_dir()
        .map(|home| home.join(".plsync"))
        .ok_or(ConfigError::HomeNotFound)
}

/// `<install_dir>/plsync.yaml`: pure, no I/O.
pub fn config_path_at(install_dir: &Path) -> PathBuf {
    install_dir.join(CONFIG_FILE_NAME)
}

/// `<install_dir>/pipeline_remote`: pure, no I/O.
pub fn remote_dir_at(install_dir: &Path) -> PathBuf {
    install_dir.join(REMOTE_DIR_NAME)
}

/// Load the config at `path`, falling back to defaults when absent.
pub fn load_at(path: &Path) -> Result<SyncConfig, ConfigError> {
    if !path.exists() {
        return Ok(SyncConfig::default());
    }
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    if contents.trim().is_empty() {
        return Ok(SyncConfig::default());
    }
    serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_yields_defaults() {
        let tmp = TempDir::new().unwrap();
        let cfg = load_at(&tmp.path().join("absent.yaml")).unwrap();
        assert_eq!(cfg, SyncConfig::default());
        assert_eq!(cfg.pull_interval, "1m");
    }

    #[test]
    fn partial_file_keeps_defaults_for_unset_keys() {
        let tmp = TempDir::new().unwrap();
        let path = config_path_at(tmp.path());
        std::fs::write(
            &path,
            "site_urls:\n  - \"  \"\n  - https://openway.example.com?token=tkn_1\ndefault_pipeline:\n  logging: nginx.p\n",
        )
        .unwrap();

        let cfg = load_at(&path).unwrap();
        assert_eq!(cfg.pull_interval, DEFAULT_PULL_INTERVAL);
        assert_eq!(cfg.jitter_percent, DEFAULT_JITTER_PERCENT);
        assert_eq!(cfg.site_url(), Some("https://openway.example.com?token=tkn_1"));
        assert_eq!(cfg.default_pipeline.get("logging"), Some(&"nginx.p".to_string()));
    }

    #[test]
    fn malformed_yaml_reports_path() {
        let tmp = TempDir::new().unwrap();
        let path = config_path_at(tmp.path());
        std::fs::write(&path, "site_urls: {not: [a list").unwrap();

        let err = load_at(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("plsync.yaml"));
    }

    #[test]
    fn remote_dir_is_under_install_dir() {
        let cfg = SyncConfig {
            install_dir: Some(PathBuf::from("/opt/agent")),
            ..SyncConfig::default()
        };
        assert_eq!(
            cfg.remote_dir().unwrap(),
            PathBuf::from("/opt/agent/pipeline_remote")
        );
    }

    #[test]
    fn jitter_is_clamped() {
        let cfg = SyncConfig {
            jitter_percent: 250,
            ..SyncConfig::default()
        };
        assert_eq!(cfg.jitter_percent(), 100);
    }

    #[test]
    fn no_site_url_when_all_blank() {
        assert_eq!(first_site_url(&["".to_string(), "  ".to_string()]), None);
        assert_eq!(first_site_url(&[]), None);
    }
}
