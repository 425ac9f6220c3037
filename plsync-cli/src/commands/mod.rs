pub mod config;
pub mod run;
pub mod show;
pub mod status;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use plsync_core::{config as core_config, SyncConfig};

/// Where to find the agent config.
#[derive(Args, Debug, Clone, Default)]
pub struct ConfigArgs {
    /// Agent install directory (default: ~/.plsync).
    #[arg(long, global = true)]
    pub install_dir: Option<PathBuf>,

    /// Explicit config file (default: <install-dir>/plsync.yaml).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

impl ConfigArgs {
    /// Load the config file, then apply `--install-dir`.
    pub fn load(&self) -> Result<SyncConfig> {
        let path = match (&self.config, &self.install_dir) {
            (Some(path), _) => path.clone(),
            (None, Some(dir)) => core_config::config_path_at(dir),
            (None, None) => core_config::config_path_at(
                &core_config::default_install_dir().context("could not determine home directory")?,
            ),
        };
        let mut config = core_config::load_at(&path)
            .with_context(|| format!("failed to load config {}", path.display()))?;
        if let Some(dir) = &self.install_dir {
            config.install_dir = Some(dir.clone());
        }
        Ok(config)
    }
}

/// Sync settings that can be given on the command line.
#[derive(Args, Debug, Clone, Default)]
pub struct SyncOverrides {
    /// Control-point URL; repeat for fallbacks. Replaces `site_urls` from the file.
    #[arg(long = "site-url", value_name = "URL")]
    pub site_urls: Vec<String>,

    /// Polling interval, e.g. `30s`, `5m`. `0s` pulls once and exits.
    #[arg(long, value_name = "DURATION")]
    pub interval: Option<String>,
}

impl SyncOverrides {
    pub fn apply(&self, config: &mut SyncConfig) {
        if !self.site_urls.is_empty() {
            config.site_urls = self.site_urls.clone();
        }
        if let Some(interval) = &self.interval {
            config.pull_interval = interval.clone();
        }
    }
}

/// Site URL with its query (and token) stripped, for display.
pub fn display_site(site_url: &str) -> String {
    match plsync_daemon::SiteUrl::parse(site_url) {
        Ok(site) => site.base().to_string(),
        Err(_) => "<invalid site url>".to_string(),
    }
}
