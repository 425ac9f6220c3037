//! Local config store: the last-applied snapshot identity.
//!
//! Persists a [`PullConfig`] JSON document at
//! `<remote_dir>/pull_config.json`:
//!
//! ```json
//! {"SiteURL": "https://openway.example.com?token=tkn_123", "UpdateTime": 1644318398}
//! ```
//!
//! An absent file is not an error; it means nothing has been applied yet.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{io_err, SyncError};
use crate::remote::PipelineRemote;

pub const PULL_CONFIG_FILE: &str = "pull_config.json";

/// On-disk record of the last applied snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PullConfig {
    #[serde(rename = "SiteURL")]
    pub site_url: String,
    #[serde(rename = "UpdateTime")]
    pub update_time: i64,
}

impl PullConfig {
    pub fn matches_site(&self, site_url: &str) -> bool {
        self.site_url == site_url
    }
}

/// Load the record through `remote`. Returns `None` if absent.
pub fn load<R>(remote: &R, path: &Path) -> Result<Option<PullConfig>, SyncError>
where
    R: PipelineRemote + ?Sized,
{
    if !remote.file_exists(path) {
        return Ok(None);
    }
    let bytes = remote.read_file(path)?;
    Ok(Some(serde_json::from_slice(&bytes)?))
}

/// Load the record straight from disk, for read-only callers such as the CLI.
pub fn load_at(path: &Path) -> Result<Option<PullConfig>, SyncError> {
    if !path.exists() {
        return Ok(None);
    }
    let bytes = std::fs::read(path).map_err(|e| io_err(path, e))?;
    Ok(Some(serde_json::from_slice(&bytes)?))
}

/// Overwrite the record through `remote`.
pub fn save<R>(remote: &R, path: &Path, site_url: &str, update_time: i64) -> Result<(), SyncError>
where
    R: PipelineRemote + ?Sized,
{
    let record = PullConfig {
        site_url: site_url.to_string(),
        update_time,
    };
    let json = serde_json::to_vec(&record)?;
    remote.write_file(path, &json)
}
