//! Reconciler: one pull-and-apply cycle.
//!
//! ## Cycle
//!
//! 1. Resolve the last applied timestamp from the local record
//!    (site change or unreadable record → reset to 0; first cycle of the
//!    process → restore the archive into the script manager, then use 0).
//! 2. Pull with that timestamp and the manager's relation timestamp.
//! 3. Relation table: replace and dump whenever the pull carries one,
//!    whatever happens to scripts.
//! 4. Scripts, by [`ScriptsUpdate`]:
//!    - `Unchanged` → nothing.
//!    - `DeleteAll` → clear the remote namespace and defaults, remove
//!      synced files.
//!    - `Apply` → remove synced files, rewrite the archive, load the remote
//!      namespace, push merged defaults, persist the record.
//!
//! A failure before the manager load leaves the old record in place, so the
//! next cycle retries from the same timestamp. A persist failure after the
//! load is reported but not rolled back; the next cycle re-applies.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use plsync_core::{
    DefaultScripts, Namespace, RelationUpdate, RemoteSnapshot, ScriptsByCategory, ScriptsUpdate,
};

use crate::config_store::{self, PULL_CONFIG_FILE};
use crate::content;
use crate::error::SyncError;
use crate::manager::{LoadOptions, ScriptManager};
use crate::relation_dump::{self, RELATION_DUMP_FILE};
use crate::remote::PipelineRemote;

pub const ARCHIVE_FILE: &str = "scripts.tar.gz";

/// Files the reconciler owns under the remote directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemotePaths {
    pub dir: PathBuf,
    pub config: PathBuf,
    pub archive: PathBuf,
    pub relation: PathBuf,
}

impl RemotePaths {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        Self {
            config: dir.join(PULL_CONFIG_FILE),
            archive: dir.join(ARCHIVE_FILE),
            relation: dir.join(RELATION_DUMP_FILE),
            dir,
        }
    }

    /// Files that survive a content wipe.
    fn is_preserved(&self, path: &Path) -> bool {
        path == self.config || path == self.relation
    }
}

/// What happened to the script set in one cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptsOutcome {
    Unchanged,
    Deleted,
    Applied { updated_at: i64, failed_scripts: usize },
}

/// Outcome of one successful cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub scripts: ScriptsOutcome,
    /// `Some(ts)` when the relation table was replaced.
    pub relation_updated_at: Option<i64>,
}

impl CycleReport {
    pub fn label(&self) -> &'static str {
        match self.scripts {
            ScriptsOutcome::Unchanged => "unchanged",
            ScriptsOutcome::Deleted => "deleted",
            ScriptsOutcome::Applied { .. } => "applied",
        }
    }
}

/// Drives pull cycles against one remote directory.
pub struct Reconciler<R> {
    remote: R,
    manager: Arc<dyn ScriptManager>,
    paths: RemotePaths,
    local_defaults: DefaultScripts,
    is_first: bool,
}

impl<R: PipelineRemote> Reconciler<R> {
    pub fn new(remote: R, manager: Arc<dyn ScriptManager>, remote_dir: impl Into<PathBuf>) -> Self {
        Self {
            remote,
            manager,
            paths: RemotePaths::new(remote_dir),
            local_defaults: DefaultScripts::new(),
            is_first: true,
        }
    }

    /// Local category → default overrides, merged over remote defaults.
    pub fn with_local_defaults(mut self, defaults: DefaultScripts) -> Self {
        self.local_defaults = defaults;
        self
    }

    pub fn paths(&self) -> &RemotePaths {
        &self.paths
    }

    pub fn remote(&self) -> &R {
        &self.remote
    }

    /// Run one full cycle for `site_url`.
    pub fn run_cycle(&mut self, site_url: &str) -> Result<CycleReport, SyncError> {
        let last_applied = self.last_applied(site_url)?;
        let relation_since = self.manager.relation_updated_at();

        let snapshot = self
            .remote
            .pull(last_applied, relation_since)
            .map_err(|err| {
                tracing::warn!("pull from control point failed: {err}");
                err
            })?;
        tracing::debug!(
            "pulled scripts_updated_at={} relation_updated_at={} (local {last_applied}, relation {relation_since})",
            snapshot.scripts_updated_at,
            snapshot.relation_updated_at,
        );

        let relation_updated_at = self.apply_relation(&snapshot);

        let scripts = match snapshot.scripts_update(last_applied) {
            ScriptsUpdate::Unchanged => {
                tracing::debug!("remote scripts already up to date");
                ScriptsOutcome::Unchanged
            }
            ScriptsUpdate::DeleteAll => {
                self.delete_all()?;
                ScriptsOutcome::Deleted
            }
            ScriptsUpdate::Apply(updated_at) => {
                let failed_scripts = self.apply_scripts(site_url, updated_at, snapshot)?;
                ScriptsOutcome::Applied {
                    updated_at,
                    failed_scripts,
                }
            }
        };

        Ok(CycleReport {
            scripts,
            relation_updated_at,
        })
    }

    /// Timestamp to send as `scripts_since`.
    fn last_applied(&mut self, site_url: &str) -> Result<i64, SyncError> {
        let is_first = std::mem::replace(&mut self.is_first, false);

        let record = match config_store::load(&self.remote, &self.paths.config) {
            Ok(Some(record)) => record,
            Ok(None) => return Ok(0),
            Err(SyncError::Json(err)) => {
                tracing::error!(
                    "unreadable record {}: {err}, discarding local remote scripts",
                    self.paths.config.display()
                );
                self.reset_local();
                return Ok(0);
            }
            Err(err) => {
                tracing::error!("failed to read {}: {err}", self.paths.config.display());
                return Err(err);
            }
        };

        if !record.matches_site(site_url) {
            tracing::info!("site changed since last sync, discarding local remote scripts");
            self.reset_local();
            return Ok(0);
        }

        if is_first {
            self.restore_local();
            return Ok(0);
        }

        Ok(record.update_time)
    }

    /// Drop every synced file including the record. Failures are logged only.
    fn reset_local(&self) {
        match self.remote.read_dir(&self.paths.dir) {
            Ok(entries) => {
                for path in entries.iter().filter(|p| **p != self.paths.relation) {
                    if let Err(err) = self.remote.remove(path) {
                        tracing::warn!("failed to remove {}: {err}", path.display());
                    }
                }
            }
            Err(err) => tracing::warn!("failed to list {}: {err}", self.paths.dir.display()),
        }
    }

    /// Load the last synced archive and relation dump into the manager.
    fn restore_local(&self) {
        match self.remote.read_archive(&self.paths.archive) {
            Ok(files) => match content::split_content_map(files) {
                Ok((scripts, defaults)) => {
                    self.load_remote_namespace(&scripts);
                    self.push_defaults(defaults.as_ref());
                    tracing::info!("restored remote scripts from {}", self.paths.archive.display());
                }
                Err(err) => tracing::warn!("ignoring local archive defaults: {err}"),
            },
            Err(err) => tracing::warn!(
                "could not restore {}: {err}",
                self.paths.archive.display()
            ),
        }

        match relation_dump::load(&self.remote, &self.paths.relation) {
            Ok(Some(relation)) => self.manager.update_relation(0, relation),
            Ok(None) => {}
            Err(err) => tracing::warn!(
                "could not restore {}: {err}",
                self.paths.relation.display()
            ),
        }
    }

    fn apply_relation(&self, snapshot: &RemoteSnapshot) -> Option<i64> {
        let RelationUpdate::Replace(updated_at) = snapshot.relation_update() else {
            return None;
        };
        self.manager
            .update_relation(updated_at, snapshot.relation_by_category.clone());
        if let Err(err) = relation_dump::dump(
            &self.remote,
            &self.paths.relation,
            &snapshot.relation_by_category,
        ) {
            tracing::error!("failed to dump relation to {}: {err}", self.paths.relation.display());
        }
        Some(updated_at)
    }

    fn delete_all(&self) -> Result<(), SyncError> {
        tracing::info!("control point requested removal of all remote scripts");
        self.manager
            .load_scripts(Namespace::Remote, &ScriptsByCategory::new(), &self.load_options());
        self.manager.update_default_script(None);
        self.remove_synced_files()
    }

    fn apply_scripts(
        &self,
        site_url: &str,
        updated_at: i64,
        snapshot: RemoteSnapshot,
    ) -> Result<usize, SyncError> {
        let defaults = snapshot.default_script_by_category.as_ref();

        self.remove_synced_files()?;
        let files = content::convert_three_map_to_content_map(&snapshot.scripts_by_category, defaults)?;
        self.remote
            .write_archive(&files, &self.paths.archive)
            .map_err(|err| {
                tracing::error!("failed to write {}: {err}", self.paths.archive.display());
                err
            })?;

        let failed = self.load_remote_namespace(&snapshot.scripts_by_category);
        self.push_defaults(defaults);

        config_store::save(&self.remote, &self.paths.config, site_url, updated_at).map_err(|err| {
            tracing::error!("failed to persist {}: {err}", self.paths.config.display());
            err
        })?;

        tracing::info!(
            "applied remote scripts updated_at={updated_at} ({} entries, {failed} failed)",
            files.len(),
        );
        Ok(failed)
    }

    fn load_remote_namespace(&self, scripts: &ScriptsByCategory) -> usize {
        self.manager
            .load_scripts(Namespace::Remote, scripts, &self.load_options())
            .len()
    }

    fn push_defaults(&self, remote: Option<&DefaultScripts>) {
        self.manager
            .update_default_script(content::merge_defaults(remote, &self.local_defaults));
    }

    fn load_options(&self) -> LoadOptions {
        LoadOptions {
            origin_dir: Some(self.paths.dir.clone()),
        }
    }

    /// Remove synced content, keeping the record and the relation dump.
    /// A listing failure aborts; individual removal failures are logged.
    fn remove_synced_files(&self) -> Result<(), SyncError> {
        let entries = self.remote.read_dir(&self.paths.dir).map_err(|err| {
            tracing::error!("failed to list {}: {err}", self.paths.dir.display());
            err
        })?;
        for path in entries.iter().filter(|p| !self.paths.is_preserved(p)) {
            if let Err(err) = self.remote.remove(path) {
                tracing::warn!("failed to remove {}: {err}", path.display());
            }
        }
        Ok(())
    }
}
