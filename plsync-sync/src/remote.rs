//! Capability seam between the reconciler and the outside world.
//!
//! [`Puller`] asks the control point for what changed; [`PipelineRemote`]
//! adds the disk operations the reconciler needs. [`LocalRemote`] is the
//! production implementation over `std::fs` and the content codec; tests
//! substitute an in-memory fake.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use plsync_core::RemoteSnapshot;

use crate::codec;
use crate::error::{io_err, SyncError};

/// Fetch the scripts and relations that changed since the given timestamps.
///
/// Implementations must not touch the caller's local state.
pub trait Puller: Send + Sync {
    fn pull(&self, scripts_since: i64, relation_since: i64) -> Result<RemoteSnapshot, SyncError>;
}

/// Everything the reconciler does against the control point and the disk.
pub trait PipelineRemote: Puller {
    fn file_exists(&self, path: &Path) -> bool;
    fn read_file(&self, path: &Path) -> Result<Vec<u8>, SyncError>;
    fn write_file(&self, path: &Path, data: &[u8]) -> Result<(), SyncError>;
    /// Entries of `dir`; a missing directory has no entries.
    fn read_dir(&self, dir: &Path) -> Result<Vec<PathBuf>, SyncError>;
    fn remove(&self, path: &Path) -> Result<(), SyncError>;
    fn read_archive(&self, path: &Path) -> Result<HashMap<String, String>, SyncError>;
    fn write_archive(&self, files: &HashMap<String, String>, path: &Path) -> Result<(), SyncError>;
}

/// [`PipelineRemote`] over the real filesystem, pulling through `P`.
#[derive(Debug, Clone)]
pub struct LocalRemote<P> {
    puller: P,
}

impl<P: Puller> LocalRemote<P> {
    pub fn new(puller: P) -> Self {
        Self { puller }
    }
}

impl<P: Puller> Puller for LocalRemote<P> {
    fn pull(&self, scripts_since: i64, relation_since: i64) -> Result<RemoteSnapshot, SyncError> {
        self.puller.pull(scripts_since, relation_since)
    }
}

impl<P: Puller> PipelineRemote for LocalRemote<P> {
    fn file_exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn read_file(&self, path: &Path) -> Result<Vec<u8>, SyncError> {
        std::fs::read(path).map_err(|e| io_err(path, e))
    }

    /// Writes `<path>.tmp` then renames over `path`.
    fn write_file(&self, path: &Path, data: &[u8]) -> Result<(), SyncError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
        }
        let tmp = PathBuf::from(format!("{}.tmp", path.display()));
        std::fs::write(&tmp, data).map_err(|e| io_err(&tmp, e))?;
        if let Err(e) = std::fs::rename(&tmp, path) {
            let _ = std::fs::remove_file(&tmp);
            return Err(io_err(path, e));
        }
        Ok(())
    }

    fn read_dir(&self, dir: &Path) -> Result<Vec<PathBuf>, SyncError> {
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(io_err(dir, err)),
        };
        let mut out = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| io_err(dir, e))?;
            out.push(entry.path());
        }
        out.sort();
        Ok(out)
    }

    fn remove(&self, path: &Path) -> Result<(), SyncError> {
        let result = if path.is_dir() {
            std::fs::remove_dir_all(path)
        } else {
            std::fs::remove_file(path)
        };
        match result {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(io_err(path, err)),
        }
    }

    fn read_archive(&self, path: &Path) -> Result<HashMap<String, String>, SyncError> {
        codec::read_tar_to_map(path)
    }

    fn write_archive(&self, files: &HashMap<String, String>, path: &Path) -> Result<(), SyncError> {
        codec::write_tar_from_map(files, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    struct NeverPull;

    impl Puller for NeverPull {
        fn pull(&self, _: i64, _: i64) -> Result<RemoteSnapshot, SyncError> {
            Err(SyncError::Pull("offline".to_string()))
        }
    }

    #[test]
    fn read_dir_of_missing_directory_is_empty() {
        let tmp = TempDir::new().unwrap();
        let remote = LocalRemote::new(NeverPull);
        assert!(remote.read_dir(&tmp.path().join("absent")).unwrap().is_empty());
    }

    #[test]
    fn write_file_creates_parents_and_leaves_no_tmp() {
        let tmp = TempDir::new().unwrap();
        let remote = LocalRemote::new(NeverPull);
        let path = tmp.path().join("pipeline_remote").join("pull_config.json");

        remote.write_file(&path, b"{}").unwrap();
        assert_eq!(remote.read_file(&path).unwrap(), b"{}");
        assert_eq!(remote.read_dir(path.parent().unwrap()).unwrap(), vec![path.clone()]);
    }

    #[test]
    fn remove_handles_files_dirs_and_missing_paths() {
        let tmp = TempDir::new().unwrap();
        let remote = LocalRemote::new(NeverPull);
        let file = tmp.path().join("a.txt");
        let dir = tmp.path().join("nested");
        std::fs::write(&file, "x").unwrap();
        std::fs::create_dir_all(dir.join("deeper")).unwrap();

        remote.remove(&file).unwrap();
        remote.remove(&dir).unwrap();
        remote.remove(&tmp.path().join("never-existed")).unwrap();
        assert!(remote.read_dir(tmp.path()).unwrap().is_empty());
    }

    #[test]
    fn pull_delegates_to_inner_puller() {
        let remote = LocalRemote::new(NeverPull);
        assert!(matches!(remote.pull(0, 0), Err(SyncError::Pull(_))));
    }
}
