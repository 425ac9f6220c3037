//! Relation dump: on-disk mirror of the relation table.
//!
//! `<remote_dir>/relation.json` holds `{"relation": {"<category>": {"<entity>": "<script>"}}}`.
//! A failed dump is logged by the caller and never aborts a cycle.

use std::path::Path;

use serde::{Deserialize, Serialize};

use plsync_core::RelationByCategory;

use crate::error::{io_err, SyncError};
use crate::remote::PipelineRemote;

pub const RELATION_DUMP_FILE: &str = "relation.json";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RelationDumpFile {
    #[serde(default)]
    pub relation: RelationByCategory,
}

/// Serialize `relation` to `path` through `remote`.
pub fn dump<R>(remote: &R, path: &Path, relation: &RelationByCategory) -> Result<(), SyncError>
where
    R: PipelineRemote + ?Sized,
{
    let json = serde_json::to_vec(&RelationDumpFileRef { relation })?;
    remote.write_file(path, &json)
}

/// Read a previous dump through `remote`. Returns `None` if absent.
pub fn load<R>(remote: &R, path: &Path) -> Result<Option<RelationByCategory>, SyncError>
where
    R: PipelineRemote + ?Sized,
{
    if !remote.file_exists(path) {
        return Ok(None);
    }
    let bytes = remote.read_file(path)?;
    let file: RelationDumpFile = serde_json::from_slice(&bytes)?;
    Ok(Some(file.relation))
}

/// Read a previous dump straight from disk.
pub fn load_at(path: &Path) -> Result<Option<RelationByCategory>, SyncError> {
    if !path.exists() {
        return Ok(None);
    }
    let bytes = std::fs::read(path).map_err(|e| io_err(path, e))?;
    let file: RelationDumpFile = serde_json::from_slice(&bytes)?;
    Ok(Some(file.relation))
}

#[derive(Serialize)]
struct RelationDumpFileRef<'a> {
    relation: &'a RelationByCategory,
}
