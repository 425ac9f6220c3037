//! # plsync-sync
//!
//! Pulls remote pipeline scripts and applies them to a script manager.
//!
//! Build a [`Reconciler`] over a [`PipelineRemote`] and call
//! [`Reconciler::run_cycle`] once per tick. The scheduler lives in
//! `plsync-daemon`; everything here is synchronous.

pub mod codec;
pub mod config_store;
pub mod content;
pub mod error;
pub mod manager;
pub mod reconciler;
pub mod relation_dump;
pub mod remote;

pub use config_store::{PullConfig, PULL_CONFIG_FILE};
pub use error::SyncError;
pub use manager::{LoadFailures, LoadOptions, Script, ScriptManager, ScriptStore};
pub use reconciler::{CycleReport, Reconciler, RemotePaths, ScriptsOutcome, ARCHIVE_FILE};
pub use relation_dump::RELATION_DUMP_FILE;
pub use remote::{LocalRemote, PipelineRemote, Puller};
