//! plsync core library: domain types, agent configuration, errors.
//!
//! - [`types`]: categories, namespaces, snapshot maps and timestamp sentinels
//! - [`config`]: the YAML agent configuration consumed by the sync daemon
//! - [`error`]: [`ConfigError`]

pub mod config;
pub mod error;
pub mod types;

pub use config::{first_site_url, SyncConfig};
pub use error::ConfigError;
pub use types::{
    Category, DefaultScripts, Namespace, RelationByCategory, RelationUpdate, RemoteSnapshot,
    ScriptSet, ScriptsByCategory, ScriptsUpdate, DELETE_ALL_SENTINEL, NO_RELATION_UPDATE,
};
