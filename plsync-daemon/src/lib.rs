//! Sync runtime: HTTP puller + scheduler around the plsync reconciler.

mod error;
pub mod http;
mod runtime;
pub mod scheduler;

pub use error::DaemonError;
pub use http::{HttpPuller, SiteUrl};
pub use runtime::{init_tracing, run, run_blocking};
pub use scheduler::{
    jittered, CycleSummary, HttpConnector, PullInterval, RemoteConnector, Scheduler,
    SchedulerOptions, SchedulerState, StartOutcome, SyncStatus,
};
