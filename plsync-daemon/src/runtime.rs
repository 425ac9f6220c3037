use std::sync::Arc;

use plsync_core::SyncConfig;
use plsync_sync::{ScriptManager, ScriptStore};

use crate::error::{io_err, DaemonError};
use crate::scheduler::{HttpConnector, Scheduler, SchedulerOptions, StartOutcome};

/// Start the sync runtime and block the current thread until it exits.
pub fn run_blocking(config: SyncConfig) -> Result<StartOutcome, DaemonError> {
    init_tracing();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    let manager: Arc<dyn ScriptManager> = Arc::new(ScriptStore::new());
    runtime.block_on(run(config, manager))
}

/// Start the scheduler and keep it polling until Ctrl-C or until the loop
/// ends on its own.
pub async fn run(
    config: SyncConfig,
    manager: Arc<dyn ScriptManager>,
) -> Result<StartOutcome, DaemonError> {
    let options = SchedulerOptions::from_config(&config)?;
    let scheduler = Scheduler::new(HttpConnector, manager, options);

    let outcome = scheduler.start(&config.site_urls).await;
    if !matches!(outcome, StartOutcome::Polling { .. }) {
        return Ok(outcome);
    }

    let stopped = scheduler.wait();
    tokio::pin!(stopped);
    tokio::select! {
        result = &mut stopped => return result.map(|()| outcome),
        signal = tokio::signal::ctrl_c() => {
            match signal {
                Ok(()) => tracing::info!("received ctrl-c, shutting down remote pipeline sync"),
                Err(err) => {
                    scheduler.shutdown();
                    return Err(DaemonError::Runtime(format!("ctrl-c handler failed: {err}")));
                }
            }
        }
    }

    scheduler.shutdown();
    stopped.await?;
    Ok(outcome)
}

pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn run_without_site_url_returns_immediately() {
        let tmp = TempDir::new().expect("tmp");
        let config = SyncConfig {
            install_dir: Some(tmp.path().to_path_buf()),
            ..SyncConfig::default()
        };
        let manager: Arc<dyn ScriptManager> = Arc::new(ScriptStore::new());

        let outcome = run(config, manager).await.expect("run");
        assert_eq!(outcome, StartOutcome::NoSiteUrl);
        assert!(!tmp.path().join("pipeline_remote").exists());
    }

    #[tokio::test]
    async fn run_with_bad_site_url_reports_failure() {
        let tmp = TempDir::new().expect("tmp");
        let config = SyncConfig {
            install_dir: Some(tmp.path().to_path_buf()),
            site_urls: vec!["not a url".to_string()],
            ..SyncConfig::default()
        };
        let manager: Arc<dyn ScriptManager> = Arc::new(ScriptStore::new());

        let outcome = run(config, manager).await.expect("run");
        assert!(matches!(outcome, StartOutcome::Failed { .. }));
    }
}
