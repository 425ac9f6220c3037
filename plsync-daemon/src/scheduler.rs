//! Scheduler: one synchronous first pull, then poll until shutdown.
//!
//! ```text
//! NotStarted ──start()──▶ Running ──shutdown / one-shot──▶ Stopped
//! ```
//!
//! `start` is single-flight: every caller awaits the same initialisation and
//! gets the same [`StartOutcome`]. Cycles run on the blocking pool because the
//! reconciler does blocking file and HTTP I/O; within one scheduler they are
//! strictly sequential.

use std::path::PathBuf;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::Serialize;
use tokio::sync::{broadcast, Mutex, OnceCell, RwLock};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use plsync_core::{first_site_url, DefaultScripts, SyncConfig};
use plsync_sync::{LocalRemote, PipelineRemote, Reconciler, ScriptManager};

use crate::error::DaemonError;
use crate::http::HttpPuller;

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(60);

type SharedReconciler<R> = Arc<StdMutex<Reconciler<R>>>;

// ---------------------------------------------------------------------------
// Interval
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PullInterval {
    /// Pull once at start and stop.
    OneShot,
    Every(Duration),
}

impl PullInterval {
    /// Humantime syntax. Zero means one-shot; anything unparsable falls back
    /// to [`DEFAULT_INTERVAL`].
    pub fn parse(raw: &str) -> Self {
        match humantime::parse_duration(raw.trim()) {
            Ok(d) if d.is_zero() => PullInterval::OneShot,
            Ok(d) => PullInterval::Every(d),
            Err(err) => {
                tracing::warn!(interval = raw, error = %err, "invalid pull interval, using default");
                PullInterval::Every(DEFAULT_INTERVAL)
            }
        }
    }
}

/// `interval` plus a uniform random extra in `[0, interval * percent / 100]`.
pub fn jittered(interval: Duration, jitter_percent: u8) -> Duration {
    let interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
    let max_extra = interval_ms.saturating_mul(u64::from(jitter_percent.min(100))) / 100;
    if max_extra == 0 {
        return interval;
    }
    interval + Duration::from_millis(rand::rng().random_range(0..=max_extra))
}

// ---------------------------------------------------------------------------
// Options, status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct SchedulerOptions {
    pub remote_dir: PathBuf,
    pub interval: PullInterval,
    pub jitter_percent: u8,
    pub local_defaults: DefaultScripts,
}

impl SchedulerOptions {
    pub fn from_config(config: &SyncConfig) -> Result<Self, DaemonError> {
        Ok(Self {
            remote_dir: config.remote_dir()?,
            interval: PullInterval::parse(&config.pull_interval),
            jitter_percent: config.jitter_percent(),
            local_defaults: config.default_pipeline.clone(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerState {
    NotStarted,
    Running,
    Stopped,
}

/// Result of one cycle as seen by the scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CycleSummary {
    /// `applied`, `unchanged`, `deleted` or `failed`.
    pub outcome: String,
    pub error: Option<String>,
    pub duration_ms: u128,
}

impl CycleSummary {
    pub fn failed(&self) -> bool {
        self.error.is_some()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncStatus {
    pub state: SchedulerState,
    pub cycles: u64,
    pub failures: u64,
    pub last: Option<CycleSummary>,
    pub last_cycle_at: Option<DateTime<Utc>>,
}

impl Default for SyncStatus {
    fn default() -> Self {
        Self {
            state: SchedulerState::NotStarted,
            cycles: 0,
            failures: 0,
            last: None,
            last_cycle_at: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum StartOutcome {
    /// No usable site URL; nothing was pulled.
    NoSiteUrl,
    /// The remote could not be set up; nothing was pulled.
    Failed { error: String },
    /// One pull done, no loop.
    OneShot { first: CycleSummary },
    /// First pull done, loop running in the background.
    Polling { first: CycleSummary },
}

// ---------------------------------------------------------------------------
// Connector
// ---------------------------------------------------------------------------

/// Builds the remote a scheduler reconciles against for one site URL.
pub trait RemoteConnector: Send + Sync + 'static {
    type Remote: PipelineRemote + 'static;

    fn connect(&self, site_url: &str) -> Result<Self::Remote, DaemonError>;
}

/// Production connector: local disk plus HTTP pulls.
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpConnector;

impl RemoteConnector for HttpConnector {
    type Remote = LocalRemote<HttpPuller>;

    fn connect(&self, site_url: &str) -> Result<Self::Remote, DaemonError> {
        Ok(LocalRemote::new(HttpPuller::new(site_url)?))
    }
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

pub struct Scheduler<C: RemoteConnector> {
    connector: C,
    manager: Arc<dyn ScriptManager>,
    options: SchedulerOptions,
    started: OnceCell<StartOutcome>,
    status: Arc<RwLock<SyncStatus>>,
    shutdown_tx: broadcast::Sender<()>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl<C: RemoteConnector> Scheduler<C> {
    pub fn new(connector: C, manager: Arc<dyn ScriptManager>, options: SchedulerOptions) -> Self {
        let (shutdown_tx, _) = broadcast::channel::<()>(4);
        Self {
            connector,
            manager,
            options,
            started: OnceCell::new(),
            status: Arc::new(RwLock::new(SyncStatus::default())),
            shutdown_tx,
            task: Mutex::new(None),
        }
    }

    /// Start syncing against the first non-blank URL in `site_urls`.
    ///
    /// Returns once the first pull has finished. Later and concurrent calls
    /// return the outcome of the first one without pulling again.
    pub async fn start(&self, site_urls: &[String]) -> StartOutcome {
        self.started
            .get_or_init(|| self.start_once(site_urls))
            .await
            .clone()
    }

    async fn start_once(&self, site_urls: &[String]) -> StartOutcome {
        let Some(site_url) = first_site_url(site_urls).map(str::to_string) else {
            tracing::info!("no site URL configured, remote pipeline sync disabled");
            return StartOutcome::NoSiteUrl;
        };

        let remote = match self.connector.connect(&site_url) {
            Ok(remote) => remote,
            Err(err) => {
                tracing::error!(error = %err, "cannot start remote pipeline sync");
                self.status.write().await.state = SchedulerState::Stopped;
                return StartOutcome::Failed {
                    error: err.to_string(),
                };
            }
        };

        let shutdown_rx = self.shutdown_tx.subscribe();
        let reconciler = Reconciler::new(
            remote,
            Arc::clone(&self.manager),
            self.options.remote_dir.clone(),
        )
        .with_local_defaults(self.options.local_defaults.clone());

        self.status.write().await.state = SchedulerState::Running;
        tracing::info!(remote_dir = %self.options.remote_dir.display(), "remote pipeline sync starting");

        let reconciler = Arc::new(StdMutex::new(reconciler));
        let first = run_cycle(&reconciler, &site_url, &self.status).await;

        match self.options.interval {
            PullInterval::OneShot => {
                self.status.write().await.state = SchedulerState::Stopped;
                tracing::info!("one-shot remote pipeline pull finished");
                StartOutcome::OneShot { first }
            }
            PullInterval::Every(interval) => {
                let handle = tokio::spawn(poll_loop(
                    reconciler,
                    site_url,
                    interval,
                    self.options.jitter_percent,
                    Arc::clone(&self.status),
                    shutdown_rx,
                ));
                *self.task.lock().await = Some(handle);
                StartOutcome::Polling { first }
            }
        }
    }

    pub async fn status(&self) -> SyncStatus {
        self.status.read().await.clone()
    }

    /// Ask the poll loop to exit after the cycle in flight, if any.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Wait for the poll loop to exit. Returns at once when none is running.
    pub async fn wait(&self) -> Result<(), DaemonError> {
        let handle = self.task.lock().await.take();
        match handle {
            Some(handle) => handle
                .await
                .map_err(|err| DaemonError::Runtime(format!("poll loop join failure: {err}"))),
            None => Ok(()),
        }
    }
}

async fn poll_loop<R: PipelineRemote + 'static>(
    reconciler: SharedReconciler<R>,
    site_url: String,
    interval: Duration,
    jitter_percent: u8,
    status: Arc<RwLock<SyncStatus>>,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    loop {
        let wait = jittered(interval, jitter_percent);
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            _ = tokio::time::sleep(wait) => {}
        }
        run_cycle(&reconciler, &site_url, &status).await;
    }

    status.write().await.state = SchedulerState::Stopped;
    tracing::info!("remote pipeline sync stopped");
}

/// Run one cycle on the blocking pool and record it in `status`.
///
/// A cycle that panics is recorded as a failure; the reconciler stays usable
/// for the next tick.
async fn run_cycle<R: PipelineRemote + 'static>(
    reconciler: &SharedReconciler<R>,
    site_url: &str,
    status: &RwLock<SyncStatus>,
) -> CycleSummary {
    let started = Instant::now();
    let site_url = site_url.to_string();
    let shared = Arc::clone(reconciler);
    let joined = tokio::task::spawn_blocking(move || {
        let mut reconciler = shared.lock().unwrap_or_else(PoisonError::into_inner);
        reconciler.run_cycle(&site_url)
    })
    .await;

    let duration_ms = started.elapsed().as_millis();
    let summary = match joined {
        Ok(Ok(report)) => {
            tracing::debug!(
                outcome = report.label(),
                relation_updated_at = ?report.relation_updated_at,
                duration_ms = duration_ms as u64,
                "remote pipeline cycle finished"
            );
            CycleSummary {
                outcome: report.label().to_string(),
                error: None,
                duration_ms,
            }
        }
        Ok(Err(err)) => {
            tracing::warn!(error = %err, "remote pipeline cycle failed, retrying next tick");
            CycleSummary {
                outcome: "failed".to_string(),
                error: Some(err.to_string()),
                duration_ms,
            }
        }
        Err(err) => {
            tracing::error!(error = %err, "remote pipeline cycle panicked, retrying next tick");
            CycleSummary {
                outcome: "failed".to_string(),
                error: Some(format!("sync cycle aborted: {err}")),
                duration_ms,
            }
        }
    };

    let mut guard = status.write().await;
    guard.cycles += 1;
    if summary.failed() {
        guard.failures += 1;
    }
    guard.last = Some(summary.clone());
    guard.last_cycle_at = Some(Utc::now());
    drop(guard);

    summary
}
