//! `plsync run`: pull now, then keep polling until Ctrl-C.

use anyhow::{bail, Context, Result};
use clap::Args;

use plsync_daemon::{run_blocking, CycleSummary, StartOutcome};

use super::{display_site, ConfigArgs, SyncOverrides};

/// Arguments for `plsync run`.
#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub overrides: SyncOverrides,
}

impl RunArgs {
    pub fn run(self, config_args: &ConfigArgs) -> Result<()> {
        let mut config = config_args.load()?;
        self.overrides.apply(&mut config);
        let site = config.site_url().map(display_site);

        match run_blocking(config).context("sync runtime exited with error")? {
            StartOutcome::NoSiteUrl => {
                println!("No site URL configured; pass --site-url or set site_urls in plsync.yaml.");
            }
            StartOutcome::Failed { error } => bail!("remote pipeline sync could not start: {error}"),
            StartOutcome::OneShot { first } => {
                if let Some(error) = &first.error {
                    bail!("one-shot pull failed: {error}");
                }
                println!("✓ {}: {}", site.unwrap_or_default(), describe(&first));
            }
            StartOutcome::Polling { first } => {
                println!(
                    "✓ {}: stopped (first pull: {})",
                    site.unwrap_or_default(),
                    describe(&first)
                );
            }
        }
        Ok(())
    }
}

fn describe(cycle: &CycleSummary) -> String {
    match &cycle.error {
        Some(error) => format!("failed: {error}"),
        None => format!("{} in {}ms", cycle.outcome, cycle.duration_ms),
    }
}
