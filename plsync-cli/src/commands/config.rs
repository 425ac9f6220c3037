//! `plsync config`: print the effective configuration.

use anyhow::{Context, Result};
use clap::Args;

use super::{ConfigArgs, SyncOverrides};

/// Arguments for `plsync config`.
#[derive(Args, Debug)]
pub struct ConfigCmdArgs {
    #[command(flatten)]
    pub overrides: SyncOverrides,
}

impl ConfigCmdArgs {
    pub fn run(self, config_args: &ConfigArgs) -> Result<()> {
        let mut config = config_args.load()?;
        self.overrides.apply(&mut config);
        if config.install_dir.is_none() {
            config.install_dir = Some(
                config
                    .install_dir()
                    .context("could not determine home directory")?,
            );
        }
        print!("{}", config.to_yaml().context("failed to render config")?);
        Ok(())
    }
}
