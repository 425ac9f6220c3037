//! `plsync show`: print one script from the synced archive.

use anyhow::{bail, Context, Result};
use clap::Args;

use plsync_core::Category;
use plsync_sync::{codec, RemotePaths};

use super::ConfigArgs;

/// Arguments for `plsync show`.
#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Script category, e.g. `logging`.
    pub category: String,

    /// Script name, e.g. `nginx.p`.
    pub name: String,
}

impl ShowArgs {
    pub fn run(self, config_args: &ConfigArgs) -> Result<()> {
        let config = config_args.load()?;
        let paths = RemotePaths::new(
            config
                .remote_dir()
                .context("could not determine home directory")?,
        );
        if !paths.archive.exists() {
            bail!("nothing synced yet ({} missing)", paths.archive.display());
        }

        let files = codec::read_tar_to_map(&paths.archive)
            .with_context(|| format!("failed to read {}", paths.archive.display()))?;

        // Archives keep the category string the control point sent; also try
        // the canonical spelling so the `metrics` alias finds `metric/...`.
        let mut candidates = vec![format!("{}/{}", self.category, self.name)];
        if let Ok(category) = self.category.parse::<Category>() {
            candidates.push(format!("{}/{}", category.as_str(), self.name));
        }

        match candidates.iter().find_map(|key| files.get(key)) {
            Some(script) => {
                print!("{script}");
                if !script.ends_with('\n') {
                    println!();
                }
                Ok(())
            }
            None => bail!("script '{}' not found in category '{}'", self.name, self.category),
        }
    }
}
