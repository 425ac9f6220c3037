//! `plsync status`: what the last sync left on disk.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use plsync_sync::{codec, config_store, content, relation_dump, RemotePaths};

use super::{display_site, ConfigArgs};

/// Arguments for `plsync status`.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl StatusArgs {
    pub fn run(self, config_args: &ConfigArgs) -> Result<()> {
        let config = config_args.load()?;
        let remote_dir = config
            .remote_dir()
            .context("could not determine home directory")?;

        let report = build_report(&remote_dir)?;
        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("failed to serialize status JSON")?
            );
            return Ok(());
        }

        print_table(&report);
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct StatusReport {
    remote_dir: PathBuf,
    site: Option<String>,
    update_time: Option<i64>,
    categories: Vec<CategoryStatus>,
}

#[derive(Debug, Default, Serialize)]
struct CategoryStatus {
    category: String,
    scripts: usize,
    default: Option<String>,
    relations: usize,
}

#[derive(Tabled)]
struct CategoryRow {
    #[tabled(rename = "category")]
    category: String,
    #[tabled(rename = "scripts")]
    scripts: usize,
    #[tabled(rename = "default")]
    default: String,
    #[tabled(rename = "relations")]
    relations: usize,
}

fn build_report(remote_dir: &Path) -> Result<StatusReport> {
    let paths = RemotePaths::new(remote_dir);

    let record = config_store::load_at(&paths.config)
        .with_context(|| format!("failed to read {}", paths.config.display()))?;

    let (scripts, defaults) = if paths.archive.exists() {
        let files = codec::read_tar_to_map(&paths.archive)
            .with_context(|| format!("failed to read {}", paths.archive.display()))?;
        content::split_content_map(files)
            .with_context(|| format!("bad default map in {}", paths.archive.display()))?
    } else {
        Default::default()
    };

    let relation = relation_dump::load_at(&paths.relation)
        .with_context(|| format!("failed to read {}", paths.relation.display()))?
        .unwrap_or_default();

    let mut by_category = BTreeMap::<String, CategoryStatus>::new();
    for (category, set) in &scripts {
        by_category.entry(category.clone()).or_default().scripts = set.len();
    }
    for (category, name) in defaults.iter().flatten() {
        by_category.entry(category.clone()).or_default().default = Some(name.clone());
    }
    for (category, entities) in &relation {
        by_category.entry(category.clone()).or_default().relations = entities.len();
    }

    Ok(StatusReport {
        remote_dir: remote_dir.to_path_buf(),
        site: record.as_ref().map(|r| display_site(&r.site_url)),
        update_time: record.map(|r| r.update_time),
        categories: by_category
            .into_iter()
            .map(|(category, status)| CategoryStatus { category, ..status })
            .collect(),
    })
}

fn print_table(report: &StatusReport) {
    match (&report.site, report.update_time) {
        (Some(site), Some(update_time)) => println!(
            "plsync v{} | {} | updated_at {}",
            env!("CARGO_PKG_VERSION"),
            site.bold(),
            update_time
        ),
        _ => println!(
            "plsync v{} | {}",
            env!("CARGO_PKG_VERSION"),
            "never synced".bright_black()
        ),
    }
    println!("remote dir: {}", report.remote_dir.display());

    if report.categories.is_empty() {
        println!("No remote scripts on disk.");
        return;
    }

    let rows: Vec<CategoryRow> = report
        .categories
        .iter()
        .map(|c| CategoryRow {
            category: c.category.clone(),
            scripts: c.scripts,
            default: c.default.clone().unwrap_or_else(|| "-".to_string()),
            relations: c.relations,
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
}
