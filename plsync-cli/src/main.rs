//! plsync: remote pipeline script sync.
//!
//! # Usage
//!
//! ```text
//! plsync run [--site-url <url>]... [--interval <duration>]
//! plsync status [--json]
//! plsync show <category> <name>
//! plsync config [--site-url <url>]... [--interval <duration>]
//!
//! global: [--install-dir <path>] [--config <file>]
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{config::ConfigCmdArgs, run::RunArgs, show::ShowArgs, status::StatusArgs, ConfigArgs};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "plsync",
    version,
    about = "Pull pipeline scripts from a control point and keep them in sync",
    long_about = None,
)]
struct Cli {
    #[command(flatten)]
    config: ConfigArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the sync loop in the foreground until Ctrl-C.
    Run(RunArgs),

    /// Show what is currently synced on disk.
    Status(StatusArgs),

    /// Print one synced script.
    Show(ShowArgs),

    /// Print the effective configuration as YAML.
    Config(ConfigCmdArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Run(args) => args.run(&cli.config),
        Commands::Status(args) => args.run(&cli.config),
        Commands::Show(args) => args.run(&cli.config),
        Commands::Config(args) => args.run(&cli.config),
    }
}
