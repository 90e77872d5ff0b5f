// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! bak - incremental backups for developer machines

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod client;
mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "bak",
    version,
    about = "Versioned, hard-link deduplicated backups of your projects"
)]
struct Cli {
    /// Path to the configuration file
    #[arg(long = "config", global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a backup now
    Backup,
    /// List committed snapshots
    List,
    /// Compare a snapshot against the live sources
    Diff {
        /// Snapshot name (defaults to the newest)
        snapshot: Option<String>,
        /// Restrict to one snapshot-relative subtree
        #[arg(long)]
        path: Option<PathBuf>,
    },
    /// Find files in snapshots by glob pattern
    Search {
        pattern: String,
        /// Search a single snapshot instead of all
        #[arg(long)]
        snapshot: Option<String>,
    },
    /// Restore a file or directory from a snapshot
    Restore {
        snapshot: String,
        /// Path relative to the snapshot root
        path: String,
        /// Exact target path (default: ~/Desktop/Recovered Files)
        #[arg(long)]
        to: Option<PathBuf>,
    },
    /// Verify snapshot integrity against its manifest
    Verify {
        /// Snapshot name (defaults to the newest)
        snapshot: Option<String>,
        /// Only verify entries matching this glob
        #[arg(long)]
        pattern: Option<String>,
    },
    /// Show backup status (from the daemon when it is running)
    Status,
    /// Ask the daemon to run a backup
    Trigger,
    /// Print the path to browse backups
    Browse,
    /// Discover projects and candidate destinations
    Discover {
        /// Only list projects
        #[arg(long, conflicts_with = "destinations")]
        projects: bool,
        /// Only list destinations
        #[arg(long)]
        destinations: bool,
    },
    /// Generate a configuration from discovered projects
    Init {
        /// Workspace scanned first and listed first
        #[arg(long)]
        workspace: Option<PathBuf>,
        /// Destination override (skips destination discovery)
        #[arg(long)]
        destination: Option<PathBuf>,
        /// Overwrite an existing configuration
        #[arg(long)]
        force: bool,
    },
    /// Manage the background daemon
    Daemon {
        #[command(subcommand)]
        action: commands::daemon::DaemonAction,
    },
}

fn main() {
    setup_logging();

    let cli = Cli::parse();

    // `bak backup` owns the exit-code contract; everything else is 0/1
    if let Commands::Backup = cli.command {
        commands::backup::run(cli.config.as_deref());
    }

    let result: Result<()> = match cli.command {
        Commands::Backup => unreachable!("handled above"),
        Commands::List => commands::snapshot::list(cli.config.as_deref()),
        Commands::Diff { snapshot, path } => {
            commands::snapshot::diff(cli.config.as_deref(), snapshot.as_deref(), path.as_deref())
        }
        Commands::Search { pattern, snapshot } => {
            commands::snapshot::search(cli.config.as_deref(), &pattern, snapshot.as_deref())
        }
        Commands::Restore { snapshot, path, to } => {
            commands::snapshot::restore(cli.config.as_deref(), &snapshot, &path, to.as_deref())
        }
        Commands::Verify { snapshot, pattern } => {
            commands::snapshot::verify(cli.config.as_deref(), snapshot.as_deref(), pattern.as_deref())
        }
        Commands::Status => commands::status::status(cli.config.as_deref()),
        Commands::Trigger => commands::status::trigger(),
        Commands::Browse => commands::status::browse(),
        Commands::Discover {
            projects,
            destinations,
        } => commands::discover::run(projects, destinations),
        Commands::Init {
            workspace,
            destination,
            force,
        } => commands::init::run(
            cli.config.as_deref(),
            workspace.as_deref(),
            destination.as_deref(),
            force,
        ),
        Commands::Daemon { action } => commands::daemon::run(action),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

fn setup_logging() {
    use tracing_subscriber::EnvFilter;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
