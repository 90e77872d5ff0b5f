// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! One-shot backup run with the documented exit codes.

use crate::output::human_bytes;
use bak_core::Config;
use bak_daemon::lifecycle::DaemonConfig;
use bak_engine::{run_backup, LogNotifier, RunError, RunOptions};
use std::path::Path;

/// Run a backup and exit: 0 success, 1 config, 2 lock, 3 destination,
/// 4 snapshot, 5 space. Signal exits (`128+signo`) come from the
/// engine's signal handler.
pub fn run(config_flag: Option<&Path>) -> ! {
    let code = match try_run(config_flag) {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("error: {e}");
            e.exit_code()
        }
    };
    std::process::exit(code);
}

fn try_run(config_flag: Option<&Path>) -> Result<(), RunError> {
    let path = match config_flag {
        Some(path) => path.to_path_buf(),
        None => Config::default_path()?,
    };
    let config = Config::load(&path)?;

    let lock_path = DaemonConfig::load()
        .map(|d| d.lock_path)
        .unwrap_or_else(|_| path.with_file_name("backup.lock"));
    let options = RunOptions::new(lock_path);

    let outcome = run_backup(&config, &options, &LogNotifier)?;

    println!(
        "snapshot {} committed: {} files ({} linked), {} copied in {:.1}s",
        outcome.name,
        outcome.files_transferred,
        outcome.files_linked,
        human_bytes(outcome.total_size),
        outcome.duration_seconds,
    );
    if !outcome.skipped.is_empty() {
        eprintln!("warning: {} files skipped", outcome.skipped.len());
    }
    if outcome.swept_staging > 0 {
        eprintln!(
            "note: removed {} leftover staging directories",
            outcome.swept_staging
        );
    }
    Ok(())
}
