// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The backup orchestrator: lock → signals → destination → space →
//! snapshot → retention, with the exit-code mapping owned here.
//!
//! The lock is handed to the cleanup state right after acquisition so a
//! termination signal releases it; on every normal path it is taken back
//! and released exactly once at the end of the run.

use crate::lock::{BackupLock, LockError};
use crate::notify::{Notice, Notifier};
use crate::retention::apply_retention;
use crate::signal::{CleanupHandle, SignalHandler};
use crate::snapshot::{SnapshotError, SnapshotOutcome, SnapshotStore};
use crate::space::{validate_space, SpaceError, DEFAULT_BUFFER, MIN_FREE_BYTES};
use bak_core::{Config, ConfigError, ExcludeSet, SystemClock};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

/// Orchestrator errors, one variant per exit code.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Lock(#[from] LockError),

    #[error("destination unavailable: {0}")]
    Destination(String),

    #[error("snapshot failed: {0}")]
    Snapshot(#[from] SnapshotError),

    #[error("{0}")]
    Space(#[from] SpaceError),
}

impl RunError {
    /// The process exit code contract: 0 success, 1 config, 2 lock,
    /// 3 destination, 4 snapshot, 5 space.
    pub fn exit_code(&self) -> i32 {
        match self {
            RunError::Config(_) => 1,
            RunError::Lock(_) => 2,
            RunError::Destination(_) => 3,
            RunError::Snapshot(_) => 4,
            RunError::Space(_) => 5,
        }
    }
}

/// Per-run knobs.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Lock file protecting the destination
    pub lock_path: PathBuf,
    pub lock_timeout: Duration,
}

impl RunOptions {
    pub fn new(lock_path: impl Into<PathBuf>) -> Self {
        Self {
            lock_path: lock_path.into(),
            lock_timeout: BackupLock::DEFAULT_TIMEOUT,
        }
    }
}

/// Run one backup, installing the signal handlers for the duration (a
/// no-op off the main thread). This is the entry point for the one-shot
/// CLI path.
pub fn run_backup(
    config: &Config,
    options: &RunOptions,
    notifier: &dyn Notifier,
) -> Result<SnapshotOutcome, RunError> {
    let handler = SignalHandler::register();
    let result = run_backup_with_cleanup(config, options, notifier, handler.handle());
    drop(handler);
    result
}

/// Run one backup against an externally owned cleanup handle. The daemon
/// uses this so its own shutdown path can invoke the cleanup.
pub fn run_backup_with_cleanup(
    config: &Config,
    options: &RunOptions,
    notifier: &dyn Notifier,
    cleanup: CleanupHandle,
) -> Result<SnapshotOutcome, RunError> {
    // A config error surfaces before any notification dispatch
    config.validate()?;

    let result = (|| -> Result<SnapshotOutcome, RunError> {
        let lock = BackupLock::acquire(&options.lock_path, options.lock_timeout)?;
        cleanup.set_lock(lock);

        let result = locked_run(config, &cleanup);

        // Exactly-once release on every non-signal path
        if let Some(mut lock) = cleanup.take_lock() {
            lock.release();
        }
        result
    })();

    match &result {
        Ok(outcome) => {
            if config.notifications.on_success {
                notifier.notify(&Notice {
                    success: true,
                    summary: format!(
                        "backup complete: {} files into {}",
                        outcome.files_transferred,
                        outcome.name
                    ),
                });
            }
        }
        Err(e) => {
            if config.notifications.on_failure {
                notifier.notify(&Notice {
                    success: false,
                    summary: format!("backup failed: {e}"),
                });
            }
        }
    }

    result
}

fn locked_run(config: &Config, cleanup: &CleanupHandle) -> Result<SnapshotOutcome, RunError> {
    let destination = &config.backup_destination;
    let excludes = ExcludeSet::new(&config.exclude_patterns);

    ensure_destination(destination)?;

    let report = validate_space(
        destination,
        &config.source_directories,
        &excludes,
        DEFAULT_BUFFER,
        MIN_FREE_BYTES,
    )?;
    if let Some(warning) = &report.warning {
        warn!("{warning}");
    }
    info!(
        estimated = report.estimated_bytes,
        available = report.available_bytes,
        "space validated"
    );

    let store = SnapshotStore::new(destination);
    let clock = SystemClock;

    let attempts = config.retry.count.max(1);
    let delay = Duration::from_secs_f64(config.retry.delay_seconds.max(0.0));
    let mut last_err: Option<SnapshotError> = None;

    for attempt in 1..=attempts {
        match store.create(
            &config.source_directories,
            &excludes,
            &clock,
            Some(cleanup),
        ) {
            Ok(outcome) => {
                match apply_retention(&store, &config.retention) {
                    Ok(gc) if !gc.deleted.is_empty() => {
                        info!(deleted = gc.deleted.len(), "retention applied")
                    }
                    Ok(_) => {}
                    Err(e) => warn!(error = %e, "retention pass failed"),
                }
                return Ok(outcome);
            }
            // A cancelled run must not re-stage during shutdown
            Err(SnapshotError::Interrupted) => {
                warn!("backup interrupted");
                return Err(RunError::Snapshot(SnapshotError::Interrupted));
            }
            Err(e) => {
                warn!(attempt, error = %e, "snapshot attempt failed");
                last_err = Some(e);
                if attempt < attempts {
                    std::thread::sleep(delay);
                }
            }
        }
    }

    Err(RunError::Snapshot(last_err.unwrap_or_else(|| {
        SnapshotError::Io(std::io::Error::other("snapshot failed with no attempts"))
    })))
}

/// The destination must exist (or be creatable) and be writable.
fn ensure_destination(destination: &std::path::Path) -> Result<(), RunError> {
    std::fs::create_dir_all(destination)
        .map_err(|e| RunError::Destination(format!("{}: {e}", destination.display())))?;

    // Writability probe; removed immediately
    let probe = destination.join(format!(".bak-write-test-{}", std::process::id()));
    std::fs::write(&probe, b"")
        .map_err(|e| RunError::Destination(format!("{} is not writable: {e}", destination.display())))?;
    let _ = std::fs::remove_file(&probe);
    Ok(())
}

#[cfg(test)]
#[path = "run_tests.rs"]
mod tests;
