// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Interval scheduler driving periodic backup runs.
//!
//! The configured interval is consulted on every tick so edits to the
//! config file take effect without a restart. A tick is skipped while
//! the destination lock is held.

use crate::listener::ListenCtx;
use bak_core::Config;
use bak_engine::{run_backup_with_cleanup, BackupLock, LogNotifier, RunOptions};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Fallback wait when no configuration exists yet.
const UNCONFIGURED_WAIT: Duration = Duration::from_secs(60);

/// Spawn the scheduler loop.
pub fn spawn_scheduler(ctx: Arc<ListenCtx>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut warned_unconfigured = false;
        loop {
            let config = match Config::load(&ctx.config_path) {
                Ok(config) => config,
                Err(e) => {
                    if !warned_unconfigured {
                        warn!(error = %e, "scheduler idle: no usable configuration");
                        warned_unconfigured = true;
                    }
                    tokio::time::sleep(UNCONFIGURED_WAIT).await;
                    continue;
                }
            };
            warned_unconfigured = false;

            let interval = Duration::from_secs(config.scheduler.interval_seconds);
            tokio::time::sleep(interval).await;

            if BackupLock::is_locked(&ctx.lock_path) {
                debug!("backup already running, skipping scheduled run");
                continue;
            }

            info!("scheduled backup starting");
            let options = RunOptions::new(&ctx.lock_path);
            let cleanup = ctx.cleanup.clone();
            let result = tokio::task::spawn_blocking(move || {
                run_backup_with_cleanup(&config, &options, &LogNotifier, cleanup)
            })
            .await;

            match result {
                Ok(Ok(outcome)) => {
                    info!(snapshot = %outcome.name, files = outcome.files_transferred, "scheduled backup complete")
                }
                Ok(Err(e)) => warn!(error = %e, "scheduled backup failed"),
                Err(e) => warn!(error = %e, "scheduled backup panicked"),
            }
        }
    })
}
