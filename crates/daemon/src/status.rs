// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Status derivation for `status_request`.
//!
//! backing_up if the destination lock is held; else warning when the
//! destination is absent, no snapshots exist, or the newest snapshot is
//! older than twice the scheduled interval; else protected. Internal
//! failures degrade to the error status instead of dropping the
//! connection.

use crate::protocol::{BackupStatus, StatusPayload};
use bak_core::{Clock, Config};
use bak_engine::{BackupLock, SnapshotStore};
use chrono::Duration;
use std::path::Path;
use tracing::debug;

/// Payload when no configuration exists yet.
pub fn unconfigured() -> StatusPayload {
    StatusPayload {
        status: BackupStatus::Warning,
        last_backup: None,
        next_backup: None,
        total_snapshots: 0,
        message: "backups not configured".to_string(),
        is_running: false,
        destination_available: false,
    }
}

/// Payload for an internal failure.
pub fn internal_error(message: &str) -> StatusPayload {
    StatusPayload {
        status: BackupStatus::Error,
        last_backup: None,
        next_backup: None,
        total_snapshots: 0,
        message: message.to_string(),
        is_running: false,
        destination_available: false,
    }
}

/// Derive the current status for a loaded configuration.
pub fn derive_status<C: Clock>(config: &Config, lock_path: &Path, clock: &C) -> StatusPayload {
    let is_running = BackupLock::is_locked(lock_path);
    let destination_available = config.backup_destination.is_dir();

    let store = SnapshotStore::new(&config.backup_destination);
    let snapshots = store.list_snapshots();
    let total_snapshots = snapshots.len();

    let newest = snapshots.first().map(|s| s.name.datetime());
    let interval = Duration::seconds(config.scheduler.interval_seconds as i64);
    let last_backup = newest.map(|t| t.to_rfc3339());
    let next_backup = newest.map(|t| (t + interval).to_rfc3339());

    let (status, message) = if is_running {
        (BackupStatus::BackingUp, "backup in progress".to_string())
    } else if !destination_available {
        (
            BackupStatus::Warning,
            "backup destination not available".to_string(),
        )
    } else if total_snapshots == 0 {
        (BackupStatus::Warning, "no backups yet".to_string())
    } else if let Some(newest) = newest {
        let age = clock.now() - newest;
        if age > interval * 2 {
            (BackupStatus::Warning, "backup overdue".to_string())
        } else {
            (BackupStatus::Protected, "backups up to date".to_string())
        }
    } else {
        (BackupStatus::Protected, "backups up to date".to_string())
    };

    debug!(?status, total_snapshots, is_running, "status derived");

    StatusPayload {
        status,
        last_backup,
        next_backup,
        total_snapshots,
        message,
        is_running,
        destination_available,
    }
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;
