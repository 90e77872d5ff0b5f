// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Retention GC over committed snapshots.
//!
//! The `{hourly, daily, weekly}` policy keeps the most recent H
//! snapshots, the newest snapshot of each of the last D calendar days,
//! and the newest of each of the last W ISO weeks. Everything else is
//! deleted by recursive removal; hard-linked content in surviving
//! snapshots stays valid because the inodes keep their remaining links.

use crate::snapshot::{SnapshotEntry, SnapshotError, SnapshotStore};
use bak_core::RetentionConfig;
use chrono::{Datelike, NaiveDate};
use std::collections::HashSet;
use tracing::info;

/// Result of one retention pass.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct RetentionOutcome {
    pub retained: usize,
    pub deleted: Vec<String>,
}

/// Names to keep for a newest-first snapshot list. The most recent
/// snapshot is always retained.
pub fn select_retained(entries: &[SnapshotEntry], policy: &RetentionConfig) -> HashSet<String> {
    let mut keep: HashSet<String> = HashSet::new();

    if let Some(newest) = entries.first() {
        keep.insert(newest.name.to_string());
    }

    for entry in entries.iter().take(policy.hourly) {
        keep.insert(entry.name.to_string());
    }

    // Newest per calendar day, for the D most recent days present
    let mut days_seen: Vec<NaiveDate> = Vec::new();
    for entry in entries {
        let day = entry.name.naive().date();
        if days_seen.contains(&day) {
            continue;
        }
        if days_seen.len() >= policy.daily {
            break;
        }
        days_seen.push(day);
        keep.insert(entry.name.to_string());
    }

    // Newest per ISO week, for the W most recent weeks present
    let mut weeks_seen: Vec<(i32, u32)> = Vec::new();
    for entry in entries {
        let week = entry.name.naive().date().iso_week();
        let key = (week.year(), week.week());
        if weeks_seen.contains(&key) {
            continue;
        }
        if weeks_seen.len() >= policy.weekly {
            break;
        }
        weeks_seen.push(key);
        keep.insert(entry.name.to_string());
    }

    keep
}

/// Apply the policy: delete every committed snapshot outside the
/// retained set.
pub fn apply_retention(
    store: &SnapshotStore,
    policy: &RetentionConfig,
) -> Result<RetentionOutcome, SnapshotError> {
    let entries = store.list_snapshots();
    let keep = select_retained(&entries, policy);

    let mut outcome = RetentionOutcome {
        retained: keep.len(),
        deleted: Vec::new(),
    };

    for entry in &entries {
        let name = entry.name.to_string();
        if keep.contains(&name) {
            continue;
        }
        std::fs::remove_dir_all(&entry.path)?;
        info!(snapshot = %name, "retention removed snapshot");
        outcome.deleted.push(name);
    }

    Ok(outcome)
}

#[cfg(test)]
#[path = "retention_tests.rs"]
mod tests;
