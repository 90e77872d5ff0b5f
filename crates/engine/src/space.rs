// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Space pre-flight: estimate the working set and compare against free
//! space before anything is written. A space failure must never leave
//! filesystem debris, so this runs strictly before staging is created.

use crate::walk::{walk, EntryKind};
use bak_core::ExcludeSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Space validation errors
#[derive(Debug, Error)]
pub enum SpaceError {
    #[error("insufficient disk space: {available} bytes available, {required} bytes required")]
    Insufficient { available: u64, required: u64 },

    #[error("cannot determine available space at {path}: {source}")]
    Query {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Outcome of a successful space validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpaceReport {
    pub available_bytes: u64,
    pub estimated_bytes: u64,
    pub required_bytes: u64,
    /// Non-fatal low-space warning
    pub warning: Option<String>,
}

/// Extra space reserved on top of the estimate (10%).
pub const DEFAULT_BUFFER: f64 = 0.1;

/// Free-space floor below which a warning is issued (1 GiB).
pub const MIN_FREE_BYTES: u64 = 1024 * 1024 * 1024;

/// Estimate the backup working set: regular-file bytes under each source,
/// honoring excludes, never following symlinks (links contribute zero).
/// Unreadable entries are silently skipped by the walk.
pub fn estimate_backup_size(sources: &[PathBuf], excludes: &ExcludeSet) -> u64 {
    let mut total: u64 = 0;
    for source in sources {
        walk(source, excludes, &mut |entry| {
            if entry.kind == EntryKind::File {
                total = total.saturating_add(entry.meta.len());
            }
        });
    }
    total
}

/// Validate that the destination has room for an estimated backup.
///
/// If the destination does not exist yet, the free-space query walks up to
/// the nearest existing ancestor.
pub fn validate_space(
    destination: &Path,
    sources: &[PathBuf],
    excludes: &ExcludeSet,
    buffer: f64,
    min_free: u64,
) -> Result<SpaceReport, SpaceError> {
    let probe = nearest_existing_ancestor(destination);
    let available = fs2::available_space(&probe).map_err(|source| SpaceError::Query {
        path: destination.to_path_buf(),
        source,
    })?;
    let estimated = estimate_backup_size(sources, excludes);
    check_space(available, estimated, buffer, min_free)
}

/// Pure space check, split out so the threshold logic is testable without
/// controlling the real filesystem's free space.
pub fn check_space(
    available: u64,
    estimated: u64,
    buffer: f64,
    min_free: u64,
) -> Result<SpaceReport, SpaceError> {
    let required = (estimated as f64 * (1.0 + buffer)).ceil() as u64;

    if available < required {
        return Err(SpaceError::Insufficient {
            available,
            required,
        });
    }

    let warning = if available < min_free {
        Some(format!(
            "low disk space: {:.2} GiB free at destination (minimum recommended {:.2} GiB)",
            available as f64 / (1024.0 * 1024.0 * 1024.0),
            min_free as f64 / (1024.0 * 1024.0 * 1024.0),
        ))
    } else {
        None
    };

    Ok(SpaceReport {
        available_bytes: available,
        estimated_bytes: estimated,
        required_bytes: required,
        warning,
    })
}

fn nearest_existing_ancestor(path: &Path) -> PathBuf {
    let mut current = path;
    while !current.exists() {
        match current.parent() {
            Some(parent) if parent != current => current = parent,
            _ => break,
        }
    }
    current.to_path_buf()
}

#[cfg(test)]
#[path = "space_tests.rs"]
mod tests;
