// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Snapshot store: atomic snapshot construction and lookup.
//!
//! A snapshot directory is in exactly one of two observable states:
//! staging (`in_progress_*`) or committed (timestamp name with a
//! manifest). The commit point is a single `rename`, so there is no third
//! partial state; a crash before the rename leaves staging that the next
//! run sweeps.

use crate::copier::copy_sources;
use crate::manifest::{Manifest, ManifestError};
use crate::signal::CleanupHandle;
use crate::walk::{walk, EntryKind};
use bak_core::timestamp::{is_staging_name, STAGING_PREFIX};
use bak_core::{Clock, ExcludeSet, SnapshotName};
use std::path::{Path, PathBuf};
use std::time::Instant;
use thiserror::Error;
use tracing::{info, warn};

/// Snapshot engine errors
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Manifest error: {0}")]
    Manifest(#[from] ManifestError),

    #[error("Unknown snapshot: {0}")]
    UnknownSnapshot(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Backup interrupted")]
    Interrupted,
}

/// A committed snapshot under the destination root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotEntry {
    pub name: SnapshotName,
    pub path: PathBuf,
}

/// Result of a successful snapshot creation.
#[derive(Debug)]
pub struct SnapshotOutcome {
    pub snapshot_path: PathBuf,
    pub name: SnapshotName,
    pub files_transferred: u64,
    pub files_linked: u64,
    pub total_size: u64,
    pub duration_seconds: f64,
    /// Leftover staging directories swept before this run
    pub swept_staging: u64,
    /// Per-file skips (permission denied, vanished mid-run)
    pub skipped: Vec<PathBuf>,
}

/// Health report over all committed snapshots.
#[derive(Debug, Default)]
pub struct HealthReport {
    pub healthy: Vec<String>,
    /// Snapshots with a missing manifest
    pub missing_manifest: Vec<String>,
    /// Snapshots whose file set diverges from their manifest
    pub diverged: Vec<String>,
}

/// Store of snapshots under one backup destination root.
pub struct SnapshotStore {
    destination: PathBuf,
}

impl SnapshotStore {
    pub fn new(destination: impl Into<PathBuf>) -> Self {
        Self {
            destination: destination.into(),
        }
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    /// Committed snapshots, newest first. Staging directories and foreign
    /// names are never listed.
    pub fn list_snapshots(&self) -> Vec<SnapshotEntry> {
        let mut entries: Vec<SnapshotEntry> = match std::fs::read_dir(&self.destination) {
            Ok(dir) => dir
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().map(|t| t.is_dir()).unwrap_or(false))
                .filter_map(|e| {
                    let name = SnapshotName::parse(&e.file_name().to_string_lossy())?;
                    Some(SnapshotEntry {
                        name,
                        path: e.path(),
                    })
                })
                .collect(),
            Err(_) => Vec::new(),
        };
        entries.sort_by(|a, b| b.name.cmp(&a.name));
        entries
    }

    /// Most recent committed snapshot.
    pub fn latest(&self) -> Option<SnapshotEntry> {
        self.list_snapshots().into_iter().next()
    }

    /// Look up a snapshot by its directory name.
    pub fn get_by_timestamp(&self, name: &str) -> Result<SnapshotEntry, SnapshotError> {
        let parsed = SnapshotName::parse(name)
            .ok_or_else(|| SnapshotError::UnknownSnapshot(name.to_string()))?;
        let path = self.destination.join(name);
        if !path.is_dir() {
            return Err(SnapshotError::UnknownSnapshot(name.to_string()));
        }
        Ok(SnapshotEntry { name: parsed, path })
    }

    /// Remove leftover `in_progress_*` directories from previously
    /// signalled or crashed runs. Returns how many were removed.
    pub fn sweep_staging(&self) -> u64 {
        let Ok(dir) = std::fs::read_dir(&self.destination) else {
            return 0;
        };
        let mut swept = 0;
        for entry in dir.filter_map(|e| e.ok()) {
            let name = entry.file_name();
            if !is_staging_name(&name.to_string_lossy()) {
                continue;
            }
            match std::fs::remove_dir_all(entry.path()) {
                Ok(()) => {
                    warn!(path = %entry.path().display(), "swept leftover staging directory");
                    swept += 1;
                }
                Err(e) => {
                    warn!(path = %entry.path().display(), error = %e, "failed to sweep staging")
                }
            }
        }
        swept
    }

    /// Create a snapshot: stage, populate with hard-link dedup against the
    /// previous snapshot, write the manifest, and commit with one rename.
    ///
    /// The staging path is reported to `cleanup` as soon as it exists and
    /// cleared at the commit point.
    pub fn create<C: Clock>(
        &self,
        sources: &[PathBuf],
        excludes: &ExcludeSet,
        clock: &C,
        cleanup: Option<&CleanupHandle>,
    ) -> Result<SnapshotOutcome, SnapshotError> {
        let started = Instant::now();

        let previous = self.latest();
        let swept = self.sweep_staging();

        let mut name = SnapshotName::from_datetime(clock.now());
        while self.destination.join(name.to_string()).exists() {
            name = name.next_in_sequence();
        }

        let staging = self
            .destination
            .join(format!("{STAGING_PREFIX}{name}"));
        std::fs::create_dir_all(&staging)?;
        if let Some(cleanup) = cleanup {
            cleanup.set_in_progress(staging.clone());
        }

        let result = self.populate(&staging, sources, excludes, previous.as_ref(), cleanup);
        let stats = match result {
            Ok(stats) => stats,
            Err(e) => {
                let _ = std::fs::remove_dir_all(&staging);
                if let Some(cleanup) = cleanup {
                    cleanup.clear_in_progress();
                }
                return Err(e);
            }
        };

        let final_path = self.destination.join(name.to_string());
        std::fs::rename(&staging, &final_path)?;
        if let Some(cleanup) = cleanup {
            cleanup.clear_in_progress();
        }

        let duration = started.elapsed().as_secs_f64();
        info!(
            snapshot = %name,
            files = stats.files_transferred(),
            linked = stats.files_linked,
            bytes = stats.bytes_copied,
            "snapshot committed"
        );

        Ok(SnapshotOutcome {
            snapshot_path: final_path,
            name,
            files_transferred: stats.files_transferred(),
            files_linked: stats.files_linked,
            total_size: stats.bytes_copied,
            duration_seconds: duration,
            swept_staging: swept,
            skipped: stats.skipped,
        })
    }

    fn populate(
        &self,
        staging: &Path,
        sources: &[PathBuf],
        excludes: &ExcludeSet,
        previous: Option<&SnapshotEntry>,
        cleanup: Option<&CleanupHandle>,
    ) -> Result<crate::copier::CopyStats, SnapshotError> {
        let cancel = cleanup.map(|c| c.cancel_flag()).unwrap_or_default();
        let stats = copy_sources(
            sources,
            excludes,
            staging,
            previous.map(|p| p.path.as_path()),
            &cancel,
        )?;
        if cancel.is_set() {
            return Err(SnapshotError::Interrupted);
        }
        let manifest = Manifest::build(staging)?;
        manifest.save(staging)?;
        Ok(stats)
    }

    /// Report committed snapshots whose manifest is missing or whose file
    /// set diverges from it. Unhealthy snapshots are never auto-removed.
    pub fn check_health(&self) -> HealthReport {
        let mut report = HealthReport::default();

        for entry in self.list_snapshots() {
            let manifest = match Manifest::load(&entry.path) {
                Ok(manifest) => manifest,
                Err(ManifestError::Missing) => {
                    report.missing_manifest.push(entry.name.to_string());
                    continue;
                }
                Err(_) => {
                    report.diverged.push(entry.name.to_string());
                    continue;
                }
            };

            let mut on_disk = Vec::new();
            walk(&entry.path, &ExcludeSet::default(), &mut |e| {
                if e.kind == EntryKind::File {
                    let rel = e.rel.to_string_lossy().into_owned();
                    if rel != crate::manifest::MANIFEST_FILE_NAME {
                        on_disk.push(rel);
                    }
                }
            });
            on_disk.sort();

            let mut listed: Vec<String> =
                manifest.entries.iter().map(|e| e.path.clone()).collect();
            listed.sort();

            if on_disk == listed {
                report.healthy.push(entry.name.to_string());
            } else {
                report.diverged.push(entry.name.to_string());
            }
        }

        report
    }
}

#[cfg(test)]
#[path = "snapshot_tests.rs"]
mod tests;
