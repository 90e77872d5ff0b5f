// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Staging-tree population.
//!
//! Copies each source subtree into the staging directory, hard-linking
//! from the analogous path in the previous snapshot whenever a file's
//! (size, mtime, mode) are unchanged. Symlinks are recreated as symlinks,
//! never followed. Mode and mtime are preserved on copies so the next
//! run's identity check sees them.

use crate::signal::CancelFlag;
use crate::snapshot::SnapshotError;
use crate::walk::{walk, EntryKind};
use bak_core::ExcludeSet;
use filetime::FileTime;
use std::fs::Metadata;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Accumulated result of populating one staging tree.
#[derive(Debug, Default)]
pub struct CopyStats {
    pub files_copied: u64,
    pub files_linked: u64,
    pub symlinks: u64,
    pub dirs_created: u64,
    pub bytes_copied: u64,
    /// Paths skipped on per-file errors (permission denied, vanished)
    pub skipped: Vec<PathBuf>,
}

impl CopyStats {
    /// Files placed into the staging tree by either mechanism.
    pub fn files_transferred(&self) -> u64 {
        self.files_copied + self.files_linked
    }
}

/// Copy every source into `staging/<source-basename>/…`.
///
/// `previous` is the root of the prior committed snapshot, if any. The
/// cancel flag aborts the copy at the next entry boundary.
pub fn copy_sources(
    sources: &[PathBuf],
    excludes: &ExcludeSet,
    staging: &Path,
    previous: Option<&Path>,
    cancel: &CancelFlag,
) -> Result<CopyStats, SnapshotError> {
    let mut stats = CopyStats::default();

    for source in sources {
        if cancel.is_set() {
            return Err(SnapshotError::Interrupted);
        }
        if !source.exists() && std::fs::symlink_metadata(source).is_err() {
            warn!(source = %source.display(), "source missing, skipping");
            continue;
        }
        let Some(basename) = source.file_name() else {
            warn!(source = %source.display(), "source has no basename, skipping");
            continue;
        };

        let dest_root = staging.join(basename);
        let prev_root = previous.map(|p| p.join(basename));
        copy_tree(
            source,
            excludes,
            &dest_root,
            prev_root.as_deref(),
            cancel,
            &mut stats,
        )?;
    }

    Ok(stats)
}

fn copy_tree(
    source: &Path,
    excludes: &ExcludeSet,
    dest_root: &Path,
    prev_root: Option<&Path>,
    cancel: &CancelFlag,
    stats: &mut CopyStats,
) -> Result<(), SnapshotError> {
    let source_meta = std::fs::symlink_metadata(source)?;

    // A single-file (or symlink) source lands directly at dest_root
    if !source_meta.is_dir() {
        let result = if source_meta.file_type().is_symlink() {
            recreate_symlink(source, dest_root).map(|()| stats.symlinks += 1)
        } else {
            place_file(
                source,
                &source_meta,
                dest_root,
                prev_root.map(Path::to_path_buf),
                stats,
            )
        };
        if let Err(e) = result {
            if is_per_file_error(&e) {
                warn!(path = %source.display(), error = %e, "skipping file");
                stats.skipped.push(source.to_path_buf());
                return Ok(());
            }
            return Err(SnapshotError::Io(e));
        }
        return Ok(());
    }

    std::fs::create_dir_all(dest_root)?;
    copy_mode(source, dest_root);
    stats.dirs_created += 1;

    let mut failure: Option<SnapshotError> = None;

    walk(source, excludes, &mut |entry| {
        if failure.is_some() {
            return;
        }
        if cancel.is_set() {
            failure = Some(SnapshotError::Interrupted);
            return;
        }
        let target = dest_root.join(entry.rel);
        let result = match entry.kind {
            EntryKind::Dir => std::fs::create_dir_all(&target).map(|()| {
                copy_mode(entry.path, &target);
                stats.dirs_created += 1;
            }),
            EntryKind::File => {
                let prev_candidate = prev_root.map(|p| p.join(entry.rel));
                place_file(entry.path, entry.meta, &target, prev_candidate, stats)
            }
            EntryKind::Symlink => recreate_symlink(entry.path, &target).map(|()| {
                stats.symlinks += 1;
            }),
            EntryKind::Other => {
                debug!(path = %entry.path.display(), "skipping special file");
                Ok(())
            }
        };

        if let Err(e) = result {
            if is_per_file_error(&e) {
                warn!(path = %entry.path.display(), error = %e, "skipping file");
                stats.skipped.push(entry.path.to_path_buf());
            } else {
                failure = Some(SnapshotError::Io(e));
            }
        }
    });

    match failure {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// Hard-link from the previous snapshot when identity is unchanged,
/// otherwise copy the bytes and preserve mode + mtime.
fn place_file(
    source: &Path,
    meta: &Metadata,
    target: &Path,
    prev_candidate: Option<PathBuf>,
    stats: &mut CopyStats,
) -> Result<(), std::io::Error> {
    if let Some(prev_path) = prev_candidate {
        if let Ok(prev_meta) = std::fs::symlink_metadata(&prev_path) {
            if identity_unchanged(meta, &prev_meta) {
                match std::fs::hard_link(&prev_path, target) {
                    Ok(()) => {
                        stats.files_linked += 1;
                        return Ok(());
                    }
                    Err(e) => {
                        debug!(path = %prev_path.display(), error = %e, "hard link failed, copying");
                    }
                }
            }
        }
    }

    std::fs::copy(source, target)?;
    let mtime = FileTime::from_last_modification_time(meta);
    filetime::set_file_mtime(target, mtime)?;
    stats.files_copied += 1;
    stats.bytes_copied += meta.len();
    Ok(())
}

fn identity_unchanged(live: &Metadata, prev: &Metadata) -> bool {
    prev.is_file()
        && live.len() == prev.len()
        && live.mtime() == prev.mtime()
        && live.mode() == prev.mode()
}

fn recreate_symlink(source: &Path, target: &Path) -> Result<(), std::io::Error> {
    let link_target = std::fs::read_link(source)?;
    std::os::unix::fs::symlink(link_target, target)
}

fn copy_mode(source: &Path, target: &Path) {
    if let Ok(meta) = std::fs::metadata(source) {
        let _ = std::fs::set_permissions(target, meta.permissions());
    }
}

fn is_per_file_error(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        std::io::ErrorKind::PermissionDenied | std::io::ErrorKind::NotFound
    )
}

#[cfg(test)]
#[path = "copier_tests.rs"]
mod tests;
