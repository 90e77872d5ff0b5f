// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Restore files from a snapshot.
//!
//! Path safety is a hard requirement: the snapshot-relative path must be
//! relative with no `..` components. Without an explicit destination,
//! restores land under `~/Desktop/Recovered Files` and never overwrite;
//! the live source tree is only ever touched if the caller explicitly
//! points the destination at it.

use crate::snapshot::{SnapshotError, SnapshotStore};
use crate::walk::{walk, EntryKind};
use bak_core::ExcludeSet;
use std::path::{Component, Path, PathBuf};
use tracing::info;

/// Result of a restore operation.
#[derive(Debug, PartialEq, Eq)]
pub struct RestoreOutcome {
    /// Where the restored file or tree was placed
    pub restored_to: PathBuf,
    pub files_restored: u64,
}

/// Restore `relative_path` from the named snapshot.
///
/// With `destination = None` the target is
/// `~/Desktop/Recovered Files/<basename>`, uniquified with `_1`, `_2`, …
/// on collision. An explicit destination is used as the exact target path.
pub fn restore(
    store: &SnapshotStore,
    snapshot: &str,
    relative_path: &str,
    destination: Option<&Path>,
) -> Result<RestoreOutcome, SnapshotError> {
    let rel = validate_relative(relative_path)?;
    let entry = store.get_by_timestamp(snapshot)?;
    let source = entry.path.join(&rel);

    if std::fs::symlink_metadata(&source).is_err() {
        return Err(SnapshotError::InvalidPath(format!(
            "{relative_path} not present in snapshot {snapshot}"
        )));
    }

    let target = match destination {
        Some(dest) => dest.to_path_buf(),
        None => {
            let base = recovered_files_dir()?;
            std::fs::create_dir_all(&base)?;
            let name = rel
                .file_name()
                .ok_or_else(|| SnapshotError::InvalidPath(relative_path.to_string()))?;
            unique_path(&base, Path::new(name))
        }
    };

    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let files = copy_recursive(&source, &target)?;
    info!(
        from = %source.display(),
        to = %target.display(),
        files,
        "restore complete"
    );

    Ok(RestoreOutcome {
        restored_to: target,
        files_restored: files,
    })
}

/// Reject absolute paths and any `..` (or other non-normal) component.
fn validate_relative(path: &str) -> Result<PathBuf, SnapshotError> {
    let p = Path::new(path);
    if p.as_os_str().is_empty() {
        return Err(SnapshotError::InvalidPath("empty path".to_string()));
    }
    for component in p.components() {
        match component {
            Component::Normal(_) => {}
            Component::CurDir => {}
            _ => {
                return Err(SnapshotError::InvalidPath(format!(
                    "path must be relative with no '..': {path}"
                )))
            }
        }
    }
    Ok(p.to_path_buf())
}

fn recovered_files_dir() -> Result<PathBuf, SnapshotError> {
    let home = dirs::home_dir().ok_or_else(|| {
        SnapshotError::Io(std::io::Error::other("cannot determine home directory"))
    })?;
    Ok(home.join("Desktop").join("Recovered Files"))
}

/// First of `name`, `name_1`, `name_2`, … that does not exist in `dir`.
/// The counter goes on the file stem, before any extension.
fn unique_path(dir: &Path, name: &Path) -> PathBuf {
    let candidate = dir.join(name);
    if !candidate.exists() {
        return candidate;
    }

    let stem = name
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = name.extension().map(|e| e.to_string_lossy().into_owned());

    for n in 1.. {
        let file_name = match &ext {
            Some(ext) => format!("{stem}_{n}.{ext}"),
            None => format!("{stem}_{n}"),
        };
        let candidate = dir.join(file_name);
        if !candidate.exists() {
            return candidate;
        }
    }
    unreachable!()
}

fn copy_recursive(source: &Path, target: &Path) -> Result<u64, SnapshotError> {
    let meta = std::fs::symlink_metadata(source)?;

    if meta.file_type().is_symlink() {
        let link = std::fs::read_link(source)?;
        std::os::unix::fs::symlink(link, target)?;
        return Ok(0);
    }

    if meta.is_file() {
        std::fs::copy(source, target)?;
        return Ok(1);
    }

    std::fs::create_dir_all(target)?;
    let mut files = 0;
    walk(source, &ExcludeSet::default(), &mut |entry| {
        let dest = target.join(entry.rel);
        match entry.kind {
            EntryKind::Dir => {
                let _ = std::fs::create_dir_all(&dest);
            }
            EntryKind::File => {
                if std::fs::copy(entry.path, &dest).is_ok() {
                    files += 1;
                }
            }
            EntryKind::Symlink => {
                if let Ok(link) = std::fs::read_link(entry.path) {
                    let _ = std::os::unix::fs::symlink(link, &dest);
                }
            }
            EntryKind::Other => {}
        }
    });
    Ok(files)
}

#[cfg(test)]
#[path = "restore_tests.rs"]
mod tests;
