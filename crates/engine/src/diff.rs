// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Diff a committed snapshot against the live source tree.

use crate::manifest::{file_digest, Manifest, ManifestEntry};
use crate::snapshot::{SnapshotEntry, SnapshotError};
use crate::walk::{walk, EntryKind};
use bak_core::ExcludeSet;
use std::collections::BTreeMap;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};

/// Paths that changed between a snapshot and the live sources.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct DiffReport {
    /// Present live, absent in the snapshot
    pub added: Vec<String>,
    /// Present in both but different
    pub modified: Vec<String>,
    /// Present in the snapshot, absent live
    pub deleted: Vec<String>,
}

impl DiffReport {
    pub fn is_clean(&self) -> bool {
        self.added.is_empty() && self.modified.is_empty() && self.deleted.is_empty()
    }
}

struct LiveFile {
    path: PathBuf,
    size: u64,
    mtime: i64,
}

/// Compare `snapshot` with the current state of `sources`. Excludes apply
/// to the live side; `sub_path` restricts the comparison to one subtree
/// (snapshot-relative).
pub fn diff_snapshot(
    snapshot: &SnapshotEntry,
    sources: &[PathBuf],
    excludes: &ExcludeSet,
    sub_path: Option<&Path>,
) -> Result<DiffReport, SnapshotError> {
    let manifest = Manifest::load(&snapshot.path)?;

    let mut live: BTreeMap<String, LiveFile> = BTreeMap::new();
    for source in sources {
        let Some(basename) = source.file_name() else {
            continue;
        };
        let prefix = PathBuf::from(basename);
        walk(source, excludes, &mut |entry| {
            if entry.kind != EntryKind::File {
                return;
            }
            let key = prefix.join(entry.rel).to_string_lossy().into_owned();
            live.insert(
                key,
                LiveFile {
                    path: entry.path.to_path_buf(),
                    size: entry.meta.len(),
                    mtime: entry.meta.mtime(),
                },
            );
        });
    }

    let in_scope = |key: &str| match sub_path {
        Some(sub) => Path::new(key).starts_with(sub),
        None => true,
    };

    let mut report = DiffReport::default();
    let mut snapshot_keys: BTreeMap<&str, &ManifestEntry> = BTreeMap::new();
    for entry in &manifest.entries {
        snapshot_keys.insert(entry.path.as_str(), entry);
    }

    for (key, live_file) in live.iter().filter(|(k, _)| in_scope(k)) {
        match snapshot_keys.get(key.as_str()) {
            None => report.added.push(key.clone()),
            Some(entry) => {
                if is_modified(live_file, entry) {
                    report.modified.push(key.clone());
                }
            }
        }
    }

    for key in snapshot_keys.keys().filter(|k| in_scope(k)) {
        if !live.contains_key(*key) {
            report.deleted.push(key.to_string());
        }
    }

    Ok(report)
}

/// Size or mtime mismatch is a modification; when both match, the digest
/// decides (touched-back files with different content still count).
fn is_modified(live: &LiveFile, entry: &ManifestEntry) -> bool {
    if live.size != entry.size || live.mtime != entry.mtime {
        return true;
    }
    match file_digest(&live.path) {
        Ok(digest) => digest != entry.sha256,
        Err(_) => true,
    }
}

#[cfg(test)]
#[path = "diff_tests.rs"]
mod tests;
