// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Glob search over manifest paths, in one snapshot or across all.

use crate::manifest::{Manifest, ManifestError};
use crate::snapshot::{SnapshotError, SnapshotStore};
use glob::Pattern;
use tracing::debug;

/// One file matched in one snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchMatch {
    /// Snapshot directory name
    pub snapshot: String,
    /// Path relative to the snapshot root
    pub path: String,
    pub size: u64,
    /// Modification time, seconds since the epoch
    pub modified: i64,
}

/// Match `pattern` against relative paths in `snapshot` (or every
/// committed snapshot when omitted), newest snapshot first. The pattern
/// matches either the file name or the whole relative path.
pub fn search_snapshots(
    store: &SnapshotStore,
    pattern: &str,
    snapshot: Option<&str>,
) -> Result<Vec<SearchMatch>, SnapshotError> {
    let pattern = Pattern::new(pattern)
        .map_err(|e| SnapshotError::InvalidPath(format!("bad pattern {pattern:?}: {e}")))?;

    let targets = match snapshot {
        Some(name) => vec![store.get_by_timestamp(name)?],
        None => store.list_snapshots(),
    };

    let mut matches = Vec::new();
    for entry in targets {
        let manifest = match Manifest::load(&entry.path) {
            Ok(manifest) => manifest,
            Err(ManifestError::Missing) => {
                debug!(snapshot = %entry.name, "no manifest, skipping in search");
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        for file in &manifest.entries {
            let name = file.path.rsplit('/').next().unwrap_or(&file.path);
            if pattern.matches(name) || pattern.matches(&file.path) {
                matches.push(SearchMatch {
                    snapshot: entry.name.to_string(),
                    path: file.path.clone(),
                    size: file.size,
                    modified: file.mtime,
                });
            }
        }
    }

    Ok(matches)
}

#[cfg(test)]
#[path = "search_tests.rs"]
mod tests;
