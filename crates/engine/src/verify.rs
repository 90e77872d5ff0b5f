// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Integrity verification: re-hash a snapshot's files against its manifest.

use crate::manifest::{file_digest, Manifest};
use crate::snapshot::{SnapshotError, SnapshotStore};
use glob::Pattern;

/// Outcome of verifying one snapshot.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct VerifyReport {
    pub files_verified: u64,
    pub files_failed: u64,
    pub missing_files: Vec<String>,
    pub corrupted_files: Vec<String>,
    pub errors: Vec<String>,
}

impl VerifyReport {
    pub fn is_clean(&self) -> bool {
        self.files_failed == 0
    }
}

/// Recompute sha-256 for every manifest entry (optionally narrowed by a
/// glob over relative paths) and compare against the recorded digest.
pub fn verify_snapshot(
    store: &SnapshotStore,
    snapshot: &str,
    pattern: Option<&str>,
) -> Result<VerifyReport, SnapshotError> {
    let entry = store.get_by_timestamp(snapshot)?;
    let manifest = Manifest::load(&entry.path)?;

    let pattern = match pattern {
        Some(p) => Some(
            Pattern::new(p)
                .map_err(|e| SnapshotError::InvalidPath(format!("bad pattern {p:?}: {e}")))?,
        ),
        None => None,
    };

    let mut report = VerifyReport::default();
    for file in &manifest.entries {
        if let Some(pattern) = &pattern {
            let name = file.path.rsplit('/').next().unwrap_or(&file.path);
            if !pattern.matches(name) && !pattern.matches(&file.path) {
                continue;
            }
        }

        let path = entry.path.join(&file.path);
        if !path.exists() {
            report.missing_files.push(file.path.clone());
            report.files_failed += 1;
            continue;
        }

        match file_digest(&path) {
            Ok(digest) if digest == file.sha256 => report.files_verified += 1,
            Ok(_) => {
                report.corrupted_files.push(file.path.clone());
                report.files_failed += 1;
            }
            Err(e) => {
                report.errors.push(format!("{}: {e}", file.path));
                report.files_failed += 1;
            }
        }
    }

    Ok(report)
}

#[cfg(test)]
#[path = "verify_tests.rs"]
mod tests;
