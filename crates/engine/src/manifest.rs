// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-snapshot manifest: the source of truth for integrity verification.
//!
//! Records every regular file in the snapshot with size, mtime, and
//! sha-256. A committed snapshot without a manifest is invalid.

use crate::walk::{walk, EntryKind};
use bak_core::ExcludeSet;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read};
use std::os::unix::fs::MetadataExt;
use std::path::Path;
use thiserror::Error;

/// Manifest file name inside each snapshot directory.
pub const MANIFEST_FILE_NAME: &str = ".devbackup-manifest";

const MANIFEST_VERSION: u32 = 1;

/// Errors from manifest operations
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Snapshot has no manifest")]
    Missing,
}

/// One regular file in a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Path relative to the snapshot root, `/`-separated
    pub path: String,
    pub size: u64,
    /// Modification time, whole seconds since the epoch
    pub mtime: i64,
    /// Hex-encoded sha-256 of the content
    pub sha256: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub version: u32,
    pub created_at: DateTime<Utc>,
    pub entries: Vec<ManifestEntry>,
}

impl Manifest {
    /// Build a manifest by walking a staged snapshot tree, hashing every
    /// regular file. The manifest file itself is not listed.
    pub fn build(root: &Path) -> Result<Self, ManifestError> {
        let mut entries = Vec::new();
        let mut first_error: Option<std::io::Error> = None;

        walk(root, &ExcludeSet::default(), &mut |entry| {
            if entry.kind != EntryKind::File {
                return;
            }
            let rel = entry.rel.to_string_lossy().into_owned();
            if rel == MANIFEST_FILE_NAME {
                return;
            }
            match file_digest(entry.path) {
                Ok(sha256) => entries.push(ManifestEntry {
                    path: rel,
                    size: entry.meta.len(),
                    mtime: entry.meta.mtime(),
                    sha256,
                }),
                Err(e) => {
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        });

        if let Some(e) = first_error {
            return Err(ManifestError::Io(e));
        }

        entries.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(Self {
            version: MANIFEST_VERSION,
            created_at: Utc::now(),
            entries,
        })
    }

    /// Write the manifest into a snapshot root (write to .tmp, then rename).
    pub fn save(&self, snapshot_root: &Path) -> Result<(), ManifestError> {
        let path = snapshot_root.join(MANIFEST_FILE_NAME);
        let tmp_path = path.with_extension("tmp");

        {
            let file = File::create(&tmp_path)?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer(&mut writer, self)?;
            let file = writer.into_inner().map_err(|e| e.into_error())?;
            file.sync_all()?;
        }

        fs::rename(&tmp_path, path)?;
        Ok(())
    }

    /// Load a snapshot's manifest. `ManifestError::Missing` marks the
    /// snapshot invalid.
    pub fn load(snapshot_root: &Path) -> Result<Self, ManifestError> {
        let path = snapshot_root.join(MANIFEST_FILE_NAME);
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ManifestError::Missing)
            }
            Err(e) => return Err(ManifestError::Io(e)),
        };
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }

    pub fn entry(&self, rel_path: &str) -> Option<&ManifestEntry> {
        self.entries.iter().find(|e| e.path == rel_path)
    }
}

/// Streaming sha-256 of a file, hex-encoded.
pub fn file_digest(path: &Path) -> Result<String, std::io::Error> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
#[path = "manifest_tests.rs"]
mod tests;
