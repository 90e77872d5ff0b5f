// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Snapshot directory naming.
//!
//! Committed snapshots are named `YYYY-MM-DD-HHMMSS`, which makes
//! lexicographic order equal to chronological order. Two runs inside the
//! same second collide on the name; collisions are resolved by appending
//! `_2`, `_3`, … — ordering of parsed names stays chronological because
//! comparison is on the (timestamp, sequence) pair, not the raw string.

use chrono::{DateTime, Local, NaiveDateTime, TimeZone};
use std::fmt;

/// strftime format for snapshot directory names
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d-%H%M%S";

/// Prefix marking an uncommitted staging directory
pub const STAGING_PREFIX: &str = "in_progress_";

/// Parsed name of a committed snapshot directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SnapshotName {
    stamp: NaiveDateTime,
    /// 1 for the bare name, 2+ for `_N`-suffixed collision names
    seq: u32,
}

impl SnapshotName {
    pub fn from_datetime(at: DateTime<Local>) -> Self {
        Self {
            stamp: at.naive_local(),
            seq: 1,
        }
    }

    /// Parse a directory name; returns `None` unless the whole name is a
    /// valid timestamp with an optional `_N` (N ≥ 2) collision suffix.
    pub fn parse(name: &str) -> Option<Self> {
        let (stamp_part, seq) = match name.split_once('_') {
            Some((stamp, suffix)) => {
                let n: u32 = suffix.parse().ok()?;
                if n < 2 {
                    return None;
                }
                (stamp, n)
            }
            None => (name, 1),
        };
        let stamp = NaiveDateTime::parse_from_str(stamp_part, TIMESTAMP_FORMAT).ok()?;
        // parse_from_str tolerates some shorthand; require the canonical form
        if stamp.format(TIMESTAMP_FORMAT).to_string() != stamp_part {
            return None;
        }
        Some(Self { stamp, seq })
    }

    /// The name the next same-second snapshot gets.
    pub fn next_in_sequence(&self) -> Self {
        Self {
            stamp: self.stamp,
            seq: self.seq + 1,
        }
    }

    /// Wall-clock time encoded in the name.
    pub fn datetime(&self) -> DateTime<Local> {
        match Local.from_local_datetime(&self.stamp) {
            chrono::LocalResult::Single(dt) | chrono::LocalResult::Ambiguous(dt, _) => dt,
            chrono::LocalResult::None => Local::now(),
        }
    }

    pub fn naive(&self) -> NaiveDateTime {
        self.stamp
    }

    /// True for the bare (unsuffixed) name.
    pub fn is_primary(&self) -> bool {
        self.seq == 1
    }
}

impl fmt::Display for SnapshotName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.stamp.format(TIMESTAMP_FORMAT))?;
        if self.seq > 1 {
            write!(f, "_{}", self.seq)?;
        }
        Ok(())
    }
}

/// True if the directory name marks uncommitted staging.
pub fn is_staging_name(name: &str) -> bool {
    name.starts_with(STAGING_PREFIX)
}

#[cfg(test)]
#[path = "timestamp_tests.rs"]
mod tests;
