// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Exclude pattern matching.
//!
//! Patterns are globs matched per path component. A trailing `/` restricts
//! a pattern to directories. Patterns containing `/` are additionally
//! matched against the path relative to the walk root.

use glob::Pattern;
use std::path::Path;

#[derive(Debug, Clone)]
struct Rule {
    pattern: Pattern,
    dir_only: bool,
}

/// Compiled set of exclude patterns.
#[derive(Debug, Clone, Default)]
pub struct ExcludeSet {
    rules: Vec<Rule>,
}

impl ExcludeSet {
    /// Compile patterns. Invalid globs are dropped; exclusion is advisory
    /// and a bad pattern must not abort a backup.
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Self {
        let rules = patterns
            .iter()
            .filter_map(|raw| {
                let raw = raw.as_ref();
                let dir_only = raw.ends_with('/');
                let trimmed = raw.trim_end_matches('/');
                if trimmed.is_empty() {
                    return None;
                }
                Pattern::new(trimmed).ok().map(|pattern| Rule {
                    pattern,
                    dir_only,
                })
            })
            .collect();
        Self { rules }
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Match a single path component (file or directory name).
    pub fn matches_name(&self, name: &str, is_dir: bool) -> bool {
        self.rules.iter().any(|rule| {
            if rule.dir_only && !is_dir {
                return false;
            }
            rule.pattern.matches(name)
        })
    }

    /// Match a path relative to the walk root: the final component, any
    /// intermediate component, or the relative path as a whole.
    pub fn is_excluded(&self, rel_path: &Path, is_dir: bool) -> bool {
        if self.rules.is_empty() {
            return false;
        }

        if let Some(name) = rel_path.file_name().and_then(|n| n.to_str()) {
            if self.matches_name(name, is_dir) {
                return true;
            }
        }

        // Ancestor components are directories by construction
        for component in rel_path.components().rev().skip(1) {
            if let Some(name) = component.as_os_str().to_str() {
                if self.matches_name(name, true) {
                    return true;
                }
            }
        }

        let rel = rel_path.to_string_lossy();
        self.rules.iter().any(|rule| {
            if rule.dir_only && !is_dir {
                return false;
            }
            rule.pattern.matches(&rel)
        })
    }
}

#[cfg(test)]
#[path = "exclude_tests.rs"]
mod tests;
