// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Smart defaults: synthesize a configuration from discovered projects
//! and a chosen destination.

use crate::discover::{DiscoveredDestination, DiscoveredProject, ProjectType};
use bak_core::Config;
use std::collections::BTreeSet;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DefaultsError {
    #[error("no projects to back up")]
    NoProjects,
}

/// Exclude patterns that apply regardless of project type.
const UNIVERSAL_EXCLUDES: &[&str] = &[
    ".git/",
    ".DS_Store",
    "*.log",
    "*.tmp",
    "*.swp",
    "*.swo",
    "*~",
    ".env.local",
    ".env.*.local",
    "tmp/",
    "temp/",
    "logs/",
    ".idea/",
    ".vscode/",
    "*.bak",
];

fn type_excludes(project_type: ProjectType) -> &'static [&'static str] {
    match project_type {
        ProjectType::Python => &[
            "__pycache__/",
            "*.pyc",
            "*.pyo",
            "*.pyd",
            ".venv/",
            "venv/",
            ".env/",
            "env/",
            ".pytest_cache/",
            ".mypy_cache/",
            ".tox/",
            ".eggs/",
            "*.egg-info/",
            ".coverage",
            "htmlcov/",
            ".hypothesis/",
        ],
        ProjectType::Node => &[
            "node_modules/",
            ".next/",
            ".nuxt/",
            "dist/",
            "build/",
            ".cache/",
            "coverage/",
            ".nyc_output/",
            ".parcel-cache/",
            ".turbo/",
        ],
        ProjectType::Rust => &["target/", "Cargo.lock"],
        ProjectType::Go => &["vendor/", "bin/"],
        ProjectType::Xcode => &[
            "DerivedData/",
            "build/",
            "Pods/",
            ".build/",
            "*.xcuserstate",
        ],
        ProjectType::Generic => &[],
    }
}

/// Exclude patterns for a set of project types: the universal set plus
/// every type-specific set, deduplicated and sorted.
pub fn exclude_patterns_for(types: &BTreeSet<ProjectType>) -> Vec<String> {
    let mut patterns: BTreeSet<&str> = UNIVERSAL_EXCLUDES.iter().copied().collect();
    for project_type in types {
        patterns.extend(type_excludes(*project_type));
    }
    patterns.into_iter().map(String::from).collect()
}

/// Build a complete configuration: project paths become sources, the
/// destination gets a `devbackup` subdirectory, and every other section
/// takes its default (hourly schedule, 24/7/4 retention, retry 3×5 s,
/// failure-only notifications).
pub fn generate_config(
    projects: &[DiscoveredProject],
    destination: &DiscoveredDestination,
) -> Result<Config, DefaultsError> {
    if projects.is_empty() {
        return Err(DefaultsError::NoProjects);
    }

    let types: BTreeSet<ProjectType> = projects.iter().map(|p| p.project_type).collect();

    Ok(Config {
        backup_destination: destination.path.join("devbackup"),
        source_directories: projects.iter().map(|p| p.path.clone()).collect(),
        exclude_patterns: exclude_patterns_for(&types),
        scheduler: Default::default(),
        retention: Default::default(),
        logging: Default::default(),
        retry: Default::default(),
        notifications: Default::default(),
    })
}

#[cfg(test)]
#[path = "defaults_tests.rs"]
mod tests;
