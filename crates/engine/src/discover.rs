// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Auto-discovery of developer projects and backup destinations.
//!
//! Projects are identified by marker files checked in priority order;
//! a matched directory is recorded and not descended into. Destinations
//! are ranked by type and free-space ratio.

use crate::space::estimate_backup_size;
use bak_core::ExcludeSet;
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Kind of developer project, by marker priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectType {
    Python,
    Node,
    Rust,
    Go,
    Xcode,
    Generic,
}

impl ProjectType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectType::Python => "python",
            ProjectType::Node => "node",
            ProjectType::Rust => "rust",
            ProjectType::Go => "go",
            ProjectType::Xcode => "xcode",
            ProjectType::Generic => "generic",
        }
    }
}

/// Marker files per project type, in detection priority order.
const PROJECT_MARKERS: &[(ProjectType, &[&str])] = &[
    (
        ProjectType::Python,
        &["pyproject.toml", "setup.py", "requirements.txt", "Pipfile"],
    ),
    (ProjectType::Node, &["package.json"]),
    (ProjectType::Rust, &["Cargo.toml"]),
    (ProjectType::Go, &["go.mod"]),
    (ProjectType::Xcode, &[".xcodeproj", ".xcworkspace"]),
    (ProjectType::Generic, &[".git"]),
];

/// Directory names never descended into while scanning.
const EXCLUDE_DIRS: &[&str] = &[
    "node_modules",
    ".git",
    "__pycache__",
    "build",
    "dist",
    ".next",
    "target",
    ".venv",
    "venv",
    ".cache",
    ".pytest_cache",
    ".mypy_cache",
    ".tox",
    ".eggs",
    "*.egg-info",
    ".gradle",
    ".idea",
    ".vscode",
    "Pods",
    "DerivedData",
    ".build",
    "vendor",
    "coverage",
    ".nyc_output",
    "tmp",
    "temp",
    "logs",
];

/// Candidate local backup folder names.
const LOCAL_BACKUP_FOLDERS: &[&str] = &["Backups", "Backup", "DevBackups", "devbackup"];

/// Destinations below this free space are not viable (1 GiB).
const MIN_DESTINATION_SPACE: u64 = 1024 * 1024 * 1024;

/// A discovered project directory.
#[derive(Debug, Clone, Serialize)]
pub struct DiscoveredProject {
    pub path: PathBuf,
    pub name: String,
    pub project_type: ProjectType,
    pub estimated_size_bytes: u64,
    pub marker_files: Vec<String>,
}

/// Kind of backup destination, ordered by recommendation base score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DestinationType {
    External,
    Network,
    Icloud,
    Local,
}

impl DestinationType {
    pub fn base_score(&self) -> i64 {
        match self {
            DestinationType::External => 90,
            DestinationType::Network => 70,
            DestinationType::Icloud => 50,
            DestinationType::Local => 30,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DestinationType::External => "external",
            DestinationType::Network => "network",
            DestinationType::Icloud => "icloud",
            DestinationType::Local => "local",
        }
    }
}

/// A discovered backup destination.
#[derive(Debug, Clone, Serialize)]
pub struct DiscoveredDestination {
    pub path: PathBuf,
    pub name: String,
    pub destination_type: DestinationType,
    pub available_bytes: u64,
    pub total_bytes: u64,
    pub is_removable: bool,
    /// 1–100, higher is better
    pub recommendation_score: i64,
}

/// Scan parameters; defaults mirror the common developer layout.
#[derive(Debug, Clone)]
pub struct DiscoverOptions {
    pub scan_locations: Vec<PathBuf>,
    pub exclude_dirs: Vec<String>,
    pub max_depth: usize,
}

impl Default for DiscoverOptions {
    fn default() -> Self {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        Self {
            scan_locations: ["Documents", "Desktop", "Projects", "Code", "Developer"]
                .iter()
                .map(|d| home.join(d))
                .collect(),
            exclude_dirs: EXCLUDE_DIRS.iter().map(|s| s.to_string()).collect(),
            max_depth: 3,
        }
    }
}

impl DiscoverOptions {
    fn exclude_set(&self) -> ExcludeSet {
        ExcludeSet::new(&self.exclude_dirs)
    }
}

/// Scan for projects. A provided workspace is scanned first and its
/// projects lead the result; duplicates are dropped by canonical path.
pub fn discover_projects(
    options: &DiscoverOptions,
    workspace: Option<&Path>,
) -> Vec<DiscoveredProject> {
    let excludes = options.exclude_set();
    let mut seen: HashSet<PathBuf> = HashSet::new();
    let mut projects = Vec::new();

    if let Some(workspace) = workspace {
        if workspace.is_dir() {
            scan_directory(
                workspace,
                0,
                options.max_depth,
                &excludes,
                &mut seen,
                &mut projects,
            );
        }
    }

    for location in &options.scan_locations {
        if !location.is_dir() {
            continue;
        }
        if workspace.is_some_and(|w| same_path(w, location)) {
            continue;
        }
        scan_directory(
            location,
            0,
            options.max_depth,
            &excludes,
            &mut seen,
            &mut projects,
        );
    }

    projects
}

fn same_path(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

fn scan_directory(
    dir: &Path,
    depth: usize,
    max_depth: usize,
    excludes: &ExcludeSet,
    seen: &mut HashSet<PathBuf>,
    projects: &mut Vec<DiscoveredProject>,
) {
    if depth > max_depth {
        return;
    }

    if let Some((project_type, markers)) = detect_project_type(dir) {
        let canonical = dir.canonicalize().unwrap_or_else(|_| dir.to_path_buf());
        if !seen.insert(canonical) {
            return;
        }
        let name = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| dir.display().to_string());
        projects.push(DiscoveredProject {
            path: dir.to_path_buf(),
            name,
            project_type,
            estimated_size_bytes: estimate_backup_size(
                &[dir.to_path_buf()],
                &discovery_size_excludes(),
            ),
            marker_files: markers,
        });
        // A project root is a leaf of the scan
        return;
    }

    let Ok(entries) = std::fs::read_dir(dir) else {
        debug!(path = %dir.display(), "unreadable, skipping");
        return;
    };
    let mut children: Vec<_> = entries.filter_map(|e| e.ok()).collect();
    children.sort_by_key(|e| e.file_name());

    for child in children {
        let Ok(file_type) = child.file_type() else {
            continue;
        };
        // Never follow symlinks: a link to a directory is not descended
        if file_type.is_symlink() || !file_type.is_dir() {
            continue;
        }
        let name = child.file_name();
        let name = name.to_string_lossy();
        if name.starts_with('.') || excludes.matches_name(&name, true) {
            continue;
        }
        scan_directory(
            &child.path(),
            depth + 1,
            max_depth,
            excludes,
            seen,
            projects,
        );
    }
}

fn discovery_size_excludes() -> ExcludeSet {
    let patterns: Vec<String> = EXCLUDE_DIRS.iter().map(|s| format!("{s}/")).collect();
    ExcludeSet::new(&patterns)
}

/// Check marker files in priority order; the first matching type wins but
/// every marker found is reported.
fn detect_project_type(dir: &Path) -> Option<(ProjectType, Vec<String>)> {
    let mut detected: Option<ProjectType> = None;
    let mut found = Vec::new();

    for (project_type, markers) in PROJECT_MARKERS {
        for marker in *markers {
            if let Some(name) = marker_present(dir, marker) {
                found.push(name);
                if detected.is_none() {
                    detected = Some(*project_type);
                }
            }
        }
    }

    detected.map(|t| (t, found))
}

/// Dotted markers like `.xcodeproj` match any entry with that suffix;
/// everything else must exist by exact name.
fn marker_present(dir: &Path, marker: &str) -> Option<String> {
    if marker == ".xcodeproj" || marker == ".xcworkspace" {
        let entries = std::fs::read_dir(dir).ok()?;
        for entry in entries.filter_map(|e| e.ok()) {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.ends_with(marker) {
                return Some(name);
            }
        }
        return None;
    }
    if dir.join(marker).exists() {
        return Some(marker.to_string());
    }
    None
}

/// Capacity probe, injectable so destination ranking is testable without
/// controlling the real filesystem.
pub trait CapacityProbe {
    /// (available, total) bytes for a path (or its nearest existing
    /// ancestor).
    fn capacity(&self, path: &Path) -> (u64, u64);
}

/// fs2-backed probe used in production.
#[derive(Default)]
pub struct DiskCapacityProbe;

impl CapacityProbe for DiskCapacityProbe {
    fn capacity(&self, path: &Path) -> (u64, u64) {
        let mut probe = path;
        while !probe.exists() {
            match probe.parent() {
                Some(parent) if parent != probe => probe = parent,
                _ => return (0, 0),
            }
        }
        let available = fs2::available_space(probe).unwrap_or(0);
        let total = fs2::total_space(probe).unwrap_or(0);
        (available, total)
    }
}

/// Where to look for destinations.
#[derive(Debug, Clone)]
pub struct DestinationRoots {
    /// Mounted-volume parents (`/Volumes`, `/run/media/<user>`, …)
    pub volume_roots: Vec<PathBuf>,
    /// Well-known cloud-drive directory
    pub cloud_path: Option<PathBuf>,
    /// Bases searched for candidate local backup folders
    pub local_bases: Vec<PathBuf>,
}

impl Default for DestinationRoots {
    fn default() -> Self {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        let mut volume_roots = vec![PathBuf::from("/Volumes")];
        if let Some(user) = home.file_name() {
            volume_roots.push(PathBuf::from("/run/media").join(user));
            volume_roots.push(PathBuf::from("/media").join(user));
        }
        Self {
            volume_roots,
            cloud_path: Some(home.join("Library/Mobile Documents/com~apple~CloudDocs")),
            local_bases: vec![home.clone(), home.join("Documents")],
        }
    }
}

/// Names under a volume root that are never backup destinations.
const SKIP_VOLUMES: &[&str] = &["macintosh hd", "system", "data", "preboot", "recovery", "vm"];

/// Classify by path shape. Volume-info probing is an external concern;
/// anything under a volume root that is not a known system volume counts
/// as external.
pub fn classify_destination(path: &Path, volume_roots: &[PathBuf]) -> (DestinationType, bool) {
    let lower = path.to_string_lossy().to_lowercase();

    if lower.contains("mobile documents") || lower.contains("icloud") {
        return (DestinationType::Icloud, false);
    }
    if lower.starts_with("//") || lower.starts_with("/net/") {
        return (DestinationType::Network, false);
    }
    if volume_roots.iter().any(|root| path.starts_with(root)) {
        return (DestinationType::External, true);
    }
    (DestinationType::Local, false)
}

/// `base + ⌊available/total × 10⌋`, clamped to [1, 100].
pub fn recommendation_score(
    destination_type: DestinationType,
    available: u64,
    total: u64,
) -> i64 {
    let bonus = if total > 0 {
        ((available as f64 / total as f64) * 10.0) as i64
    } else {
        0
    };
    (destination_type.base_score() + bonus).clamp(1, 100)
}

/// Discover destinations, sorted by recommendation score descending.
pub fn discover_destinations(
    roots: &DestinationRoots,
    probe: &dyn CapacityProbe,
) -> Vec<DiscoveredDestination> {
    let mut destinations = Vec::new();
    let mut seen: HashSet<PathBuf> = HashSet::new();

    for root in &roots.volume_roots {
        let Ok(entries) = std::fs::read_dir(root) else {
            continue;
        };
        for entry in entries.filter_map(|e| e.ok()) {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') || SKIP_VOLUMES.contains(&name.to_lowercase().as_str()) {
                continue;
            }
            if !entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
                continue;
            }
            push_candidate(
                entry.path(),
                name,
                roots,
                probe,
                &mut seen,
                &mut destinations,
            );
        }
    }

    if let Some(cloud) = &roots.cloud_path {
        if cloud.is_dir() {
            push_candidate(
                cloud.clone(),
                "iCloud Drive".to_string(),
                roots,
                probe,
                &mut seen,
                &mut destinations,
            );
        }
    }

    let mut local_names_seen: HashSet<String> = HashSet::new();
    for base in &roots.local_bases {
        if !base.is_dir() {
            continue;
        }
        for folder in LOCAL_BACKUP_FOLDERS {
            if !local_names_seen.insert(folder.to_lowercase()) {
                continue;
            }
            push_candidate(
                base.join(folder),
                folder.to_string(),
                roots,
                probe,
                &mut seen,
                &mut destinations,
            );
        }
    }

    destinations.sort_by(|a, b| b.recommendation_score.cmp(&a.recommendation_score));
    destinations
}

fn push_candidate(
    path: PathBuf,
    name: String,
    roots: &DestinationRoots,
    probe: &dyn CapacityProbe,
    seen: &mut HashSet<PathBuf>,
    out: &mut Vec<DiscoveredDestination>,
) {
    let canonical = path.canonicalize().unwrap_or_else(|_| path.clone());
    if !seen.insert(canonical) {
        return;
    }

    let (available, total) = probe.capacity(&path);
    if available < MIN_DESTINATION_SPACE {
        debug!(path = %path.display(), available, "dropping low-space destination");
        return;
    }

    let (destination_type, is_removable) = classify_destination(&path, &roots.volume_roots);
    let score = recommendation_score(destination_type, available, total);
    out.push(DiscoveredDestination {
        path,
        name,
        destination_type,
        available_bytes: available,
        total_bytes: total,
        is_removable,
        recommendation_score: score,
    });
}

/// Best destination plus a short reason keyed by its type.
pub fn recommend_destination(
    destinations: &[DiscoveredDestination],
) -> Option<(&DiscoveredDestination, String)> {
    let best = destinations.first()?;
    let gib = best.available_bytes as f64 / (1024.0 * 1024.0 * 1024.0);
    let reason = match best.destination_type {
        DestinationType::External => format!(
            "external drive '{}' with {gib:.0} GiB free survives local disk failure",
            best.name
        ),
        DestinationType::Network => format!(
            "network location '{}' with {gib:.0} GiB free keeps backups off this machine",
            best.name
        ),
        DestinationType::Icloud => {
            format!("cloud drive with {gib:.0} GiB free syncs across devices")
        }
        DestinationType::Local => format!(
            "local folder '{}' with {gib:.0} GiB free (no protection from disk failure)",
            best.name
        ),
    };
    Some((best, reason))
}

#[cfg(test)]
#[path = "discover_tests.rs"]
mod tests;
