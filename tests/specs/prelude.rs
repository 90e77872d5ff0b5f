//! Test helpers for behavioral specifications.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, dead_code)]

use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{Duration, Instant};

/// Returns the path to a workspace binary.
///
/// The test binary lives at target/debug/deps/specs-<hash>, so its
/// grandparent is target/debug/ where bak and bakd are built.
fn binary_path(name: &str) -> PathBuf {
    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));

    let standard = manifest_dir.join("target/debug").join(name);
    if standard.exists() {
        return standard;
    }

    if let Ok(exe) = std::env::current_exe() {
        if let Some(debug_dir) = exe.parent().and_then(|d| d.parent()) {
            let fallback = debug_dir.join(name);
            if fallback.exists() {
                return fallback;
            }
        }
    }

    standard
}

pub fn bak_binary() -> PathBuf {
    binary_path("bak")
}

pub fn bakd_binary() -> PathBuf {
    binary_path("bakd")
}

/// An isolated home/state/config environment for one spec.
pub struct Sandbox {
    pub dir: tempfile::TempDir,
    pub config_path: PathBuf,
    pub state_dir: PathBuf,
    pub source: PathBuf,
    pub destination: PathBuf,
}

impl Sandbox {
    /// A sandbox with one source containing `a.txt`.
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("proj");
        std::fs::create_dir_all(&source).unwrap();
        std::fs::write(source.join("a.txt"), "hello").unwrap();

        let destination = dir.path().join("dest");
        let state_dir = dir.path().join("state");
        let config_path = dir.path().join("config.toml");
        std::fs::write(
            &config_path,
            format!(
                "backup_destination = {:?}\nsource_directories = [{:?}]\n\n[retry]\ncount = 1\ndelay_seconds = 0.0\n",
                destination, source
            ),
        )
        .unwrap();

        Self {
            dir,
            config_path,
            state_dir,
            source,
            destination,
        }
    }

    /// Replace the retention section of the config.
    pub fn set_retention(&self, hourly: usize, daily: usize, weekly: usize) {
        let mut text = std::fs::read_to_string(&self.config_path).unwrap();
        text.push_str(&format!(
            "\n[retention]\nhourly = {hourly}\ndaily = {daily}\nweekly = {weekly}\n"
        ));
        std::fs::write(&self.config_path, text).unwrap();
    }

    /// A `bak` command wired to this sandbox.
    pub fn bak(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new(bak_binary());
        cmd.args(args)
            .env("BAK_CONFIG", &self.config_path)
            .env("BAK_STATE_DIR", &self.state_dir)
            .env("HOME", self.dir.path());
        cmd
    }

    /// A `bakd` command wired to this sandbox.
    pub fn bakd(&self) -> Command {
        let mut cmd = Command::new(bakd_binary());
        cmd.env("BAK_CONFIG", &self.config_path)
            .env("BAK_STATE_DIR", &self.state_dir)
            .env("HOME", self.dir.path());
        cmd
    }

    pub fn lock_path(&self) -> PathBuf {
        self.state_dir.join("backup.lock")
    }

    pub fn socket_path(&self) -> PathBuf {
        self.state_dir.join("ipc.sock")
    }

    /// Committed snapshot directory names, newest first.
    pub fn snapshot_names(&self) -> Vec<String> {
        let Ok(entries) = std::fs::read_dir(&self.destination) else {
            return Vec::new();
        };
        let mut names: Vec<String> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|n| bak_core::SnapshotName::parse(n).is_some())
            .collect();
        names.sort();
        names.reverse();
        names
    }

    /// Leftover `in_progress_*` directory names.
    pub fn staging_names(&self) -> Vec<String> {
        let Ok(entries) = std::fs::read_dir(&self.destination) else {
            return Vec::new();
        };
        entries
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|n| n.starts_with("in_progress_"))
            .collect()
    }
}

/// Poll until `check` passes or the timeout elapses.
pub fn wait_until(timeout: Duration, mut check: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if check() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    check()
}
