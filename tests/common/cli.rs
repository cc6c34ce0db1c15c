//! Helpers for driving the `bt` binary in a scratch workspace.

use std::ffi::OsStr;
use std::path::PathBuf;
use std::process::ExitStatus;

use assert_cmd::Command;
use tempfile::TempDir;

/// A temporary directory the binary runs in.
pub struct BtWorkspace {
    _dir: TempDir,
    pub root: PathBuf,
}

impl BtWorkspace {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("create temp dir");
        let root = dir.path().to_path_buf();
        Self { _dir: dir, root }
    }

    /// A workspace with `bt init` already run.
    pub fn initialized() -> Self {
        let workspace = Self::new();
        let out = run_bt(&workspace, ["init"], "init");
        assert!(out.status.success(), "init failed: {}", out.stderr);
        workspace
    }

    pub fn bugs_dir(&self) -> PathBuf {
        self.root.join(".bugs")
    }
}

/// Captured process output.
pub struct BtOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

impl BtOutput {
    /// Parse stdout as JSON, panicking with context on failure.
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.stdout)
            .unwrap_or_else(|e| panic!("stdout is not JSON ({e}): {}", self.stdout))
    }
}

/// Run `bt` in the workspace with a clean environment.
pub fn run_bt<I, S>(workspace: &BtWorkspace, args: I, label: &str) -> BtOutput
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    run_bt_with_env(workspace, args, &[], label)
}

pub fn run_bt_with_env<I, S>(
    workspace: &BtWorkspace,
    args: I,
    env: &[(&str, &str)],
    label: &str,
) -> BtOutput
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut cmd = Command::cargo_bin("bt").expect("bt binary");
    cmd.current_dir(&workspace.root)
        .env_remove("BT_DB")
        .env_remove("BT_ACTOR")
        .env_remove("RUST_LOG")
        .env("USER", "tester")
        .args(args);
    for (key, value) in env {
        cmd.env(key, value);
    }
    let output = cmd.output().expect("run bt");
    let out = BtOutput {
        status: output.status,
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    };
    if !out.status.success() {
        eprintln!("[{label}] stderr:\n{}", out.stderr);
    }
    out
}
