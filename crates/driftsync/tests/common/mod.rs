//! Shared fixtures driving a real git binary against local repositories.
#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::process::Command;

/// Runs git in `dir`, asserting success, and returns trimmed stdout.
pub fn git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .current_dir(dir)
        .args(args)
        .env("GIT_TERMINAL_PROMPT", "0")
        .output()
        .expect("failed to run git");
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// Runs git in `dir` and reports whether it succeeded.
pub fn git_ok(dir: &Path, args: &[&str]) -> bool {
    Command::new("git")
        .current_dir(dir)
        .args(args)
        .env("GIT_TERMINAL_PROMPT", "0")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Creates a bare origin with seed manifests committed on `master` and
/// returns its path.
pub fn init_origin(root: &Path) -> PathBuf {
    let origin = root.join("origin.git");
    std::fs::create_dir_all(&origin).unwrap();
    git(&origin, &["init", "--bare", "."]);
    git(&origin, &["symbolic-ref", "HEAD", "refs/heads/master"]);

    let seed = root.join("seed");
    std::fs::create_dir_all(&seed).unwrap();
    git(&seed, &["init", "."]);
    git(&seed, &["checkout", "-b", "master"]);
    git(&seed, &["config", "user.name", "Seed"]);
    git(&seed, &["config", "user.email", "seed@example.com"]);
    std::fs::write(seed.join("deployment.yaml"), "replicas: 5\n").unwrap();
    std::fs::write(seed.join("service.yaml"), "port: 80\n").unwrap();
    git(&seed, &["add", "."]);
    git(&seed, &["commit", "-m", "initial manifests"]);
    git(&seed, &["push", origin.to_str().unwrap(), "master"]);

    origin
}

/// Commits a file change to the origin's `master` through a scratch clone
/// and returns the new revision.
pub fn push_change(origin: &Path, file: &str, contents: &str, message: &str) -> String {
    let work = tempfile::tempdir().unwrap();
    let dir = work.path();
    git(dir, &["clone", origin.to_str().unwrap(), "."]);
    git(dir, &["config", "user.name", "Seed"]);
    git(dir, &["config", "user.email", "seed@example.com"]);
    std::fs::write(dir.join(file), contents).unwrap();
    git(dir, &["add", "."]);
    git(dir, &["commit", "-m", message]);
    git(dir, &["push", "origin", "master"]);
    git(dir, &["rev-parse", "HEAD"])
}
