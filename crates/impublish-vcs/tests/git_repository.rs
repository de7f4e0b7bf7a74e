//! Git adapter against real temporary repositories.
//!
//! Skipped when `git` is not installed.

use impublish_core::{VcsError, VcsKind, VersionControl};
use impublish_vcs::{detect_vcs, GitRepository};
use std::path::Path;
use std::process::Command;

fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

fn git(dir: &Path, args: &[&str]) {
    let status = Command::new("git")
        .args(args)
        .current_dir(dir)
        .status()
        .unwrap();
    assert!(status.success(), "git {:?} failed", args);
}

fn init_repo(dir: &Path) {
    git(dir, &["init", "-q"]);
    git(dir, &["config", "user.email", "dev@example.org"]);
    git(dir, &["config", "user.name", "Dev"]);
    git(dir, &["config", "commit.gpgsign", "false"]);
    std::fs::write(dir.join("README"), "demo\n").unwrap();
    git(dir, &["add", "README"]);
    git(dir, &["commit", "-q", "-m", "initial"]);
}

#[test]
fn resolves_head_and_archives() {
    if !git_available() {
        eprintln!("git not available, skipping");
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    init_repo(dir.path());

    let repo = GitRepository::open(dir.path()).unwrap();
    assert_eq!(repo.kind(), VcsKind::Git);

    let revision = repo.current_revision().unwrap();
    assert_eq!(revision.len(), 40);
    assert!(revision.chars().all(|c| c.is_ascii_hexdigit()));

    let out = tempfile::tempdir().unwrap();
    let destination = out.path().join("Demo.zip");
    repo.archive(&revision, &destination).unwrap();
    let bytes = std::fs::read(&destination).unwrap();
    assert_eq!(&bytes[..2], b"PK");
}

#[test]
fn subdirectory_opens_the_top_level() {
    if !git_available() {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    init_repo(dir.path());
    let nested = dir.path().join("src");
    std::fs::create_dir(&nested).unwrap();

    let repo = GitRepository::open(&nested).unwrap();
    assert_eq!(
        repo.working_directory().canonicalize().unwrap(),
        dir.path().canonicalize().unwrap()
    );
}

#[test]
fn unknown_revision_without_origin_fails() {
    if !git_available() {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    init_repo(dir.path());
    let repo = GitRepository::open(dir.path()).unwrap();

    let out = tempfile::tempdir().unwrap();
    let destination = out.path().join("missing.zip");
    let err = repo.archive("0000000000000000000000000000000000000000", &destination).unwrap_err();
    assert!(matches!(err, VcsError::Archive { .. }));
    assert!(!destination.exists());
}

#[test]
fn plain_directory_is_not_under_version_control() {
    let dir = tempfile::tempdir().unwrap();
    match detect_vcs(dir.path()) {
        Err(VcsError::NotUnderVersionControl(path)) => assert_eq!(path, dir.path()),
        Err(other) => panic!("unexpected error: {}", other),
        Ok(vcs) => panic!("detected {} in an empty directory", vcs.kind()),
    }
}
