//! Shared fixtures for reconciler integration tests

#![allow(dead_code)]

use impublish_core::{VcsError, VcsKind, VersionControl};
use std::cell::Cell;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Version control stand-in that writes a small file as its "archive".
pub struct FakeVcs {
    pub root: PathBuf,
    pub revision: String,
    pub fail_archive: bool,
    pub archive_calls: Cell<usize>,
}

impl FakeVcs {
    pub fn new(root: &Path, revision: &str) -> Self {
        Self {
            root: root.to_path_buf(),
            revision: revision.to_string(),
            fail_archive: false,
            archive_calls: Cell::new(0),
        }
    }

    pub fn failing(root: &Path, revision: &str) -> Self {
        Self {
            fail_archive: true,
            ..Self::new(root, revision)
        }
    }
}

impl VersionControl for FakeVcs {
    fn kind(&self) -> VcsKind {
        VcsKind::Git
    }

    fn current_revision(&self) -> Result<String, VcsError> {
        Ok(self.revision.clone())
    }

    fn archive(&self, revision: &str, destination: &Path) -> Result<(), VcsError> {
        self.archive_calls.set(self.archive_calls.get() + 1);
        if self.fail_archive {
            return Err(VcsError::Archive {
                revision: revision.to_string(),
                message: "unknown revision".to_string(),
            });
        }
        std::fs::write(destination, format!("PK snapshot of {}", revision))?;
        Ok(())
    }

    fn working_directory(&self) -> PathBuf {
        self.root.clone()
    }
}

/// A source tree directory and a separate staging directory
pub struct Workspace {
    pub source: TempDir,
    pub staging: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        Self {
            source: tempfile::tempdir().unwrap(),
            staging: tempfile::tempdir().unwrap(),
        }
    }

    pub fn options(&self) -> impublish_core::ReconcilerOptions {
        impublish_core::ReconcilerOptions {
            staging_dir: self.staging.path().to_path_buf(),
            ..Default::default()
        }
    }

    pub fn write_source(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.source.path().join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }
}
