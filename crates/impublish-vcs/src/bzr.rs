//! Bazaar branches

use crate::command::{absolute, first_nonempty_line, run_command};
use impublish_core::{VcsError, VcsKind, VersionControl};
use std::path::{Path, PathBuf};

/// A Bazaar branch, addressed by its root directory. Revisions are revnos.
#[derive(Debug, Clone)]
pub struct BazaarBranch {
    root: PathBuf,
}

impl BazaarBranch {
    /// Open the branch containing `path`.
    pub fn open(path: &Path) -> Result<Self, VcsError> {
        let stdout = run_command("bzr", &["root"], path).map_err(|e| {
            tracing::debug!("{} is not a bzr branch: {}", path.display(), e);
            VcsError::NotUnderVersionControl(path.to_path_buf())
        })?;
        let root = first_nonempty_line(&stdout)
            .ok_or_else(|| VcsError::NotUnderVersionControl(path.to_path_buf()))?;
        Ok(Self {
            root: PathBuf::from(root),
        })
    }
}

impl VersionControl for BazaarBranch {
    fn kind(&self) -> VcsKind {
        VcsKind::Bazaar
    }

    fn current_revision(&self) -> Result<String, VcsError> {
        let stdout = run_command("bzr", &["revno"], &self.root)?;
        first_nonempty_line(&stdout)
            .map(str::to_string)
            .ok_or_else(|| VcsError::Command {
                command: "bzr revno".to_string(),
                message: "empty output".to_string(),
            })
    }

    fn archive(&self, revision: &str, destination: &Path) -> Result<(), VcsError> {
        let destination = absolute(destination)?;
        let dest = destination.to_string_lossy();
        run_command(
            "bzr",
            &["export", "--format=zip", "-r", revision, dest.as_ref()],
            &self.root,
        )
        .map(|_| ())
        .map_err(|e| VcsError::Archive {
            revision: revision.to_string(),
            message: e.to_string(),
        })
    }

    fn working_directory(&self) -> PathBuf {
        self.root.clone()
    }
}
