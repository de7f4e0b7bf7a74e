//! Version control capability consumed by the reconciler
//!
//! Concrete Git and Bazaar adapters live in `impublish-vcs`.

use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VcsKind {
    Git,
    Bazaar,
}

impl fmt::Display for VcsKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VcsKind::Git => f.write_str("git"),
            VcsKind::Bazaar => f.write_str("bzr"),
        }
    }
}

#[derive(Error, Debug)]
pub enum VcsError {
    #[error(
        "{0} is not under version control (archived downloads such as .zip or .tar.gz usually lack the .git/.bzr directory)"
    )]
    NotUnderVersionControl(PathBuf),

    #[error("`{command}` failed: {message}")]
    Command { command: String, message: String },

    #[error("Could not archive revision {revision}: {message}")]
    Archive { revision: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Access to a version-controlled source tree.
pub trait VersionControl {
    fn kind(&self) -> VcsKind;

    /// Identifier of the checked-out revision (commit SHA, revno)
    fn current_revision(&self) -> Result<String, VcsError>;

    /// Write a zip snapshot of the tree at `revision` to `destination`.
    ///
    /// Adapters may try a fallback source before giving up.
    fn archive(&self, revision: &str, destination: &Path) -> Result<(), VcsError>;

    /// Root of the working tree
    fn working_directory(&self) -> PathBuf;
}

impl<T: VersionControl + ?Sized> VersionControl for Box<T> {
    fn kind(&self) -> VcsKind {
        (**self).kind()
    }

    fn current_revision(&self) -> Result<String, VcsError> {
        (**self).current_revision()
    }

    fn archive(&self, revision: &str, destination: &Path) -> Result<(), VcsError> {
        (**self).archive(revision, destination)
    }

    fn working_directory(&self) -> PathBuf {
        (**self).working_directory()
    }
}
