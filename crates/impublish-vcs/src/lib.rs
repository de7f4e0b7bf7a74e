//! Impublish VCS - Version control adapters
//!
//! Implements [`impublish_core::VersionControl`] for git working trees and
//! Bazaar branches by shelling out to the `git` and `bzr` executables.

mod bzr;
mod command;
mod git;

pub use bzr::BazaarBranch;
pub use git::{archive_url, GitRepository};

use impublish_core::{VcsError, VersionControl};
use std::path::Path;

/// Detect the version control system managing `path`: git first, then bzr.
pub fn detect_vcs(path: &Path) -> Result<Box<dyn VersionControl>, VcsError> {
    if let Ok(repo) = GitRepository::open(path) {
        tracing::info!("Git working tree found at {}", repo.root().display());
        return Ok(Box::new(repo));
    }
    if let Ok(branch) = BazaarBranch::open(path) {
        tracing::info!("Bazaar branch found at {}", branch.working_directory().display());
        return Ok(Box::new(branch));
    }
    Err(VcsError::NotUnderVersionControl(path.to_path_buf()))
}
