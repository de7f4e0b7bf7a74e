//! Error types for impublish-core

use crate::backend::BackendError;
use crate::checksum::ChecksumError;
use crate::observer::PublishStage;
use crate::record::RecordId;
use crate::vcs::VcsError;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for publish operations
pub type Result<T> = std::result::Result<T, PublishError>;

/// Failure of a publish operation.
///
/// Setup problems (configuration, unknown backend) are reported by
/// [`crate::config::ConfigError`] before any operation starts.
#[derive(Error, Debug)]
pub enum PublishError {
    /// The VCS snapshot could not be produced; nothing was created remotely
    #[error("Archive of revision {revision} failed: {source}")]
    Archive {
        revision: String,
        #[source]
        source: VcsError,
    },

    /// Version control query failed (e.g. resolving the current revision)
    #[error("Version control error: {0}")]
    Vcs(#[from] VcsError),

    /// The backend rejected a call
    #[error("Backend rejected {operation} while {stage}: {source}")]
    Backend {
        stage: PublishStage,
        operation: &'static str,
        #[source]
        source: BackendError,
    },

    #[error("Checksum error: {0}")]
    Checksum(#[from] ChecksumError),

    /// Verification found missing files and the policy chose to abort
    #[error(
        "Aborted after verification of record {id}: missing {}{}",
        display_paths(missing),
        rollback_note(*rolled_back)
    )]
    Aborted {
        id: RecordId,
        missing: Vec<PathBuf>,
        rolled_back: bool,
    },

    /// Update requested for a record the backend does not know
    #[error("Record {0} does not exist on the backend")]
    RecordNotFound(RecordId),
}

impl PublishError {
    pub(crate) fn backend(stage: PublishStage, operation: &'static str) -> impl FnOnce(BackendError) -> Self {
        move |source| PublishError::Backend {
            stage,
            operation,
            source,
        }
    }

    /// Whether the operation ended because of the shortfall policy
    pub fn is_aborted(&self) -> bool {
        matches!(self, PublishError::Aborted { .. })
    }
}

fn rollback_note(rolled_back: bool) -> &'static str {
    if rolled_back {
        " (draft deleted)"
    } else {
        ""
    }
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
