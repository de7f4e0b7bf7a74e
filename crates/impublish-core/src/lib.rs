//! Impublish Core - Reconciliation engine for publishing software and data
//!
//! This crate decides *what* to do when a source tree or a set of data files
//! is published to a research data repository:
//!
//! - **Record**: Remote publication records, drafts and attached files
//! - **Backend**: The capability trait every repository service implements,
//!   with per-service quirks expressed as a [`BackendProfile`]
//! - **Checksum**: MD5 sidecar files marking the last uploaded content
//! - **Authors**: `<backend:id>` markers read from an AUTHORS file
//! - **Verification**: Post-upload file listing checks and shortfall policies
//! - **Reconciler**: Duplicate detection, incremental upload, rollback
//! - **Config**: TOML configuration with a legacy `key=value` fallback
//! - **Memory**: An in-process backend for dry runs and tests
//!
//! # Architecture
//!
//! The engine is synchronous. Version control adapters live in
//! `impublish-vcs` and HTTP clients in `impublish-backends`; both plug in
//! through the traits defined here.
//!
//! ```text
//! CLI → Reconciler → RepositoryBackend (figshare | zenodo | dspace | memory)
//!           │
//!           └──────→ VersionControl (git | bzr)
//! ```

pub mod authors;
pub mod backend;
pub mod checksum;
pub mod config;
pub mod error;
pub mod memory;
pub mod observer;
pub mod reconciler;
pub mod record;
pub mod vcs;
pub mod verification;

pub use authors::{parse_author_markers, parse_authors, AUTHORS_FILE_NAME};
pub use backend::{BackendError, BackendProfile, RepositoryBackend, SearchQuery, SearchSupport};
pub use checksum::{ChecksumError, ChecksumTracker, Digest};
pub use config::{
    BackendKind, ConfigError, DSpaceConfig, FigshareConfig, GeneralConfig, ImpublishConfig,
    ZenodoConfig,
};
pub use error::{PublishError, Result};
pub use memory::InMemoryBackend;
pub use observer::{FileEvent, PublishObserver, PublishStage, RecordingObserver, TracingObserver};
pub use reconciler::{software_title, DatasetParameters, PublishOutcome, Reconciler, ReconcilerOptions};
pub use record::{
    remote_name, CreatedRecord, DefinedType, PublicationRecord, RecordDraft, RecordId, RemoteFile,
    Visibility,
};
pub use vcs::{VcsError, VcsKind, VersionControl};
pub use verification::{
    verify_upload, AbortOnShortfall, ContinueOnShortfall, ShortfallDecision, ShortfallPolicy,
    VerificationReport, VerificationShortfall,
};
