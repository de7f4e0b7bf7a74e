//! Repository backend capability
//!
//! One trait covers Figshare, Zenodo and DSpace even though the services
//! disagree on when a DOI appears, what search can see, and how metadata is
//! attached. Those differences are carried as [`BackendProfile`] data so the
//! reconciler never branches on which service it is talking to.

use crate::record::{CreatedRecord, DefinedType, PublicationRecord, RecordDraft, RecordId, RemoteFile};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// How far a backend's search can be trusted for duplicate detection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SearchSupport {
    /// Keyword plus tag filter
    KeywordAndTag,
    /// Keyword only; results need an exact title check
    KeywordOnly,
    /// No usable search; dedup always reports "not published"
    Unsupported,
}

/// Backend quirks that drive reconciler decisions.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendProfile {
    pub software_type: DefinedType,
    pub data_type: DefinedType,
    /// DOI is returned by `create_record`; otherwise `reserve_doi` is called
    pub doi_at_creation: bool,
    pub search: SearchSupport,
}

impl Default for BackendProfile {
    fn default() -> Self {
        Self {
            software_type: DefinedType::Code,
            data_type: DefinedType::Dataset,
            doi_at_creation: true,
            search: SearchSupport::KeywordAndTag,
        }
    }
}

impl BackendProfile {
    /// Apply per-backend overrides from configuration.
    pub fn with_overrides(mut self, search: Option<SearchSupport>, doi_at_creation: Option<bool>) -> Self {
        if let Some(search) = search {
            self.search = search;
        }
        if let Some(doi_at_creation) = doi_at_creation {
            self.doi_at_creation = doi_at_creation;
        }
        self
    }
}

/// Search request used for duplicate detection
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchQuery {
    pub keyword: String,
    pub tag: Option<String>,
}

impl SearchQuery {
    pub fn keyword(keyword: impl Into<String>) -> Self {
        Self {
            keyword: keyword.into(),
            tag: None,
        }
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }
}

/// Error code used when a backend does not offer an operation
pub const UNSUPPORTED_CODE: &str = "unsupported";

/// Failure of a single backend call.
///
/// `status` is the HTTP-like status where one exists; 4xx and 5xx are
/// treated alike by the reconciler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendError {
    pub status: Option<u16>,
    pub code: String,
    pub message: String,
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "[{} {}] {}", status, self.code, self.message),
            None => write!(f, "[{}] {}", self.code, self.message),
        }
    }
}

impl std::error::Error for BackendError {}

impl BackendError {
    pub fn new(status: Option<u16>, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            code: code.into(),
            message: message.into(),
        }
    }

    /// Non-success HTTP response
    pub fn http(status: u16, body: impl Into<String>) -> Self {
        let code = match status {
            400 => "bad_request",
            401 => "unauthorized",
            403 => "forbidden",
            404 => "not_found",
            409 => "conflict",
            413 => "payload_too_large",
            422 => "unprocessable",
            429 => "rate_limited",
            500..=599 => "server_error",
            _ => "http_error",
        };
        Self::new(Some(status), code, body)
    }

    /// Connection-level failure (DNS, TLS, timeout)
    pub fn transport(message: impl fmt::Display) -> Self {
        Self::new(None, "transport", message.to_string())
    }

    pub fn unsupported(operation: &str) -> Self {
        Self::new(
            Some(501),
            UNSUPPORTED_CODE,
            format!("{} is not supported by this backend", operation),
        )
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::new(None, "invalid_response", message)
    }

    pub fn local_io(path: &Path, err: &std::io::Error) -> Self {
        Self::new(None, "local_io", format!("{}: {}", path.display(), err))
    }

    pub fn is_not_found(&self) -> bool {
        self.status == Some(404)
    }

    pub fn is_unsupported(&self) -> bool {
        self.code == UNSUPPORTED_CODE
    }
}

/// Operations a repository service exposes to the reconciler.
///
/// All calls block. None of them retry; retry policy belongs to callers.
pub trait RepositoryBackend {
    /// Short lowercase name, also used as the AUTHORS marker prefix
    fn name(&self) -> &str;

    fn profile(&self) -> &BackendProfile;

    fn create_record(&self, draft: &RecordDraft) -> Result<CreatedRecord, BackendError>;

    /// Reserve a DOI for a record created without one.
    ///
    /// Backends that hand out DOIs at creation return the existing one.
    fn reserve_doi(&self, id: &RecordId) -> Result<Option<String>, BackendError> {
        Ok(self.get_record_details(id)?.and_then(|r| r.doi))
    }

    fn add_file(&self, id: &RecordId, path: &Path) -> Result<RemoteFile, BackendError>;

    fn delete_file(&self, id: &RecordId, file_id: &str) -> Result<(), BackendError>;

    fn list_files(&self, id: &RecordId) -> Result<Vec<RemoteFile>, BackendError>;

    fn add_tag(&self, id: &RecordId, tag: &str) -> Result<(), BackendError>;

    fn add_category(&self, id: &RecordId, category: &str) -> Result<(), BackendError>;

    fn add_authors(&self, id: &RecordId, authors: &[String]) -> Result<(), BackendError>;

    /// Leave draft state. Irreversible on most services. May return the
    /// final DOI.
    fn make_public(&self, id: &RecordId) -> Result<Option<String>, BackendError>;

    fn search(&self, _query: &SearchQuery) -> Result<Vec<PublicationRecord>, BackendError> {
        Err(BackendError::unsupported("search"))
    }

    /// `Ok(None)` when the record does not exist
    fn get_record_details(&self, id: &RecordId) -> Result<Option<PublicationRecord>, BackendError>;

    fn delete_record(&self, id: &RecordId) -> Result<(), BackendError>;
}
