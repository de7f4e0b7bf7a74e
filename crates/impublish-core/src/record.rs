//! Publication record domain model
//!
//! A record is the remote entity (Figshare article, Zenodo deposition,
//! DSpace item) holding one published software or dataset snapshot.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;

/// Backend-assigned record identifier.
///
/// Opaque to the engine: Figshare and Zenodo use integers, SWORD2 uses an
/// edit IRI.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub String);

impl RecordId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for RecordId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Backend classification of a record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DefinedType {
    Code,
    Dataset,
    Fileset,
}

impl DefinedType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DefinedType::Code => "code",
            DefinedType::Dataset => "dataset",
            DefinedType::Fileset => "fileset",
        }
    }
}

impl fmt::Display for DefinedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Visibility of a record. `Public` is a one-way transition.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Draft,
    Public,
}

/// A file attached to a remote record, keyed by basename.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteFile {
    pub name: String,
    pub remote_id: String,
    pub size: Option<u64>,
    /// Backend-reported checksum, where the backend exposes one
    pub checksum: Option<String>,
}

/// A remote deposit as reported by a backend.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicationRecord {
    pub id: RecordId,
    pub doi: Option<String>,
    pub title: String,
    pub description: String,
    pub defined_type: DefinedType,
    pub tags: BTreeSet<String>,
    pub categories: BTreeSet<String>,
    pub authors: Vec<String>,
    pub visibility: Visibility,
    pub files: Vec<RemoteFile>,
}

impl PublicationRecord {
    /// Create an empty draft record
    pub fn new(id: RecordId, title: impl Into<String>, defined_type: DefinedType) -> Self {
        Self {
            id,
            doi: None,
            title: title.into(),
            description: String::new(),
            defined_type,
            tags: BTreeSet::new(),
            categories: BTreeSet::new(),
            authors: Vec::new(),
            visibility: Visibility::Draft,
            files: Vec::new(),
        }
    }

    /// Look up an attached file by basename
    pub fn file_named(&self, name: &str) -> Option<&RemoteFile> {
        self.files.iter().find(|f| f.name == name)
    }

    pub fn is_public(&self) -> bool {
        self.visibility == Visibility::Public
    }
}

/// Input to [`crate::RepositoryBackend::create_record`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordDraft {
    pub title: String,
    pub description: String,
    pub defined_type: DefinedType,
    pub tags: Vec<String>,
    pub categories: Vec<String>,
}

impl RecordDraft {
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        defined_type: DefinedType,
    ) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            defined_type,
            tags: Vec::new(),
            categories: Vec::new(),
        }
    }
}

/// Result of creating a record. Some backends hand out the DOI right away,
/// others only after a separate reservation call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedRecord {
    pub id: RecordId,
    pub doi: Option<String>,
}

/// Basename of a local path as used for remote file names.
pub fn remote_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}
