//! Content fingerprints and change detection
//!
//! Each local file `F` that has been uploaded carries a sidecar `F.md5`
//! holding the hex digest of the bytes that were sent. A file is considered
//! modified when the sidecar is missing or no longer matches the content.
//! Only byte content is hashed; timestamps never take part.

use md5::{Digest as _, Md5};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fmt;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default sidecar extension
pub const DEFAULT_SIDECAR_EXTENSION: &str = "md5";

/// Lowercase hex content digest
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Digest(String);

impl Digest {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Error, Debug)]
pub enum ChecksumError {
    #[error("Cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Cannot write checksum sidecar {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Computes digests and manages sidecar files.
#[derive(Clone, Debug)]
pub struct ChecksumTracker {
    extension: String,
}

impl Default for ChecksumTracker {
    fn default() -> Self {
        Self::new(DEFAULT_SIDECAR_EXTENSION)
    }
}

impl ChecksumTracker {
    pub fn new(extension: impl Into<String>) -> Self {
        Self {
            extension: extension.into(),
        }
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Hash the current content of `path`
    pub fn digest(&self, path: &Path) -> Result<Digest, ChecksumError> {
        let read_err = |source| ChecksumError::Read {
            path: path.to_path_buf(),
            source,
        };
        let file = File::open(path).map_err(read_err)?;
        let mut reader = BufReader::new(file);
        let mut hasher = Md5::new();
        let mut buf = [0u8; 64 * 1024];
        loop {
            let n = reader.read(&mut buf).map_err(read_err)?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }
        Ok(Digest(format!("{:x}", hasher.finalize())))
    }

    /// Sidecar location for `path`: the extension is appended, not substituted.
    pub fn sidecar_path(&self, path: &Path) -> PathBuf {
        let mut name: OsString = path.as_os_str().to_owned();
        name.push(".");
        name.push(&self.extension);
        PathBuf::from(name)
    }

    /// Persist the current digest of `path`, replacing any earlier sidecar.
    pub fn record(&self, path: &Path) -> Result<Digest, ChecksumError> {
        let digest = self.digest(path)?;
        let sidecar = self.sidecar_path(path);
        std::fs::write(&sidecar, digest.as_str()).map_err(|source| ChecksumError::Write {
            path: sidecar.clone(),
            source,
        })?;
        tracing::debug!("Recorded checksum {} for {}", digest, path.display());
        Ok(digest)
    }

    /// Digest stored in the sidecar, if one exists
    pub fn stored_digest(&self, path: &Path) -> Result<Option<Digest>, ChecksumError> {
        let sidecar = self.sidecar_path(path);
        match std::fs::read_to_string(&sidecar) {
            Ok(content) => Ok(Some(Digest(content.trim().to_ascii_lowercase()))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(ChecksumError::Read {
                path: sidecar,
                source,
            }),
        }
    }

    /// Whether `path` differs from what was last recorded.
    ///
    /// A path that does not exist locally counts as modified; the upload
    /// stage is where missing files get reported.
    pub fn is_modified(&self, path: &Path) -> Result<bool, ChecksumError> {
        if !path.is_file() {
            return Ok(true);
        }
        match self.stored_digest(path)? {
            None => Ok(true),
            Some(stored) => Ok(self.digest(path)? != stored),
        }
    }

    /// Modified subset of `paths`, in input order. Never writes sidecars.
    pub fn find_modified<P: AsRef<Path>>(&self, paths: &[P]) -> Result<Vec<PathBuf>, ChecksumError> {
        let mut modified = Vec::new();
        for path in paths {
            let path = path.as_ref();
            if self.is_modified(path)? {
                modified.push(path.to_path_buf());
            }
        }
        Ok(modified)
    }
}
