//! Post-upload verification
//!
//! Upload calls can succeed while the file never lands (quota exhaustion is
//! the usual cause), so the only reliable check is the record's file listing
//! afterwards. A missing file is a shortfall, not an error: the caller's
//! [`ShortfallPolicy`] decides whether the operation continues with an
//! unverified record or aborts and rolls back.

use crate::backend::{BackendError, RepositoryBackend};
use crate::record::{remote_name, RecordId};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Files expected on a record but absent from its listing
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerificationShortfall {
    pub record: RecordId,
    pub missing: Vec<PathBuf>,
}

impl VerificationShortfall {
    pub fn missing_names(&self) -> Vec<String> {
        self.missing.iter().map(|p| remote_name(p)).collect()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VerificationReport {
    Verified,
    Shortfall(VerificationShortfall),
}

impl VerificationReport {
    pub fn is_verified(&self) -> bool {
        matches!(self, VerificationReport::Verified)
    }
}

/// Check that every path in `files` has a remote entry with the same basename.
pub fn verify_upload<P: AsRef<Path>>(
    backend: &dyn RepositoryBackend,
    id: &RecordId,
    files: &[P],
) -> Result<VerificationReport, BackendError> {
    if files.is_empty() {
        return Ok(VerificationReport::Verified);
    }
    let remote: HashSet<String> = backend
        .list_files(id)?
        .into_iter()
        .map(|f| f.name)
        .collect();

    let missing: Vec<PathBuf> = files
        .iter()
        .map(|p| p.as_ref())
        .filter(|p| !remote.contains(&remote_name(p)))
        .map(Path::to_path_buf)
        .collect();

    if missing.is_empty() {
        Ok(VerificationReport::Verified)
    } else {
        Ok(VerificationReport::Shortfall(VerificationShortfall {
            record: id.clone(),
            missing,
        }))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShortfallDecision {
    /// Keep the unverified record and carry on
    Continue,
    /// Roll back and stop
    Abort,
}

/// Decides what happens when verification finds missing files.
pub trait ShortfallPolicy {
    fn decide(&self, shortfall: &VerificationShortfall) -> ShortfallDecision;
}

impl<F> ShortfallPolicy for F
where
    F: Fn(&VerificationShortfall) -> ShortfallDecision,
{
    fn decide(&self, shortfall: &VerificationShortfall) -> ShortfallDecision {
        self(shortfall)
    }
}

/// Always abort. The default for non-interactive use.
#[derive(Clone, Copy, Debug, Default)]
pub struct AbortOnShortfall;

impl ShortfallPolicy for AbortOnShortfall {
    fn decide(&self, _shortfall: &VerificationShortfall) -> ShortfallDecision {
        ShortfallDecision::Abort
    }
}

/// Always continue with the unverified record
#[derive(Clone, Copy, Debug, Default)]
pub struct ContinueOnShortfall;

impl ShortfallPolicy for ContinueOnShortfall {
    fn decide(&self, _shortfall: &VerificationShortfall) -> ShortfallDecision {
        ShortfallDecision::Continue
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryBackend;
    use crate::record::{DefinedType, RecordDraft};

    fn backend_with_record() -> (InMemoryBackend, RecordId) {
        let backend = InMemoryBackend::new();
        let id = backend
            .create_record(&RecordDraft::new("t", "d", DefinedType::Fileset))
            .unwrap()
            .id;
        (backend, id)
    }

    #[test]
    fn all_present_is_verified() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.txt");
        std::fs::write(&a, b"a").unwrap();
        let (backend, id) = backend_with_record();
        backend.add_file(&id, &a).unwrap();

        assert_eq!(verify_upload(&backend, &id, &[&a]).unwrap(), VerificationReport::Verified);
    }

    #[test]
    fn matching_is_by_basename() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("nested");
        std::fs::create_dir(&nested).unwrap();
        let local = nested.join("a.txt");
        std::fs::write(&local, b"a").unwrap();
        let (backend, id) = backend_with_record();
        backend.add_file(&id, &local).unwrap();

        let report = verify_upload(&backend, &id, &[PathBuf::from("elsewhere/a.txt")]).unwrap();
        assert!(report.is_verified());
    }

    #[test]
    fn missing_file_is_a_shortfall() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.txt");
        let b = dir.path().join("b.txt");
        std::fs::write(&a, b"a").unwrap();
        std::fs::write(&b, b"b").unwrap();
        let (backend, id) = backend_with_record();
        backend.drop_uploads_named("b.txt");
        backend.add_file(&id, &a).unwrap();
        backend.add_file(&id, &b).unwrap();

        match verify_upload(&backend, &id, &[&a, &b]).unwrap() {
            VerificationReport::Shortfall(shortfall) => {
                assert_eq!(shortfall.missing, vec![b.clone()]);
                assert_eq!(shortfall.missing_names(), vec!["b.txt".to_string()]);
            }
            other => panic!("expected shortfall, got {:?}", other),
        }
    }

    #[test]
    fn nothing_expected_skips_listing() {
        let (backend, id) = backend_with_record();
        let none: [PathBuf; 0] = [];
        assert!(verify_upload(&backend, &id, &none).unwrap().is_verified());
        assert_eq!(backend.count_calls("list_files"), 0);
    }

    #[test]
    fn closures_are_policies() {
        let shortfall = VerificationShortfall {
            record: RecordId::from("1"),
            missing: vec![PathBuf::from("x")],
        };
        let policy = |s: &VerificationShortfall| {
            if s.missing.len() > 1 {
                ShortfallDecision::Abort
            } else {
                ShortfallDecision::Continue
            }
        };
        assert_eq!(policy.decide(&shortfall), ShortfallDecision::Continue);
        assert_eq!(AbortOnShortfall.decide(&shortfall), ShortfallDecision::Abort);
    }
}
