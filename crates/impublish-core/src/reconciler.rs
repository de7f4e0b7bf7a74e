//! Publication reconciler
//!
//! Drives a publish operation end to end against one backend:
//!
//! ```text
//! Searching ─▶ Found (done)
//!     │
//!     └─▶ Archiving ─▶ Creating ─▶ Uploading ─▶ Verifying ─▶ Annotating ─▶ Publishing? ─▶ Done
//!                                                   │
//!                                                   └─▶ RollingBack (policy said abort)
//!
//! Datasets skip Archiving; updates of an existing dataset skip Creating.
//! ```
//!
//! Software is published once per (name, version): a repeated call finds the
//! earlier record and returns its identifiers without touching anything.
//! Datasets are published once and then updated incrementally, re-uploading
//! only files whose content changed since their last upload.

use crate::authors::parse_authors;
use crate::backend::{RepositoryBackend, SearchQuery, SearchSupport};
use crate::checksum::ChecksumTracker;
use crate::error::{PublishError, Result};
use crate::observer::{FileEvent, PublishObserver, PublishStage, TracingObserver};
use crate::record::{remote_name, PublicationRecord, RecordDraft, RecordId, RemoteFile, Visibility};
use crate::vcs::{VcsError, VersionControl};
use crate::verification::{
    verify_upload, AbortOnShortfall, ShortfallDecision, ShortfallPolicy, VerificationReport,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Tunables that do not belong to any particular backend.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcilerOptions {
    /// Directory receiving software archives before upload
    pub staging_dir: PathBuf,
    pub archive_extension: String,
    /// Category attached to every software record
    pub software_category: Option<String>,
}

impl Default for ReconcilerOptions {
    fn default() -> Self {
        Self {
            staging_dir: PathBuf::from("."),
            archive_extension: "zip".to_string(),
            software_category: None,
        }
    }
}

/// What to publish for a dataset
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetParameters {
    pub title: String,
    pub description: String,
    pub files: Vec<PathBuf>,
    pub tags: Vec<String>,
    pub category: Option<String>,
}

/// Result of a publish operation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PublishOutcome {
    pub id: RecordId,
    pub doi: Option<String>,
    /// A new record was created by this call
    pub created: bool,
    pub uploaded: Vec<PathBuf>,
    /// Requested but absent locally
    pub skipped: Vec<PathBuf>,
    /// Unchanged since last upload
    pub unchanged: Vec<PathBuf>,
    /// False when a verification shortfall was accepted
    pub verified: bool,
    pub visibility: Visibility,
}

impl PublishOutcome {
    fn existing(id: RecordId, doi: Option<String>) -> Self {
        Self {
            id,
            doi,
            created: false,
            uploaded: Vec::new(),
            skipped: Vec::new(),
            unchanged: Vec::new(),
            verified: true,
            visibility: Visibility::Draft,
        }
    }
}

/// Orchestrates publish operations against one backend.
pub struct Reconciler<'a> {
    backend: &'a dyn RepositoryBackend,
    tracker: ChecksumTracker,
    policy: Box<dyn ShortfallPolicy + 'a>,
    observer: Box<dyn PublishObserver + 'a>,
    options: ReconcilerOptions,
}

impl<'a> Reconciler<'a> {
    /// Reconciler with MD5 sidecars, abort-on-shortfall and tracing output
    pub fn new(backend: &'a dyn RepositoryBackend) -> Self {
        Self {
            backend,
            tracker: ChecksumTracker::default(),
            policy: Box::new(AbortOnShortfall),
            observer: Box::new(TracingObserver),
            options: ReconcilerOptions::default(),
        }
    }

    pub fn with_tracker(mut self, tracker: ChecksumTracker) -> Self {
        self.tracker = tracker;
        self
    }

    pub fn with_policy(mut self, policy: impl ShortfallPolicy + 'a) -> Self {
        self.policy = Box::new(policy);
        self
    }

    pub fn with_observer(mut self, observer: impl PublishObserver + 'a) -> Self {
        self.observer = Box::new(observer);
        self
    }

    pub fn with_options(mut self, options: ReconcilerOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &ReconcilerOptions {
        &self.options
    }

    pub fn tracker(&self) -> &ChecksumTracker {
        &self.tracker
    }

    /// Look for an earlier publication of `name` at `version`.
    ///
    /// Best effort: a backend without search, or a match without a DOI,
    /// is not an error.
    pub fn find_software(&self, name: &str, version: &str) -> Result<Option<(RecordId, Option<String>)>> {
        let keyword = software_title(name, version);
        let profile = self.backend.profile();
        let query = match profile.search {
            SearchSupport::Unsupported => {
                tracing::info!(
                    "Backend {} cannot search; treating {} as unpublished",
                    self.backend.name(),
                    keyword
                );
                return Ok(None);
            }
            SearchSupport::KeywordOnly => SearchQuery::keyword(&keyword),
            SearchSupport::KeywordAndTag => SearchQuery::keyword(&keyword).with_tag(version),
        };

        let results = match self.backend.search(&query) {
            Ok(results) => results,
            Err(e) if e.is_unsupported() => {
                tracing::warn!("Search unavailable ({}); treating {} as unpublished", e, keyword);
                return Ok(None);
            }
            Err(e) => return Err(PublishError::backend(PublishStage::Searching, "search")(e)),
        };

        // Backend search is fuzzy ("Demo-v1" also finds "Other-Demo-v1"), so
        // the title must match exactly and the version tag, if asked for,
        // must be present.
        let Some(record) = results
            .into_iter()
            .filter(|r| is_same_software(r, &keyword, query.tag.as_deref()))
            .last()
        else {
            return Ok(None);
        };

        tracing::info!("{} has already been published as record {}", keyword, record.id);
        let doi = match record.doi {
            Some(doi) => Some(doi),
            None => match self.backend.get_record_details(&record.id) {
                Ok(details) => details.and_then(|d| d.doi),
                Err(e) => {
                    tracing::warn!("Could not look up DOI of record {}: {}", record.id, e);
                    None
                }
            },
        };
        Ok(Some((record.id, doi)))
    }

    /// Publish the tree managed by `vcs` as `name` at `version` (default: the
    /// current revision).
    pub fn publish_software(
        &self,
        name: &str,
        vcs: &dyn VersionControl,
        version: Option<&str>,
        private: bool,
    ) -> Result<PublishOutcome> {
        let version = match version {
            Some(v) => v.to_string(),
            None => vcs.current_revision()?,
        };
        let span = tracing::info_span!("publish_software", name = %name, version = %version);
        let _enter = span.enter();

        self.observer.stage(PublishStage::Searching);
        if let Some((id, doi)) = self.find_software(name, &version)? {
            self.observer.stage(PublishStage::Found);
            let mut outcome = PublishOutcome::existing(id, doi);
            if let Ok(Some(record)) = self.backend.get_record_details(&outcome.id) {
                outcome.visibility = record.visibility;
            }
            return Ok(outcome);
        }

        // No archive, no record.
        self.observer.stage(PublishStage::Archiving);
        let archive = self.archive_path(name, &version);
        self.build_archive(vcs, &version, &archive)?;

        self.observer.stage(PublishStage::Creating);
        let draft = RecordDraft::new(
            software_title(name, &version),
            format!("{} version {}", name, version),
            self.backend.profile().software_type,
        );
        let (id, mut doi) = self.create(&draft)?;

        self.observer.stage(PublishStage::Uploading);
        self.backend
            .add_file(&id, &archive)
            .map_err(PublishError::backend(PublishStage::Uploading, "add_file"))?;
        self.observer.file(&archive, FileEvent::Uploaded);

        let verified = self.verify(&id, std::slice::from_ref(&archive), true)?;

        self.observer.stage(PublishStage::Annotating);
        let annotate = PublishError::backend(PublishStage::Annotating, "add_tag");
        self.backend.add_tag(&id, &version).map_err(annotate)?;
        if let Some(category) = &self.options.software_category {
            self.backend
                .add_category(&id, category)
                .map_err(PublishError::backend(PublishStage::Annotating, "add_category"))?;
        }
        match parse_authors(&vcs.working_directory(), self.backend.name()) {
            Some(authors) if !authors.is_empty() => {
                self.backend
                    .add_authors(&id, &authors)
                    .map_err(PublishError::backend(PublishStage::Annotating, "add_authors"))?;
            }
            Some(_) => tracing::debug!("AUTHORS has no {} markers", self.backend.name()),
            None => tracing::debug!("No AUTHORS file; publishing without authors"),
        }

        let visibility = self.publish_unless_private(&id, private, &mut doi)?;
        self.observer.stage(PublishStage::Done);

        Ok(PublishOutcome {
            id,
            doi,
            created: true,
            uploaded: vec![archive],
            skipped: Vec::new(),
            unchanged: Vec::new(),
            verified,
            visibility,
        })
    }

    /// Publish a dataset, or update the dataset `pid` with the files whose
    /// content changed since they were last uploaded.
    pub fn publish_data(
        &self,
        parameters: &DatasetParameters,
        pid: Option<&RecordId>,
        private: bool,
    ) -> Result<PublishOutcome> {
        let span = tracing::info_span!("publish_data", title = %parameters.title);
        let _enter = span.enter();

        let (id, mut doi, created, upload_set, remote, tags, categories, visibility) = match pid {
            None => {
                self.observer.stage(PublishStage::Creating);
                let draft = RecordDraft::new(
                    parameters.title.clone(),
                    parameters.description.clone(),
                    self.backend.profile().data_type,
                );
                let (id, doi) = self.create(&draft)?;
                (
                    id,
                    doi,
                    true,
                    parameters.files.clone(),
                    Vec::new(),
                    BTreeSet::new(),
                    BTreeSet::new(),
                    Visibility::Draft,
                )
            }
            Some(pid) => {
                self.observer.stage(PublishStage::Searching);
                let record = self
                    .backend
                    .get_record_details(pid)
                    .map_err(PublishError::backend(PublishStage::Searching, "get_record_details"))?
                    .ok_or_else(|| PublishError::RecordNotFound(pid.clone()))?;
                let modified = self.tracker.find_modified(parameters.files.as_slice())?;
                let remote = self
                    .backend
                    .list_files(pid)
                    .map_err(PublishError::backend(PublishStage::Searching, "list_files"))?;
                (
                    pid.clone(),
                    record.doi,
                    false,
                    modified,
                    remote,
                    record.tags,
                    record.categories,
                    record.visibility,
                )
            }
        };

        let unchanged: Vec<PathBuf> = parameters
            .files
            .iter()
            .filter(|f| !upload_set.contains(*f))
            .cloned()
            .collect();
        for path in &unchanged {
            self.observer.file(path, FileEvent::Unchanged);
        }
        tracing::info!("{} file(s) marked for upload", upload_set.len());

        self.observer.stage(PublishStage::Uploading);
        let (uploaded, skipped) = self.upload_files(&id, &upload_set, &remote)?;

        let verified = self.verify(&id, &uploaded, created)?;

        self.observer.stage(PublishStage::Annotating);
        for tag in parameters.tags.iter().filter(|t| !tags.contains(*t)) {
            self.backend
                .add_tag(&id, tag)
                .map_err(PublishError::backend(PublishStage::Annotating, "add_tag"))?;
        }
        if let Some(category) = parameters.category.as_ref().filter(|c| !categories.contains(*c)) {
            self.backend
                .add_category(&id, category)
                .map_err(PublishError::backend(PublishStage::Annotating, "add_category"))?;
        }

        // A public record with no new content needs no new publish action.
        let visibility = if visibility == Visibility::Public && uploaded.is_empty() {
            Visibility::Public
        } else {
            self.publish_unless_private(&id, private, &mut doi)?
        };
        self.observer.stage(PublishStage::Done);

        Ok(PublishOutcome {
            id,
            doi,
            created,
            uploaded,
            skipped,
            unchanged,
            verified,
            visibility,
        })
    }

    fn archive_path(&self, name: &str, version: &str) -> PathBuf {
        self.options.staging_dir.join(format!(
            "{}.{}",
            software_title(name, version),
            self.options.archive_extension
        ))
    }

    fn build_archive(&self, vcs: &dyn VersionControl, version: &str, archive: &Path) -> Result<()> {
        let archive_err = |source: VcsError| PublishError::Archive {
            revision: version.to_string(),
            source,
        };
        std::fs::create_dir_all(&self.options.staging_dir).map_err(|e| archive_err(e.into()))?;
        vcs.archive(version, archive).map_err(archive_err)?;
        if !archive.is_file() {
            return Err(archive_err(VcsError::Archive {
                revision: version.to_string(),
                message: format!("{} was not written", archive.display()),
            }));
        }
        tracing::info!("Archived {} revision {} to {}", vcs.kind(), version, archive.display());
        Ok(())
    }

    fn create(&self, draft: &RecordDraft) -> Result<(RecordId, Option<String>)> {
        let created = self
            .backend
            .create_record(draft)
            .map_err(PublishError::backend(PublishStage::Creating, "create_record"))?;
        let doi = if created.doi.is_none() && !self.backend.profile().doi_at_creation {
            self.backend
                .reserve_doi(&created.id)
                .map_err(PublishError::backend(PublishStage::Creating, "reserve_doi"))?
        } else {
            created.doi
        };
        match &doi {
            Some(doi) => tracing::info!("Created record {} with DOI {}", created.id, doi),
            None => tracing::info!("Created record {} (no DOI yet)", created.id),
        }
        Ok((created.id, doi))
    }

    /// Upload `paths`, replacing same-named remote files. Returns the paths
    /// attempted and the paths skipped because they do not exist locally.
    fn upload_files(
        &self,
        id: &RecordId,
        paths: &[PathBuf],
        remote: &[RemoteFile],
    ) -> Result<(Vec<PathBuf>, Vec<PathBuf>)> {
        let mut uploaded = Vec::new();
        let mut skipped = Vec::new();

        for path in paths {
            if !path.is_file() {
                self.observer.file(path, FileEvent::SkippedMissing);
                skipped.push(path.clone());
                continue;
            }

            // No backend replaces content atomically: delete, then add.
            let name = remote_name(path);
            let mut replaced = false;
            for existing in remote.iter().filter(|f| f.name == name) {
                self.backend
                    .delete_file(id, &existing.remote_id)
                    .map_err(PublishError::backend(PublishStage::Uploading, "delete_file"))?;
                replaced = true;
            }
            self.backend
                .add_file(id, path)
                .map_err(PublishError::backend(PublishStage::Uploading, "add_file"))?;
            self.tracker.record(path)?;

            let event = if replaced {
                FileEvent::Replaced
            } else {
                FileEvent::Uploaded
            };
            self.observer.file(path, event);
            uploaded.push(path.clone());
        }

        Ok((uploaded, skipped))
    }

    /// Returns whether the record verified. Aborting deletes the record only
    /// when `created_here`.
    fn verify(&self, id: &RecordId, files: &[PathBuf], created_here: bool) -> Result<bool> {
        self.observer.stage(PublishStage::Verifying);
        let report = verify_upload(self.backend, id, files)
            .map_err(PublishError::backend(PublishStage::Verifying, "list_files"))?;

        let shortfall = match report {
            VerificationReport::Verified => return Ok(true),
            VerificationReport::Shortfall(shortfall) => shortfall,
        };
        tracing::warn!(
            "Record {} is missing {} uploaded file(s): {}",
            id,
            shortfall.missing.len(),
            shortfall.missing_names().join(", ")
        );

        match self.policy.decide(&shortfall) {
            ShortfallDecision::Continue => {
                tracing::warn!("Continuing with unverified record {}", id);
                Ok(false)
            }
            ShortfallDecision::Abort => {
                let rolled_back = if created_here {
                    self.observer.stage(PublishStage::RollingBack);
                    self.backend
                        .delete_record(id)
                        .map_err(PublishError::backend(PublishStage::RollingBack, "delete_record"))?;
                    tracing::info!("Deleted draft record {}", id);
                    true
                } else {
                    false
                };
                Err(PublishError::Aborted {
                    id: id.clone(),
                    missing: shortfall.missing,
                    rolled_back,
                })
            }
        }
    }

    fn publish_unless_private(&self, id: &RecordId, private: bool, doi: &mut Option<String>) -> Result<Visibility> {
        if private {
            tracing::info!("Leaving record {} private", id);
            return Ok(Visibility::Draft);
        }
        self.observer.stage(PublishStage::Publishing);
        if let Some(final_doi) = self
            .backend
            .make_public(id)
            .map_err(PublishError::backend(PublishStage::Publishing, "make_public"))?
        {
            *doi = Some(final_doi);
        }
        Ok(Visibility::Public)
    }
}

/// Title (and dedup keyword) of a software record
pub fn software_title(name: &str, version: &str) -> String {
    format!("{}-{}", name, version)
}

fn is_same_software(record: &PublicationRecord, title: &str, tag: Option<&str>) -> bool {
    record.title == title && tag.map_or(true, |t| record.tags.contains(t))
}
