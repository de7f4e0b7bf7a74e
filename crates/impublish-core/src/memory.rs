//! In-process repository backend
//!
//! Keeps records in memory with the same observable semantics as the
//! hosted services: additive uploads, draft/public visibility, DOIs that
//! appear at creation or on reservation depending on the profile. Used for
//! dry runs and tests. Faults can be injected to simulate uploads that are
//! accepted but never show up in the listing (quota exhaustion) or calls
//! that fail outright.

use crate::backend::{BackendError, BackendProfile, RepositoryBackend, SearchQuery, SearchSupport};
use crate::record::{
    remote_name, CreatedRecord, PublicationRecord, RecordDraft, RecordId, RemoteFile, Visibility,
};
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

/// DOI prefix reserved for testing by DataCite
pub const TEST_DOI_PREFIX: &str = "10.5072";

#[derive(Default)]
struct MemoryState {
    next_record: u64,
    next_file: u64,
    records: BTreeMap<RecordId, PublicationRecord>,
    calls: Vec<String>,
    dropped_uploads: HashSet<String>,
    failures: HashMap<String, BackendError>,
}

/// Repository backend backed by an in-memory map.
pub struct InMemoryBackend {
    name: String,
    profile: BackendProfile,
    state: RefCell<MemoryState>,
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::with_profile(BackendProfile::default())
    }

    pub fn with_profile(profile: BackendProfile) -> Self {
        Self {
            name: "memory".to_string(),
            profile,
            state: RefCell::new(MemoryState {
                next_record: 1,
                next_file: 1,
                ..Default::default()
            }),
        }
    }

    /// Answer to a different backend name (affects AUTHORS marker lookup)
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Accept uploads of `basename` without storing them
    pub fn drop_uploads_named(&self, basename: impl Into<String>) {
        self.state.borrow_mut().dropped_uploads.insert(basename.into());
    }

    /// Make every call of `operation` fail with `error`
    pub fn fail_operation(&self, operation: &str, error: BackendError) {
        self.state
            .borrow_mut()
            .failures
            .insert(operation.to_string(), error);
    }

    pub fn clear_failures(&self) {
        self.state.borrow_mut().failures.clear();
    }

    /// Seed an existing record
    pub fn insert_record(&self, record: PublicationRecord) {
        self.state
            .borrow_mut()
            .records
            .insert(record.id.clone(), record);
    }

    pub fn record(&self, id: &RecordId) -> Option<PublicationRecord> {
        self.state.borrow().records.get(id).cloned()
    }

    pub fn records(&self) -> Vec<PublicationRecord> {
        self.state.borrow().records.values().cloned().collect()
    }

    /// Log of operations performed, as `operation` or `operation:argument`
    pub fn calls(&self) -> Vec<String> {
        self.state.borrow().calls.clone()
    }

    pub fn count_calls(&self, operation: &str) -> usize {
        self.state
            .borrow()
            .calls
            .iter()
            .filter(|c| c.as_str() == operation || c.starts_with(&format!("{}:", operation)))
            .count()
    }

    fn enter(&self, operation: &str, argument: Option<&str>) -> Result<(), BackendError> {
        let mut state = self.state.borrow_mut();
        match argument {
            Some(arg) => state.calls.push(format!("{}:{}", operation, arg)),
            None => state.calls.push(operation.to_string()),
        }
        match state.failures.get(operation) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn with_record<T>(
        &self,
        id: &RecordId,
        f: impl FnOnce(&mut PublicationRecord) -> T,
    ) -> Result<T, BackendError> {
        let mut state = self.state.borrow_mut();
        state
            .records
            .get_mut(id)
            .map(f)
            .ok_or_else(|| BackendError::http(404, format!("record {} not found", id)))
    }

    fn mint_doi(id: &RecordId) -> String {
        format!("{}/memory.{}", TEST_DOI_PREFIX, id)
    }
}

impl RepositoryBackend for InMemoryBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn profile(&self) -> &BackendProfile {
        &self.profile
    }

    fn create_record(&self, draft: &RecordDraft) -> Result<CreatedRecord, BackendError> {
        self.enter("create_record", Some(&draft.title))?;
        let mut state = self.state.borrow_mut();
        let id = RecordId(state.next_record.to_string());
        state.next_record += 1;

        let mut record = PublicationRecord::new(id.clone(), draft.title.clone(), draft.defined_type);
        record.description = draft.description.clone();
        record.tags = draft.tags.iter().cloned().collect();
        record.categories = draft.categories.iter().cloned().collect();
        if self.profile.doi_at_creation {
            record.doi = Some(Self::mint_doi(&id));
        }
        let doi = record.doi.clone();
        state.records.insert(id.clone(), record);
        Ok(CreatedRecord { id, doi })
    }

    fn reserve_doi(&self, id: &RecordId) -> Result<Option<String>, BackendError> {
        self.enter("reserve_doi", Some(id.as_str()))?;
        self.with_record(id, |record| {
            let minted = Self::mint_doi(&record.id);
            Some(record.doi.get_or_insert(minted).clone())
        })
    }

    fn add_file(&self, id: &RecordId, path: &Path) -> Result<RemoteFile, BackendError> {
        let name = remote_name(path);
        self.enter("add_file", Some(&name))?;
        let size = std::fs::metadata(path)
            .map_err(|e| BackendError::local_io(path, &e))?
            .len();

        let remote_id = {
            let mut state = self.state.borrow_mut();
            let n = state.next_file;
            state.next_file += 1;
            format!("file-{}", n)
        };
        let file = RemoteFile {
            name: name.clone(),
            remote_id,
            size: Some(size),
            checksum: None,
        };

        if self.state.borrow().dropped_uploads.contains(&name) {
            tracing::debug!("Dropping upload of {} to simulate a lost file", name);
            self.with_record(id, |_| ())?;
            return Ok(file);
        }

        let stored = file.clone();
        self.with_record(id, move |record| record.files.push(stored))?;
        Ok(file)
    }

    fn delete_file(&self, id: &RecordId, file_id: &str) -> Result<(), BackendError> {
        self.enter("delete_file", Some(file_id))?;
        let removed = self.with_record(id, |record| {
            let before = record.files.len();
            record.files.retain(|f| f.remote_id != file_id);
            before != record.files.len()
        })?;
        if removed {
            Ok(())
        } else {
            Err(BackendError::http(404, format!("file {} not found", file_id)))
        }
    }

    fn list_files(&self, id: &RecordId) -> Result<Vec<RemoteFile>, BackendError> {
        self.enter("list_files", Some(id.as_str()))?;
        self.with_record(id, |record| record.files.clone())
    }

    fn add_tag(&self, id: &RecordId, tag: &str) -> Result<(), BackendError> {
        self.enter("add_tag", Some(tag))?;
        self.with_record(id, |record| {
            record.tags.insert(tag.to_string());
        })
    }

    fn add_category(&self, id: &RecordId, category: &str) -> Result<(), BackendError> {
        self.enter("add_category", Some(category))?;
        self.with_record(id, |record| {
            record.categories.insert(category.to_string());
        })
    }

    fn add_authors(&self, id: &RecordId, authors: &[String]) -> Result<(), BackendError> {
        self.enter("add_authors", Some(&authors.join(",")))?;
        self.with_record(id, |record| {
            for author in authors {
                if !record.authors.contains(author) {
                    record.authors.push(author.clone());
                }
            }
        })
    }

    fn make_public(&self, id: &RecordId) -> Result<Option<String>, BackendError> {
        self.enter("make_public", Some(id.as_str()))?;
        self.with_record(id, |record| {
            record.visibility = Visibility::Public;
            let minted = Self::mint_doi(&record.id);
            Some(record.doi.get_or_insert(minted).clone())
        })
    }

    fn search(&self, query: &SearchQuery) -> Result<Vec<PublicationRecord>, BackendError> {
        self.enter("search", Some(&query.keyword))?;
        let tag = match self.profile.search {
            SearchSupport::Unsupported => return Err(BackendError::unsupported("search")),
            SearchSupport::KeywordOnly => None,
            SearchSupport::KeywordAndTag => query.tag.as_deref(),
        };
        let keyword = query.keyword.to_lowercase();
        let state = self.state.borrow();
        Ok(state
            .records
            .values()
            .filter(|r| {
                r.title.to_lowercase().contains(&keyword)
                    || r.description.to_lowercase().contains(&keyword)
            })
            .filter(|r| tag.map_or(true, |t| r.tags.contains(t)))
            .cloned()
            .collect())
    }

    fn get_record_details(&self, id: &RecordId) -> Result<Option<PublicationRecord>, BackendError> {
        self.enter("get_record_details", Some(id.as_str()))?;
        Ok(self.state.borrow().records.get(id).cloned())
    }

    fn delete_record(&self, id: &RecordId) -> Result<(), BackendError> {
        self.enter("delete_record", Some(id.as_str()))?;
        match self.state.borrow_mut().records.remove(id) {
            Some(_) => Ok(()),
            None => Err(BackendError::http(404, format!("record {} not found", id))),
        }
    }
}
