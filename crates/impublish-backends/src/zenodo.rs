//! Zenodo backend (deposit API)
//!
//! API docs: https://developers.zenodo.org/
//! Auth: personal access token with `deposit:write` and `deposit:actions`
//!
//! Depositions are created with `prereserve_doi`, so the DOI is known from
//! the start. Metadata changes are read-modify-write on the whole metadata
//! object: fields this backend does not manage are sent back untouched.

use crate::http::{parse_json, Auth, RestClient};
use impublish_core::{
    remote_name, BackendError, BackendProfile, CreatedRecord, DefinedType, PublicationRecord,
    RecordDraft, RecordId, RemoteFile, RepositoryBackend, SearchQuery, SearchSupport, Visibility,
    ZenodoConfig,
};
use reqwest::blocking::multipart::Form;
use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct Deposition {
    id: u64,
    #[serde(default)]
    doi: Option<String>,
    #[serde(default)]
    submitted: bool,
    #[serde(default)]
    metadata: DepositionMetadata,
    #[serde(default)]
    files: Vec<DepositionFile>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DepositionMetadata {
    title: String,
    description: Option<String>,
    upload_type: Option<String>,
    keywords: Vec<String>,
    communities: Vec<Community>,
    creators: Vec<Creator>,
    doi: Option<String>,
    /// `true` in requests, `{doi, recid}` in responses
    prereserve_doi: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct Community {
    identifier: String,
}

#[derive(Debug, Deserialize)]
struct Creator {
    name: String,
}

#[derive(Debug, Deserialize)]
struct DepositionFile {
    id: String,
    filename: String,
    #[serde(default)]
    filesize: Option<u64>,
    #[serde(default)]
    checksum: Option<String>,
}

/// Default quirks: DOI at creation, keyword plus tag search.
pub fn zenodo_profile() -> BackendProfile {
    BackendProfile {
        software_type: DefinedType::Code,
        data_type: DefinedType::Dataset,
        doi_at_creation: true,
        search: SearchSupport::KeywordAndTag,
    }
}

pub struct ZenodoBackend {
    http: RestClient,
    profile: BackendProfile,
}

impl ZenodoBackend {
    pub fn new(config: &ZenodoConfig, timeout: Duration) -> Result<Self, BackendError> {
        Ok(Self {
            http: RestClient::new(&config.base_url, Auth::Bearer(config.token.clone()), timeout)?,
            profile: zenodo_profile().with_overrides(config.search, config.doi_at_creation),
        })
    }

    fn deposition_path(id: &RecordId) -> String {
        format!("deposit/depositions/{}", id)
    }

    /// Apply `edit` to the deposition's metadata object and store it back.
    fn update_metadata(&self, id: &RecordId, edit: impl FnOnce(&mut Map<String, Value>)) -> Result<(), BackendError> {
        let mut deposition: Value = self.http.get_json(&Self::deposition_path(id))?;
        let metadata = deposition
            .get_mut("metadata")
            .and_then(Value::as_object_mut)
            .ok_or_else(|| BackendError::invalid_response("Deposition has no metadata object"))?;
        edit(metadata);
        let body = json!({ "metadata": metadata });
        self.http.send_empty(
            self.http
                .request(Method::PUT, &Self::deposition_path(id))
                .json(&body),
        )
    }
}

impl RepositoryBackend for ZenodoBackend {
    fn name(&self) -> &str {
        "zenodo"
    }

    fn profile(&self) -> &BackendProfile {
        &self.profile
    }

    fn create_record(&self, draft: &RecordDraft) -> Result<CreatedRecord, BackendError> {
        let mut metadata = json!({
            "title": draft.title,
            "description": draft.description,
            "upload_type": zenodo_upload_type(draft.defined_type),
            "prereserve_doi": true,
        });
        if !draft.tags.is_empty() {
            metadata["keywords"] = json!(draft.tags);
        }
        if !draft.categories.is_empty() {
            metadata["communities"] = json!(draft
                .categories
                .iter()
                .map(|c| json!({ "identifier": c }))
                .collect::<Vec<_>>());
        }

        let body = self.http.send_text(
            self.http
                .request(Method::POST, "deposit/depositions")
                .json(&json!({ "metadata": metadata })),
        )?;
        let deposition: Deposition = parse_json(&body)?;
        Ok(CreatedRecord {
            id: RecordId::new(deposition.id.to_string()),
            doi: deposition_doi(&deposition),
        })
    }

    fn add_file(&self, id: &RecordId, path: &Path) -> Result<RemoteFile, BackendError> {
        let name = remote_name(path);
        let form = Form::new()
            .text("name", name.clone())
            .file("file", path)
            .map_err(|e| BackendError::local_io(path, &e))?;
        let uploaded: DepositionFile = self.http.send_json(
            self.http
                .request(Method::POST, &format!("{}/files", Self::deposition_path(id)))
                .multipart(form),
        )?;
        tracing::debug!("Uploaded {} as Zenodo file {}", name, uploaded.id);
        Ok(remote_file(uploaded))
    }

    fn delete_file(&self, id: &RecordId, file_id: &str) -> Result<(), BackendError> {
        self.http.send_empty(self.http.request(
            Method::DELETE,
            &format!("{}/files/{}", Self::deposition_path(id), file_id),
        ))
    }

    fn list_files(&self, id: &RecordId) -> Result<Vec<RemoteFile>, BackendError> {
        let files: Vec<DepositionFile> = self
            .http
            .get_json(&format!("{}/files", Self::deposition_path(id)))?;
        Ok(files.into_iter().map(remote_file).collect())
    }

    fn add_tag(&self, id: &RecordId, tag: &str) -> Result<(), BackendError> {
        self.update_metadata(id, |metadata| {
            push_unique(metadata, "keywords", json!(tag));
        })
    }

    fn add_category(&self, id: &RecordId, category: &str) -> Result<(), BackendError> {
        self.update_metadata(id, |metadata| {
            push_unique(metadata, "communities", json!({ "identifier": category }));
        })
    }

    fn add_authors(&self, id: &RecordId, authors: &[String]) -> Result<(), BackendError> {
        self.update_metadata(id, |metadata| {
            for author in authors {
                push_unique(metadata, "creators", creator(author));
            }
        })
    }

    fn make_public(&self, id: &RecordId) -> Result<Option<String>, BackendError> {
        let body = self.http.send_text(self.http.request(
            Method::POST,
            &format!("{}/actions/publish", Self::deposition_path(id)),
        ))?;
        let deposition: Deposition = parse_json(&body)?;
        Ok(deposition_doi(&deposition))
    }

    fn search(&self, query: &SearchQuery) -> Result<Vec<PublicationRecord>, BackendError> {
        let q = search_expression(query);
        let body = self.http.send_text(
            self.http
                .request(Method::GET, "deposit/depositions")
                .query(&[("q", q.as_str()), ("size", "100")]),
        )?;
        parse_depositions(&body)
    }

    fn get_record_details(&self, id: &RecordId) -> Result<Option<PublicationRecord>, BackendError> {
        let deposition: Option<Deposition> = self.http.get_optional_json(&Self::deposition_path(id))?;
        Ok(deposition.map(deposition_record))
    }

    fn delete_record(&self, id: &RecordId) -> Result<(), BackendError> {
        self.http
            .send_empty(self.http.request(Method::DELETE, &Self::deposition_path(id)))
    }
}

fn zenodo_upload_type(defined_type: DefinedType) -> &'static str {
    match defined_type {
        DefinedType::Code => "software",
        DefinedType::Dataset | DefinedType::Fileset => "dataset",
    }
}

/// `title:"<keyword>"`, plus `AND keywords:"<tag>"` when a tag is given
pub fn search_expression(query: &SearchQuery) -> String {
    let quote = |s: &str| s.replace('\\', "\\\\").replace('"', "\\\"");
    let mut q = format!("title:\"{}\"", quote(&query.keyword));
    if let Some(tag) = &query.tag {
        q.push_str(&format!(" AND keywords:\"{}\"", quote(tag)));
    }
    q
}

/// Build a creator from `Name;Affiliation[;ORCID]`
fn creator(marker: &str) -> Value {
    let mut parts = marker.split(';').map(str::trim);
    let mut creator = Map::new();
    creator.insert("name".to_string(), json!(parts.next().unwrap_or_default()));
    if let Some(affiliation) = parts.next().filter(|a| !a.is_empty()) {
        creator.insert("affiliation".to_string(), json!(affiliation));
    }
    if let Some(orcid) = parts.next().filter(|o| !o.is_empty()) {
        creator.insert("orcid".to_string(), json!(orcid));
    }
    Value::Object(creator)
}

fn push_unique(metadata: &mut Map<String, Value>, field: &str, value: Value) {
    let entry = metadata
        .entry(field.to_string())
        .or_insert_with(|| Value::Array(Vec::new()));
    if !entry.is_array() {
        *entry = Value::Array(Vec::new());
    }
    if let Value::Array(items) = entry {
        if !items.contains(&value) {
            items.push(value);
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|v| !v.is_empty()).map(str::to_string)
}

fn deposition_doi(deposition: &Deposition) -> Option<String> {
    non_empty(deposition.doi.as_deref())
        .or_else(|| non_empty(deposition.metadata.doi.as_deref()))
        .or_else(|| {
            non_empty(
                deposition
                    .metadata
                    .prereserve_doi
                    .as_ref()
                    .and_then(|p| p.get("doi"))
                    .and_then(Value::as_str),
            )
        })
}

fn remote_file(file: DepositionFile) -> RemoteFile {
    RemoteFile {
        name: file.filename,
        remote_id: file.id,
        size: file.filesize,
        checksum: file.checksum,
    }
}

fn deposition_record(deposition: Deposition) -> PublicationRecord {
    let doi = deposition_doi(&deposition);
    let metadata = deposition.metadata;
    let defined_type = match metadata.upload_type.as_deref() {
        Some("software") => DefinedType::Code,
        _ => DefinedType::Dataset,
    };
    let mut record = PublicationRecord::new(
        RecordId::new(deposition.id.to_string()),
        metadata.title,
        defined_type,
    );
    record.doi = doi;
    record.description = metadata.description.unwrap_or_default();
    record.tags = metadata.keywords.into_iter().collect();
    record.categories = metadata.communities.into_iter().map(|c| c.identifier).collect();
    record.authors = metadata.creators.into_iter().map(|c| c.name).collect();
    record.visibility = if deposition.submitted {
        Visibility::Public
    } else {
        Visibility::Draft
    };
    record.files = deposition.files.into_iter().map(remote_file).collect();
    record
}

/// Parse a single deposition document
pub fn parse_deposition(json: &str) -> Result<PublicationRecord, BackendError> {
    parse_json::<Deposition>(json).map(deposition_record)
}

/// Parse a deposition list (search results)
pub fn parse_depositions(json: &str) -> Result<Vec<PublicationRecord>, BackendError> {
    let depositions: Vec<Deposition> = parse_json(json)?;
    Ok(depositions.into_iter().map(deposition_record).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const DRAFT: &str = r#"{
        "id": 1234,
        "doi": "",
        "submitted": false,
        "state": "unsubmitted",
        "metadata": {
            "title": "Demo-abc123",
            "description": "Demo version abc123",
            "upload_type": "software",
            "keywords": ["abc123"],
            "communities": [{"identifier": "ocean-modelling"}],
            "creators": [{"name": "Doe, Jane", "affiliation": "Imperial College London"}],
            "prereserve_doi": {"doi": "10.5281/zenodo.1234", "recid": 1234}
        },
        "files": [{"id": "9f1e", "filename": "Demo-abc123.zip", "filesize": 2048,
                   "checksum": "900150983cd24fb0d6963f7d28e17f72"}]
    }"#;

    #[test]
    fn parses_draft_with_reserved_doi() {
        let record = parse_deposition(DRAFT).unwrap();
        assert_eq!(record.id.as_str(), "1234");
        assert_eq!(record.doi.as_deref(), Some("10.5281/zenodo.1234"));
        assert_eq!(record.defined_type, DefinedType::Code);
        assert_eq!(record.visibility, Visibility::Draft);
        assert!(record.tags.contains("abc123"));
        assert!(record.categories.contains("ocean-modelling"));
        assert_eq!(record.authors, vec!["Doe, Jane".to_string()]);
        assert_eq!(record.file_named("Demo-abc123.zip").unwrap().remote_id, "9f1e");
    }

    #[test]
    fn published_deposition_uses_final_doi() {
        let record = parse_deposition(
            r#"{"id": 7, "doi": "10.5281/zenodo.8", "submitted": true,
                "metadata": {"title": "Tidal run", "upload_type": "dataset",
                             "prereserve_doi": {"doi": "10.5281/zenodo.7"}}}"#,
        )
        .unwrap();
        assert_eq!(record.doi.as_deref(), Some("10.5281/zenodo.8"));
        assert!(record.is_public());
        assert_eq!(record.defined_type, DefinedType::Dataset);
    }

    #[test]
    fn search_results_parse() {
        let results = parse_depositions(&format!("[{}]", DRAFT)).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].title, "Demo-abc123");
    }

    #[rstest]
    #[case(SearchQuery::keyword("Demo-abc123"), r#"title:"Demo-abc123""#)]
    #[case(
        SearchQuery::keyword("Demo-abc123").with_tag("abc123"),
        r#"title:"Demo-abc123" AND keywords:"abc123""#
    )]
    #[case(SearchQuery::keyword("say \"hi\""), r#"title:"say \"hi\"""#)]
    fn search_expressions(#[case] query: SearchQuery, #[case] expected: &str) {
        assert_eq!(search_expression(&query), expected);
    }

    #[rstest]
    #[case("Doe, Jane", json!({"name": "Doe, Jane"}))]
    #[case("Doe, Jane;Imperial College London", json!({"name": "Doe, Jane", "affiliation": "Imperial College London"}))]
    #[case(
        "Doe, Jane; Imperial College London; 0000-0002-1825-0097",
        json!({"name": "Doe, Jane", "affiliation": "Imperial College London", "orcid": "0000-0002-1825-0097"})
    )]
    fn creators_from_markers(#[case] marker: &str, #[case] expected: Value) {
        assert_eq!(creator(marker), expected);
    }

    #[test]
    fn push_unique_skips_duplicates() {
        let mut metadata = Map::new();
        push_unique(&mut metadata, "keywords", json!("abc123"));
        push_unique(&mut metadata, "keywords", json!("abc123"));
        push_unique(&mut metadata, "keywords", json!("v2"));
        assert_eq!(metadata["keywords"], json!(["abc123", "v2"]));
    }
}
