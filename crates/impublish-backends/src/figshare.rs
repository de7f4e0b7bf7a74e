//! Figshare backend (API v2)
//!
//! API docs: https://docs.figshare.com/
//! Auth: personal token, sent as `Authorization: token <t>`
//!
//! Articles are created without a DOI; one is reserved with a separate call.
//! File uploads go through the upload service in several steps: register
//! the file (name, size, MD5), fetch the upload plan, PUT each part, then
//! mark the file complete. Private search matches free text only, so the
//! profile asks the reconciler to check titles itself.

use crate::http::{parse_json, Auth, RestClient};
use impublish_core::{
    BackendError, BackendProfile, ChecksumTracker, CreatedRecord, DefinedType, FigshareConfig,
    PublicationRecord, RecordDraft, RecordId, RemoteFile, RepositoryBackend, SearchQuery,
    SearchSupport, Visibility,
};
use reqwest::Method;
use serde::Deserialize;
use serde_json::json;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct CreatedArticle {
    entity_id: Option<u64>,
    location: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Article {
    id: u64,
    title: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    doi: Option<String>,
    #[serde(default)]
    defined_type_name: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    categories: Vec<Category>,
    #[serde(default)]
    authors: Vec<ArticleAuthor>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    is_public: Option<bool>,
    #[serde(default)]
    files: Vec<ArticleFile>,
}

#[derive(Debug, Deserialize)]
struct Category {
    id: u64,
    title: String,
}

#[derive(Debug, Deserialize)]
struct ArticleAuthor {
    id: Option<u64>,
    full_name: String,
}

#[derive(Debug, Deserialize)]
struct ArticleFile {
    id: u64,
    name: String,
    size: Option<u64>,
    computed_md5: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Location {
    location: String,
}

#[derive(Debug, Deserialize)]
struct PendingFile {
    id: u64,
    upload_url: String,
}

#[derive(Debug, Deserialize)]
struct UploadPlan {
    parts: Vec<UploadPart>,
}

#[derive(Debug, Deserialize)]
struct UploadPart {
    #[serde(rename = "partNo")]
    part_no: u32,
    #[serde(rename = "startOffset")]
    start_offset: u64,
    #[serde(rename = "endOffset")]
    end_offset: u64,
}

#[derive(Debug, Deserialize)]
struct ReservedDoi {
    doi: String,
}

/// Default quirks: software is `code`, data is a `fileset`, DOI reserved
/// after creation, keyword-only search.
pub fn figshare_profile() -> BackendProfile {
    BackendProfile {
        software_type: DefinedType::Code,
        data_type: DefinedType::Fileset,
        doi_at_creation: false,
        search: SearchSupport::KeywordOnly,
    }
}

pub struct FigshareBackend {
    http: RestClient,
    profile: BackendProfile,
}

impl FigshareBackend {
    pub fn new(config: &FigshareConfig, timeout: Duration) -> Result<Self, BackendError> {
        Ok(Self {
            http: RestClient::new(&config.base_url, Auth::Token(config.token.clone()), timeout)?,
            profile: figshare_profile().with_overrides(config.search, config.doi_at_creation),
        })
    }

    fn article_path(id: &RecordId) -> String {
        format!("account/articles/{}", id)
    }

    fn fetch_article(&self, id: &RecordId) -> Result<Option<Article>, BackendError> {
        self.http.get_optional_json(&Self::article_path(id))
    }

    fn require_article(&self, id: &RecordId) -> Result<Article, BackendError> {
        self.fetch_article(id)?
            .ok_or_else(|| BackendError::http(404, format!("article {} not found", id)))
    }

    fn category_id(&self, category: &str) -> Result<u64, BackendError> {
        if let Ok(id) = category.trim().parse::<u64>() {
            return Ok(id);
        }
        let categories: Vec<Category> = self.http.get_json("categories")?;
        find_category(&categories, category).ok_or_else(|| {
            BackendError::new(None, "unknown_category", format!("No Figshare category titled {:?}", category))
        })
    }

    fn upload_parts(&self, path: &Path, upload_url: &str) -> Result<(), BackendError> {
        let plan: UploadPlan = self.http.get_json(upload_url)?;
        let mut file = File::open(path).map_err(|e| BackendError::local_io(path, &e))?;

        for part in plan.parts {
            let length = part.end_offset.saturating_sub(part.start_offset) + 1;
            let mut chunk = vec![0u8; length as usize];
            file.seek(SeekFrom::Start(part.start_offset))
                .and_then(|_| file.read_exact(&mut chunk))
                .map_err(|e| BackendError::local_io(path, &e))?;

            tracing::debug!("Uploading part {} ({} bytes)", part.part_no, length);
            self.http.send_empty(
                self.http
                    .request(Method::PUT, &format!("{}/{}", upload_url, part.part_no))
                    .body(chunk),
            )?;
        }
        Ok(())
    }
}

impl RepositoryBackend for FigshareBackend {
    fn name(&self) -> &str {
        "figshare"
    }

    fn profile(&self) -> &BackendProfile {
        &self.profile
    }

    fn create_record(&self, draft: &RecordDraft) -> Result<CreatedRecord, BackendError> {
        let mut body = json!({
            "title": draft.title,
            "description": draft.description,
            "defined_type": figshare_type_name(draft.defined_type),
        });
        if !draft.tags.is_empty() {
            body["tags"] = json!(draft.tags);
        }
        let created: CreatedArticle = self
            .http
            .send_json(self.http.request(Method::POST, "account/articles").json(&body))?;
        Ok(CreatedRecord {
            id: created_article_id(&created)?,
            doi: None,
        })
    }

    fn reserve_doi(&self, id: &RecordId) -> Result<Option<String>, BackendError> {
        let reserved: ReservedDoi = self.http.send_json(
            self.http
                .request(Method::POST, &format!("{}/reserve_doi", Self::article_path(id))),
        )?;
        Ok(Some(reserved.doi))
    }

    fn add_file(&self, id: &RecordId, path: &Path) -> Result<RemoteFile, BackendError> {
        let name = impublish_core::remote_name(path);
        let size = std::fs::metadata(path)
            .map_err(|e| BackendError::local_io(path, &e))?
            .len();
        let md5 = ChecksumTracker::default()
            .digest(path)
            .map_err(|e| BackendError::new(None, "local_io", e.to_string()))?;

        let registered: Location = self.http.send_json(
            self.http
                .request(Method::POST, &format!("{}/files", Self::article_path(id)))
                .json(&json!({ "name": name, "size": size, "md5": md5.as_str() })),
        )?;
        let pending: PendingFile = self.http.get_json(&registered.location)?;

        self.upload_parts(path, &pending.upload_url)?;
        self.http.send_empty(self.http.request(
            Method::POST,
            &format!("{}/files/{}", Self::article_path(id), pending.id),
        ))?;

        tracing::debug!("Uploaded {} as Figshare file {}", name, pending.id);
        Ok(RemoteFile {
            name,
            remote_id: pending.id.to_string(),
            size: Some(size),
            checksum: Some(md5.as_str().to_string()),
        })
    }

    fn delete_file(&self, id: &RecordId, file_id: &str) -> Result<(), BackendError> {
        self.http.send_empty(self.http.request(
            Method::DELETE,
            &format!("{}/files/{}", Self::article_path(id), file_id),
        ))
    }

    fn list_files(&self, id: &RecordId) -> Result<Vec<RemoteFile>, BackendError> {
        let files: Vec<ArticleFile> = self
            .http
            .get_json(&format!("{}/files", Self::article_path(id)))?;
        Ok(files.into_iter().map(remote_file).collect())
    }

    fn add_tag(&self, id: &RecordId, tag: &str) -> Result<(), BackendError> {
        let article = self.require_article(id)?;
        let mut tags = article.tags;
        if tags.iter().any(|t| t == tag) {
            return Ok(());
        }
        tags.push(tag.to_string());
        self.http.send_empty(
            self.http
                .request(Method::PUT, &Self::article_path(id))
                .json(&json!({ "tags": tags })),
        )
    }

    fn add_category(&self, id: &RecordId, category: &str) -> Result<(), BackendError> {
        let category_id = self.category_id(category)?;
        self.http.send_empty(
            self.http
                .request(Method::POST, &format!("{}/categories", Self::article_path(id)))
                .json(&json!({ "categories": [category_id] })),
        )
    }

    fn add_authors(&self, id: &RecordId, authors: &[String]) -> Result<(), BackendError> {
        self.http.send_empty(
            self.http
                .request(Method::POST, &format!("{}/authors", Self::article_path(id)))
                .json(&json!({ "authors": author_refs(authors) })),
        )
    }

    fn make_public(&self, id: &RecordId) -> Result<Option<String>, BackendError> {
        self.http.send_empty(
            self.http
                .request(Method::POST, &format!("{}/publish", Self::article_path(id))),
        )?;
        Ok(self.fetch_article(id)?.and_then(|a| non_empty(a.doi)))
    }

    fn search(&self, query: &SearchQuery) -> Result<Vec<PublicationRecord>, BackendError> {
        let body = self.http.send_text(
            self.http
                .request(Method::POST, "account/articles/search")
                .json(&json!({ "search_for": query.keyword, "page_size": 100 })),
        )?;
        parse_search_results(&body)
    }

    fn get_record_details(&self, id: &RecordId) -> Result<Option<PublicationRecord>, BackendError> {
        Ok(self.fetch_article(id)?.map(article_record))
    }

    fn delete_record(&self, id: &RecordId) -> Result<(), BackendError> {
        self.http
            .send_empty(self.http.request(Method::DELETE, &Self::article_path(id)))
    }
}

fn figshare_type_name(defined_type: DefinedType) -> &'static str {
    match defined_type {
        DefinedType::Code => "software",
        DefinedType::Dataset => "dataset",
        DefinedType::Fileset => "fileset",
    }
}

fn defined_type_from_name(name: Option<&str>) -> DefinedType {
    match name.map(str::to_ascii_lowercase).as_deref() {
        Some("software") | Some("code") => DefinedType::Code,
        Some("dataset") => DefinedType::Dataset,
        _ => DefinedType::Fileset,
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn created_article_id(created: &CreatedArticle) -> Result<RecordId, BackendError> {
    if let Some(id) = created.entity_id {
        return Ok(RecordId::new(id.to_string()));
    }
    created
        .location
        .as_deref()
        .and_then(|loc| loc.trim_end_matches('/').rsplit('/').next())
        .filter(|segment| segment.chars().all(|c| c.is_ascii_digit()) && !segment.is_empty())
        .map(RecordId::from)
        .ok_or_else(|| BackendError::invalid_response("Article creation returned no id"))
}

fn find_category(categories: &[Category], title: &str) -> Option<u64> {
    categories
        .iter()
        .find(|c| c.title.eq_ignore_ascii_case(title.trim()))
        .map(|c| c.id)
}

/// Numeric markers are Figshare author ids; anything else is a name.
fn author_refs(authors: &[String]) -> Vec<serde_json::Value> {
    authors
        .iter()
        .map(|a| match a.trim().parse::<u64>() {
            Ok(id) => json!({ "id": id }),
            Err(_) => json!({ "name": a.trim() }),
        })
        .collect()
}

fn remote_file(file: ArticleFile) -> RemoteFile {
    RemoteFile {
        name: file.name,
        remote_id: file.id.to_string(),
        size: file.size,
        checksum: non_empty(file.computed_md5),
    }
}

fn article_record(article: Article) -> PublicationRecord {
    let public = article.is_public.unwrap_or(false)
        || article.status.as_deref() == Some("public");
    let mut record = PublicationRecord::new(
        RecordId::new(article.id.to_string()),
        article.title,
        defined_type_from_name(article.defined_type_name.as_deref()),
    );
    record.doi = non_empty(article.doi);
    record.description = article.description.unwrap_or_default();
    record.tags = article.tags.into_iter().collect();
    record.categories = article.categories.into_iter().map(|c| c.title).collect();
    record.authors = article
        .authors
        .into_iter()
        .map(|a| a.id.map(|id| id.to_string()).unwrap_or(a.full_name))
        .collect();
    record.visibility = if public {
        Visibility::Public
    } else {
        Visibility::Draft
    };
    record.files = article.files.into_iter().map(remote_file).collect();
    record
}

/// Parse a Figshare article JSON document
pub fn parse_article(json: &str) -> Result<PublicationRecord, BackendError> {
    parse_json::<Article>(json).map(article_record)
}

/// Parse the result list of `/account/articles/search`
pub fn parse_search_results(json: &str) -> Result<Vec<PublicationRecord>, BackendError> {
    let articles: Vec<Article> = parse_json(json)?;
    Ok(articles.into_iter().map(article_record).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    const ARTICLE: &str = r#"{
        "id": 1234,
        "title": "Demo-abc123",
        "description": "Demo version abc123",
        "doi": "10.6084/m9.figshare.1234",
        "defined_type": 9,
        "defined_type_name": "software",
        "tags": ["abc123"],
        "categories": [{"id": 77, "title": "Computational Physics"}],
        "authors": [{"id": 554577, "full_name": "Jane Doe"}, {"id": null, "full_name": "John Roe"}],
        "status": "public",
        "is_public": true,
        "files": [{"id": 99, "name": "Demo-abc123.zip", "size": 1024,
                   "computed_md5": "5eb63bbbe01eeed093cb22bb8f5acdc3"}]
    }"#;

    #[test]
    fn parses_article_details() {
        let record = parse_article(ARTICLE).unwrap();
        assert_eq!(record.id.as_str(), "1234");
        assert_eq!(record.doi.as_deref(), Some("10.6084/m9.figshare.1234"));
        assert_eq!(record.defined_type, DefinedType::Code);
        assert!(record.tags.contains("abc123"));
        assert!(record.categories.contains("Computational Physics"));
        assert_eq!(record.authors, vec!["554577".to_string(), "John Roe".to_string()]);
        assert!(record.is_public());

        let file = record.file_named("Demo-abc123.zip").unwrap();
        assert_eq!(file.remote_id, "99");
        assert_eq!(file.checksum.as_deref(), Some("5eb63bbbe01eeed093cb22bb8f5acdc3"));
    }

    #[test]
    fn draft_article_has_no_doi() {
        let record = parse_article(
            r#"{"id": 5, "title": "t", "doi": "", "status": "draft", "defined_type_name": "fileset"}"#,
        )
        .unwrap();
        assert_eq!(record.doi, None);
        assert_eq!(record.visibility, Visibility::Draft);
        assert_eq!(record.defined_type, DefinedType::Fileset);
    }

    #[test]
    fn parses_search_results() {
        let results = parse_search_results(
            r#"[{"id": 1, "title": "Demo-abc123", "doi": "10.6084/m9.figshare.1"},
                {"id": 2, "title": "Demo-abc123-docs", "doi": ""}]"#,
        )
        .unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[1].doi, None);
    }

    #[test]
    fn created_id_from_entity_or_location() {
        let with_entity = CreatedArticle {
            entity_id: Some(42),
            location: None,
        };
        assert_eq!(created_article_id(&with_entity).unwrap().as_str(), "42");

        let with_location = CreatedArticle {
            entity_id: None,
            location: Some("https://api.figshare.com/v2/account/articles/43".to_string()),
        };
        assert_eq!(created_article_id(&with_location).unwrap().as_str(), "43");

        let neither = CreatedArticle {
            entity_id: None,
            location: None,
        };
        assert!(created_article_id(&neither).is_err());
    }

    #[test]
    fn authors_are_ids_or_names() {
        let refs = author_refs(&["554577".to_string(), "Jane Doe".to_string()]);
        assert_eq!(refs[0], json!({ "id": 554577 }));
        assert_eq!(refs[1], json!({ "name": "Jane Doe" }));
    }

    #[test]
    fn categories_match_by_title() {
        let categories = vec![
            Category { id: 1, title: "Oceanography".to_string() },
            Category { id: 2, title: "Computational Physics".to_string() },
        ];
        assert_eq!(find_category(&categories, "computational physics"), Some(2));
        assert_eq!(find_category(&categories, "Botany"), None);
    }

    #[test]
    fn profile_defaults() {
        let profile = figshare_profile();
        assert!(!profile.doi_at_creation);
        assert_eq!(profile.search, SearchSupport::KeywordOnly);
        assert_eq!(profile.data_type, DefinedType::Fileset);
    }
}
