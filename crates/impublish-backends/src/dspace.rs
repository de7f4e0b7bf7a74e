//! DSpace backend over SWORD v2
//!
//! Protocol: https://swordapp.github.io/SWORDv2-Profile/SWORDProfile.html
//! Auth: HTTP basic
//!
//! The collection to deposit into is picked from the service document by
//! title or position. A record is identified by its edit IRI; files live
//! behind the edit-media IRI named in the deposit receipt. Metadata is added
//! by POSTing Atom entries with Dublin Core terms to the edit IRI, and the
//! deposit is completed with `In-Progress: false`. SWORD has neither search
//! nor DOIs.

use crate::http::{Auth, RestClient};
use impublish_core::{
    remote_name, BackendError, BackendProfile, CreatedRecord, DSpaceConfig, DefinedType,
    PublicationRecord, RecordDraft, RecordId, RemoteFile, RepositoryBackend, SearchSupport,
    Visibility,
};
use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use reqwest::blocking::Response;
use reqwest::Method;
use std::path::Path;
use std::time::Duration;

const ATOM_ENTRY: &str = "application/atom+xml;type=entry";
const ATOM_FEED: &str = "application/atom+xml;type=feed";
const BINARY_PACKAGING: &str = "http://purl.org/net/sword/package/Binary";
const STATEMENT_REL: &str = "http://purl.org/net/sword/terms/statement";
const STATE_SCHEME: &str = "http://purl.org/net/sword/terms/state";

/// A deposit target listed in the service document
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Collection {
    pub title: String,
    pub href: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Workspace {
    pub title: String,
    pub collections: Vec<Collection>,
}

/// The parts of a deposit receipt this backend uses
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DepositReceipt {
    pub edit_iri: Option<String>,
    pub edit_media_iri: Option<String>,
    pub statement_iri: Option<String>,
    pub title: String,
    pub description: String,
    pub subjects: Vec<String>,
    pub creators: Vec<String>,
    pub dc_type: Option<String>,
}

/// Default quirks: no search, no DOI to reserve.
pub fn dspace_profile() -> BackendProfile {
    BackendProfile {
        software_type: DefinedType::Code,
        data_type: DefinedType::Dataset,
        doi_at_creation: true,
        search: SearchSupport::Unsupported,
    }
}

pub struct DSpaceBackend {
    http: RestClient,
    profile: BackendProfile,
    collection: Collection,
}

impl DSpaceBackend {
    /// Connect, read the service document and select the collection.
    pub fn connect(config: &DSpaceConfig, timeout: Duration) -> Result<Self, BackendError> {
        let http = RestClient::new(
            &config.service_document_url,
            Auth::Basic {
                user: config.user_name.clone(),
                password: config.user_pass.clone(),
            },
            timeout,
        )?;
        let xml = http.send_text(http.request(Method::GET, &config.service_document_url))?;
        let workspaces = parse_service_document(&xml)?;
        let collection = select_collection(
            &workspaces,
            config.collection_title.as_deref(),
            config.collection_index,
        )?;
        tracing::info!("Depositing into DSpace collection {:?} ({})", collection.title, collection.href);

        Ok(Self {
            http,
            profile: dspace_profile(),
            collection,
        })
    }

    pub fn collection(&self) -> &Collection {
        &self.collection
    }

    fn receipt(&self, id: &RecordId) -> Result<Option<DepositReceipt>, BackendError> {
        let request = self
            .http
            .request(Method::GET, id.as_str())
            .header("Accept", ATOM_ENTRY);
        match self.http.send_text(request) {
            Ok(xml) => parse_receipt(&xml).map(Some),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn edit_media_iri(&self, id: &RecordId) -> Result<String, BackendError> {
        self.receipt(id)?
            .ok_or_else(|| BackendError::http(404, format!("deposit {} not found", id)))?
            .edit_media_iri
            .ok_or_else(|| BackendError::invalid_response("Deposit receipt has no edit-media link"))
    }

    /// POST a Dublin Core entry to the edit IRI, leaving the deposit in progress
    fn add_metadata(&self, id: &RecordId, fields: &[(&str, &str)]) -> Result<(), BackendError> {
        self.http.send_empty(
            self.http
                .request(Method::POST, id.as_str())
                .header("Content-Type", ATOM_ENTRY)
                .header("In-Progress", "true")
                .body(metadata_entry(fields)),
        )
    }

    fn deposit_state(&self, statement_iri: &str) -> Option<String> {
        let request = self
            .http
            .request(Method::GET, statement_iri)
            .header("Accept", ATOM_FEED);
        match self.http.send_text(request).and_then(|xml| parse_statement_state(&xml)) {
            Ok(state) => state,
            Err(e) => {
                tracing::debug!("Could not read deposit statement {}: {}", statement_iri, e);
                None
            }
        }
    }
}

impl RepositoryBackend for DSpaceBackend {
    fn name(&self) -> &str {
        "dspace"
    }

    fn profile(&self) -> &BackendProfile {
        &self.profile
    }

    fn create_record(&self, draft: &RecordDraft) -> Result<CreatedRecord, BackendError> {
        let mut fields = vec![
            ("title", draft.title.as_str()),
            ("dcterms:title", draft.title.as_str()),
            ("dcterms:abstract", draft.description.as_str()),
            ("dcterms:type", dc_type(draft.defined_type)),
        ];
        fields.extend(draft.tags.iter().map(|t| ("dcterms:subject", t.as_str())));
        fields.extend(draft.categories.iter().map(|c| ("dcterms:subject", c.as_str())));

        let response = self.http.send(
            self.http
                .request(Method::POST, &self.collection.href)
                .header("Content-Type", ATOM_ENTRY)
                .header("In-Progress", "true")
                .body(metadata_entry(&fields)),
        )?;
        let location = location_header(&response);
        let body = response.text().unwrap_or_default();

        let edit_iri = if body.trim().is_empty() {
            None
        } else {
            parse_receipt(&body)?.edit_iri
        };
        let id = edit_iri
            .or(location)
            .ok_or_else(|| BackendError::invalid_response("Deposit receipt has no edit IRI"))?;
        Ok(CreatedRecord {
            id: RecordId::new(id),
            doi: None,
        })
    }

    fn add_file(&self, id: &RecordId, path: &Path) -> Result<RemoteFile, BackendError> {
        let name = remote_name(path);
        let bytes = std::fs::read(path).map_err(|e| BackendError::local_io(path, &e))?;
        let size = bytes.len() as u64;
        let edit_media = self.edit_media_iri(id)?;

        let response = self.http.send(
            self.http
                .request(Method::POST, &edit_media)
                .header("Content-Type", "application/octet-stream")
                .header("Content-Disposition", content_disposition(&name))
                .header("Packaging", BINARY_PACKAGING)
                .header("In-Progress", "true")
                .body(bytes),
        )?;
        let remote_id = location_header(&response).unwrap_or_else(|| name.clone());
        Ok(RemoteFile {
            name,
            remote_id,
            size: Some(size),
            checksum: None,
        })
    }

    fn delete_file(&self, _id: &RecordId, file_id: &str) -> Result<(), BackendError> {
        self.http
            .send_empty(self.http.request(Method::DELETE, file_id))
    }

    fn list_files(&self, id: &RecordId) -> Result<Vec<RemoteFile>, BackendError> {
        let edit_media = self.edit_media_iri(id)?;
        let xml = self.http.send_text(
            self.http
                .request(Method::GET, &edit_media)
                .header("Accept", ATOM_FEED),
        )?;
        parse_media_feed(&xml)
    }

    fn add_tag(&self, id: &RecordId, tag: &str) -> Result<(), BackendError> {
        self.add_metadata(id, &[("dcterms:subject", tag)])
    }

    /// DSpace has no category concept; categories become subjects too.
    fn add_category(&self, id: &RecordId, category: &str) -> Result<(), BackendError> {
        self.add_metadata(id, &[("dcterms:subject", category)])
    }

    fn add_authors(&self, id: &RecordId, authors: &[String]) -> Result<(), BackendError> {
        let fields: Vec<(&str, &str)> = authors
            .iter()
            .map(|a| ("dcterms:creator", a.as_str()))
            .collect();
        self.add_metadata(id, &fields)
    }

    fn make_public(&self, id: &RecordId) -> Result<Option<String>, BackendError> {
        self.http.send_empty(
            self.http
                .request(Method::POST, id.as_str())
                .header("In-Progress", "false")
                .body(Vec::new()),
        )?;
        tracing::info!("Completed SWORD deposit {}", id);
        Ok(None)
    }

    fn get_record_details(&self, id: &RecordId) -> Result<Option<PublicationRecord>, BackendError> {
        let Some(receipt) = self.receipt(id)? else {
            return Ok(None);
        };
        let files = self.list_files(id)?;
        let archived = receipt
            .statement_iri
            .as_deref()
            .and_then(|iri| self.deposit_state(iri))
            .map_or(false, |state| is_archived_state(&state));

        let defined_type = match receipt.dc_type.as_deref() {
            Some("software") => DefinedType::Code,
            _ => DefinedType::Dataset,
        };
        let mut record = PublicationRecord::new(id.clone(), receipt.title, defined_type);
        record.description = receipt.description;
        record.tags = receipt.subjects.into_iter().collect();
        record.authors = receipt.creators;
        record.files = files;
        record.visibility = if archived {
            Visibility::Public
        } else {
            Visibility::Draft
        };
        Ok(Some(record))
    }

    fn delete_record(&self, id: &RecordId) -> Result<(), BackendError> {
        self.http
            .send_empty(self.http.request(Method::DELETE, id.as_str()))
    }
}

fn dc_type(defined_type: DefinedType) -> &'static str {
    match defined_type {
        DefinedType::Code => "software",
        DefinedType::Dataset | DefinedType::Fileset => "dataset",
    }
}

fn location_header(response: &Response) -> Option<String> {
    response
        .headers()
        .get("Location")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// `attachment; filename="<name>"` with quotes and backslashes escaped
fn content_disposition(name: &str) -> String {
    let quoted = name.replace('\\', "\\\\").replace('"', "\\\"");
    format!("attachment; filename=\"{}\"", quoted)
}

fn is_archived_state(state: &str) -> bool {
    state.ends_with("/archived") || state == "archived"
}

/// Pick the deposit collection from the first workspace: by title when one
/// is configured, else by index (default 0).
pub fn select_collection(
    workspaces: &[Workspace],
    title: Option<&str>,
    index: Option<usize>,
) -> Result<Collection, BackendError> {
    let collections = workspaces
        .first()
        .map(|w| w.collections.as_slice())
        .unwrap_or_default();
    let found = match title {
        Some(title) => collections.iter().find(|c| c.title == title),
        None => collections.get(index.unwrap_or(0)),
    };
    found.cloned().ok_or_else(|| {
        let wanted = match title {
            Some(t) => format!("titled {:?}", t),
            None => format!("at index {}", index.unwrap_or(0)),
        };
        BackendError::new(
            Some(404),
            "collection_not_found",
            format!("No collection {} in the service document", wanted),
        )
    })
}

/// Atom entry carrying `(element, value)` pairs; `dcterms:` elements are
/// Dublin Core terms, the rest are Atom elements.
pub fn metadata_entry(fields: &[(&str, &str)]) -> String {
    let mut xml = String::from(
        "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n\
         <entry xmlns=\"http://www.w3.org/2005/Atom\" xmlns:dcterms=\"http://purl.org/dc/terms/\">\n",
    );
    for (element, value) in fields {
        xml.push_str(&format!("  <{0}>{1}</{0}>\n", element, escape(*value)));
    }
    xml.push_str("</entry>\n");
    xml
}

fn xml_error(e: quick_xml::Error) -> BackendError {
    BackendError::invalid_response(format!("XML parse error: {}", e))
}

fn attribute(e: &BytesStart, name: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == name)
        .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
}

/// Parse a SWORD2 service document into workspaces and collections
pub fn parse_service_document(xml: &str) -> Result<Vec<Workspace>, BackendError> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut workspaces: Vec<Workspace> = Vec::new();
    let mut buf = Vec::new();
    let mut current_element = Vec::new();
    let mut in_collection = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                current_element = e.local_name().as_ref().to_vec();
                match current_element.as_slice() {
                    b"workspace" => workspaces.push(Workspace::default()),
                    b"collection" => {
                        in_collection = true;
                        if let Some(workspace) = workspaces.last_mut() {
                            workspace.collections.push(Collection {
                                title: String::new(),
                                href: attribute(e, b"href").unwrap_or_default(),
                            });
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::End(ref e)) => {
                if e.local_name().as_ref() == b"collection" {
                    in_collection = false;
                }
                current_element.clear();
            }
            Ok(Event::Text(e)) => {
                if current_element.as_slice() == b"title" {
                    let text = e.unescape().map_err(xml_error)?.into_owned();
                    if let Some(workspace) = workspaces.last_mut() {
                        if in_collection {
                            if let Some(collection) = workspace.collections.last_mut() {
                                collection.title = text;
                            }
                        } else {
                            workspace.title = text;
                        }
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_error(e)),
            _ => {}
        }
        buf.clear();
    }

    if workspaces.is_empty() {
        return Err(BackendError::invalid_response("Service document lists no workspaces"));
    }
    Ok(workspaces)
}

/// Parse a deposit receipt (an Atom entry)
pub fn parse_receipt(xml: &str) -> Result<DepositReceipt, BackendError> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut receipt = DepositReceipt::default();
    let mut buf = Vec::new();
    let mut current_element = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                current_element = e.local_name().as_ref().to_vec();
                if current_element.as_slice() == b"link" {
                    let href = attribute(e, b"href");
                    match attribute(e, b"rel").as_deref() {
                        Some("edit") => receipt.edit_iri = href,
                        Some("edit-media") => receipt.edit_media_iri = href,
                        Some(STATEMENT_REL) => {
                            // Prefer the Atom statement over OAI-ORE
                            let is_atom = attribute(e, b"type")
                                .map_or(true, |t| t.starts_with("application/atom+xml"));
                            if is_atom {
                                receipt.statement_iri = href;
                            }
                        }
                        _ => {}
                    }
                }
            }
            Ok(Event::End(_)) => current_element.clear(),
            Ok(Event::Text(e)) => {
                let text = e.unescape().map_err(xml_error)?.into_owned();
                match current_element.as_slice() {
                    b"title" if receipt.title.is_empty() => receipt.title = text,
                    b"abstract" | b"summary" if receipt.description.is_empty() => {
                        receipt.description = text
                    }
                    b"subject" => receipt.subjects.push(text),
                    b"creator" => receipt.creators.push(text),
                    b"type" => receipt.dc_type = Some(text),
                    _ => {}
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_error(e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(receipt)
}

/// Parse the edit-media feed listing a deposit's files
pub fn parse_media_feed(xml: &str) -> Result<Vec<RemoteFile>, BackendError> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut files = Vec::new();
    let mut buf = Vec::new();
    let mut current_element = Vec::new();
    let mut in_entry = false;
    let mut title = String::new();
    let mut src: Option<String> = None;
    let mut edit_media: Option<String> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                current_element = e.local_name().as_ref().to_vec();
                match current_element.as_slice() {
                    b"entry" => {
                        in_entry = true;
                        title.clear();
                        src = None;
                        edit_media = None;
                    }
                    b"content" if in_entry => src = attribute(e, b"src"),
                    b"link" if in_entry => {
                        if attribute(e, b"rel").as_deref() == Some("edit-media") {
                            edit_media = attribute(e, b"href");
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::End(ref e)) => {
                if e.local_name().as_ref() == b"entry" {
                    in_entry = false;
                    let name = if title.is_empty() {
                        src.as_deref().map(last_segment).unwrap_or_default()
                    } else {
                        title.clone()
                    };
                    if let Some(remote_id) = edit_media.take().or_else(|| src.take()) {
                        if !name.is_empty() {
                            files.push(RemoteFile {
                                name,
                                remote_id,
                                size: None,
                                checksum: None,
                            });
                        }
                    }
                }
                current_element.clear();
            }
            Ok(Event::Text(e)) => {
                if in_entry && current_element.as_slice() == b"title" {
                    title = e.unescape().map_err(xml_error)?.into_owned();
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_error(e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(files)
}

/// Deposit state term from a SWORD statement, if present
pub fn parse_statement_state(xml: &str) -> Result<Option<String>, BackendError> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                if e.local_name().as_ref() == b"category"
                    && attribute(e, b"scheme").as_deref() == Some(STATE_SCHEME)
                {
                    return Ok(attribute(e, b"term"));
                }
            }
            Ok(Event::Eof) => return Ok(None),
            Err(e) => return Err(xml_error(e)),
            _ => {}
        }
        buf.clear();
    }
}

/// Decoded last path segment of a URL
fn last_segment(url: &str) -> String {
    let segment = url
        .split(['?', '#'])
        .next()
        .unwrap_or(url)
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default();
    urlencoding::decode(segment)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| segment.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SERVICE_DOCUMENT: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<service xmlns="http://www.w3.org/2007/app" xmlns:atom="http://www.w3.org/2005/Atom"
         xmlns:sword="http://purl.org/net/sword/terms/">
  <sword:version>2.0</sword:version>
  <workspace>
    <atom:title>DSpace at Example</atom:title>
    <collection href="https://dspace.example.org/swordv2/collection/123456789/2">
      <atom:title>Software</atom:title>
      <accept>*/*</accept>
    </collection>
    <collection href="https://dspace.example.org/swordv2/collection/123456789/3">
      <atom:title>Research Data &amp; Models</atom:title>
    </collection>
  </workspace>
</service>"#;

    const RECEIPT: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<entry xmlns="http://www.w3.org/2005/Atom" xmlns:dcterms="http://purl.org/dc/terms/">
  <title>Demo-abc123</title>
  <id>https://dspace.example.org/swordv2/edit/42</id>
  <dcterms:abstract>Demo version abc123</dcterms:abstract>
  <dcterms:type>software</dcterms:type>
  <dcterms:subject>abc123</dcterms:subject>
  <dcterms:creator>Doe, Jane</dcterms:creator>
  <link rel="edit" href="https://dspace.example.org/swordv2/edit/42"/>
  <link rel="edit-media" href="https://dspace.example.org/swordv2/edit-media/42"/>
  <link rel="http://purl.org/net/sword/terms/statement" type="application/rdf+xml"
        href="https://dspace.example.org/swordv2/statement/42.rdf"/>
  <link rel="http://purl.org/net/sword/terms/statement" type="application/atom+xml;type=feed"
        href="https://dspace.example.org/swordv2/statement/42.atom"/>
</entry>"#;

    const MEDIA_FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <entry>
    <title>Demo-abc123.zip</title>
    <content type="application/zip" src="https://dspace.example.org/bitstream/42/1/Demo-abc123.zip"/>
    <link rel="edit-media" href="https://dspace.example.org/swordv2/edit-media/bitstream/7/Demo-abc123.zip"/>
  </entry>
  <entry>
    <content type="text/plain" src="https://dspace.example.org/bitstream/42/2/read%20me.txt"/>
  </entry>
</feed>"#;

    #[test]
    fn parses_service_document() {
        let workspaces = parse_service_document(SERVICE_DOCUMENT).unwrap();
        assert_eq!(workspaces.len(), 1);
        assert_eq!(workspaces[0].title, "DSpace at Example");
        assert_eq!(workspaces[0].collections.len(), 2);
        assert_eq!(workspaces[0].collections[1].title, "Research Data & Models");
    }

    #[test]
    fn selects_collection_by_title_or_index() {
        let workspaces = parse_service_document(SERVICE_DOCUMENT).unwrap();
        let by_title = select_collection(&workspaces, Some("Software"), None).unwrap();
        assert!(by_title.href.ends_with("/2"));
        let by_index = select_collection(&workspaces, None, Some(1)).unwrap();
        assert!(by_index.href.ends_with("/3"));
        let default = select_collection(&workspaces, None, None).unwrap();
        assert_eq!(default, by_title);

        let err = select_collection(&workspaces, Some("Theses"), None).unwrap_err();
        assert_eq!(err.code, "collection_not_found");
        assert!(select_collection(&workspaces, None, Some(9)).is_err());
    }

    #[test]
    fn parses_deposit_receipt() {
        let receipt = parse_receipt(RECEIPT).unwrap();
        assert_eq!(receipt.edit_iri.as_deref(), Some("https://dspace.example.org/swordv2/edit/42"));
        assert_eq!(
            receipt.edit_media_iri.as_deref(),
            Some("https://dspace.example.org/swordv2/edit-media/42")
        );
        assert_eq!(
            receipt.statement_iri.as_deref(),
            Some("https://dspace.example.org/swordv2/statement/42.atom")
        );
        assert_eq!(receipt.title, "Demo-abc123");
        assert_eq!(receipt.description, "Demo version abc123");
        assert_eq!(receipt.subjects, vec!["abc123".to_string()]);
        assert_eq!(receipt.creators, vec!["Doe, Jane".to_string()]);
        assert_eq!(receipt.dc_type.as_deref(), Some("software"));
    }

    #[test]
    fn parses_media_feed() {
        let files = parse_media_feed(MEDIA_FEED).unwrap();
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].name, "Demo-abc123.zip");
        assert!(files[0].remote_id.contains("/edit-media/bitstream/7/"));
        assert_eq!(files[1].name, "read me.txt");
        assert!(files[1].remote_id.ends_with("read%20me.txt"));
    }

    #[test]
    fn parses_statement_state() {
        let statement = r#"<feed xmlns="http://www.w3.org/2005/Atom">
  <category scheme="http://purl.org/net/sword/terms/state"
            term="http://dspace.org/state/archived" label="State"/>
</feed>"#;
        let state = parse_statement_state(statement).unwrap().unwrap();
        assert!(is_archived_state(&state));
        assert_eq!(parse_statement_state("<feed/>").unwrap(), None);
    }

    #[test]
    fn metadata_entry_escapes_values() {
        let xml = metadata_entry(&[("title", "Fish & Chips"), ("dcterms:subject", "<tag>")]);
        assert!(xml.contains("<title>Fish &amp; Chips</title>"));
        assert!(xml.contains("<dcterms:subject>&lt;tag&gt;</dcterms:subject>"));

        let receipt = parse_receipt(&xml).unwrap();
        assert_eq!(receipt.title, "Fish & Chips");
        assert_eq!(receipt.subjects, vec!["<tag>".to_string()]);
    }

    #[test]
    fn content_disposition_quotes_file_names() {
        assert_eq!(content_disposition("Demo-abc123.zip"), r#"attachment; filename="Demo-abc123.zip""#);
        assert_eq!(content_disposition("read me; v2.txt"), r#"attachment; filename="read me; v2.txt""#);
        assert_eq!(content_disposition(r#"say "hi".txt"#), r#"attachment; filename="say \"hi\".txt""#);
    }

    #[test]
    fn malformed_xml_is_an_invalid_response() {
        let err = parse_receipt("<entry><title>unclosed</entry>").unwrap_err();
        assert_eq!(err.code, "invalid_response");
    }
}
