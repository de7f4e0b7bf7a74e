//! AUTHORS file parsing
//!
//! Authors are listed one per line in the project's `AUTHORS` file. A line
//! may carry one or more markers naming the author on a specific backend:
//!
//! ```text
//! Jane Doe <jane@example.org> <figshare:554577> <zenodo:Doe, Jane;Imperial College London>
//! Someone Without Markers
//! ```

use lazy_static::lazy_static;
use regex::Regex;
use std::path::Path;

/// Name of the authors file at the working directory root
pub const AUTHORS_FILE_NAME: &str = "AUTHORS";

lazy_static! {
    // <backend:identifier>, backend is a bare word, identifier runs to the '>'
    static ref MARKER_REGEX: Regex =
        Regex::new(r"<(?P<backend>[A-Za-z][A-Za-z0-9_-]*):(?P<id>[^<>]+)>").unwrap();
}

/// Extract identifiers for `backend` from AUTHORS text, in file order.
///
/// Markers for other backends and plain e-mail addresses are ignored.
pub fn parse_author_markers(text: &str, backend: &str) -> Vec<String> {
    MARKER_REGEX
        .captures_iter(text)
        .filter(|cap| cap["backend"].eq_ignore_ascii_case(backend))
        .map(|cap| cap["id"].trim().to_string())
        .filter(|id| !id.is_empty())
        .collect()
}

/// Read `<dir>/AUTHORS` and return the identifiers for `backend`.
///
/// Returns `None` when the file is absent or unreadable; callers treat that
/// as "no known authors".
pub fn parse_authors(dir: &Path, backend: &str) -> Option<Vec<String>> {
    let path = dir.join(AUTHORS_FILE_NAME);
    match std::fs::read_to_string(&path) {
        Ok(text) => Some(parse_author_markers(&text, backend)),
        Err(e) => {
            tracing::debug!("No usable AUTHORS file at {}: {}", path.display(), e);
            None
        }
    }
}
