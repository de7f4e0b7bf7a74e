//! Blocking HTTP client shared by the REST and SWORD2 backends

use impublish_core::BackendError;
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::Method;
use serde::de::DeserializeOwned;
use std::time::Duration;

pub(crate) const USER_AGENT: &str = concat!("impublish/", env!("CARGO_PKG_VERSION"));

/// Credentials attached to every request
#[derive(Clone)]
pub(crate) enum Auth {
    /// `Authorization: token <t>` (Figshare)
    Token(String),
    /// `Authorization: Bearer <t>` (Zenodo)
    Bearer(String),
    /// HTTP basic auth (SWORD2)
    Basic { user: String, password: String },
}

pub(crate) struct RestClient {
    client: Client,
    base_url: String,
    auth: Auth,
}

impl RestClient {
    pub fn new(base_url: &str, auth: Auth, timeout: Duration) -> Result<Self, BackendError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(BackendError::transport)?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            auth,
        })
    }

    /// Resolve `path` against the base URL. Absolute URLs pass through.
    pub fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}/{}", self.base_url, path.trim_start_matches('/'))
        }
    }

    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = self.url(path);
        tracing::debug!("{} {}", method, url);
        let builder = self.client.request(method, url);
        match &self.auth {
            Auth::Token(token) => builder.header("Authorization", format!("token {}", token)),
            Auth::Bearer(token) => builder.bearer_auth(token),
            Auth::Basic { user, password } => builder.basic_auth(user, Some(password)),
        }
    }

    /// Send and fail on any non-success status
    pub fn send(&self, request: RequestBuilder) -> Result<Response, BackendError> {
        let response = request.send().map_err(BackendError::transport)?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().unwrap_or_default();
        tracing::debug!("Request failed with {}: {}", status, body);
        Err(BackendError::http(status.as_u16(), error_message(&body)))
    }

    pub fn send_text(&self, request: RequestBuilder) -> Result<String, BackendError> {
        self.send(request)?
            .text()
            .map_err(|e| BackendError::invalid_response(format!("Unreadable response body: {}", e)))
    }

    pub fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, BackendError> {
        let body = self.send_text(request)?;
        parse_json(&body)
    }

    pub fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, BackendError> {
        self.send_json(self.request(Method::GET, path))
    }

    /// GET that maps 404 to `None`
    pub fn get_optional_json<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>, BackendError> {
        match self.get_json(path) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Send and discard the body
    pub fn send_empty(&self, request: RequestBuilder) -> Result<(), BackendError> {
        self.send(request).map(|_| ())
    }
}

pub(crate) fn parse_json<T: DeserializeOwned>(body: &str) -> Result<T, BackendError> {
    serde_json::from_str(body)
        .map_err(|e| BackendError::invalid_response(format!("Invalid JSON: {}", e)))
}

/// Pull a human-readable message out of an error body.
///
/// Figshare and Zenodo both answer with `{"message": "..."}`; anything else
/// is passed through, shortened.
fn error_message(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        if let Some(message) = value.get("message").and_then(|m| m.as_str()) {
            return message.to_string();
        }
    }
    let trimmed = body.trim();
    match trimmed.char_indices().nth(500) {
        Some((cut, _)) => format!("{}...", &trimmed[..cut]),
        None => trimmed.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> RestClient {
        RestClient::new(
            "https://api.example.org/v2/",
            Auth::Token("t".to_string()),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn joins_paths_onto_base() {
        let client = client();
        assert_eq!(
            client.url("/account/articles"),
            "https://api.example.org/v2/account/articles"
        );
        assert_eq!(
            client.url("https://upload.example.org/abc"),
            "https://upload.example.org/abc"
        );
    }

    #[test]
    fn error_bodies_are_summarised() {
        assert_eq!(error_message(r#"{"message": "Quota exceeded", "code": 403}"#), "Quota exceeded");
        assert_eq!(error_message("  plain failure \n"), "plain failure");
        assert!(error_message(&"x".repeat(2000)).ends_with("..."));
    }

    #[test]
    fn bad_json_is_an_invalid_response() {
        let err = parse_json::<serde_json::Value>("<html>").unwrap_err();
        assert_eq!(err.code, "invalid_response");
    }
}
