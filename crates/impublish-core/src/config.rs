//! Configuration for impublish
//!
//! Credentials and endpoints per backend, plus a few general settings.
//! The canonical format is TOML:
//!
//! ```toml
//! [general]
//! backend = "zenodo"
//! staging_dir = "build/releases"
//! software_category = "software"
//!
//! [zenodo]
//! token = "..."
//! base_url = "https://sandbox.zenodo.org/api"
//!
//! [figshare]
//! token = "..."
//! search = "keyword-only"
//!
//! [dspace]
//! service_document_url = "https://dspace.example.org/swordv2/servicedocument"
//! user_name = "depositor@example.org"
//! user_pass = "..."
//! collection_title = "Software"
//! ```
//!
//! Plain `key=value` files with optional `[section]` headers are accepted
//! too; keys before the first header belong to `[general]`.

use crate::backend::SearchSupport;
use crate::reconciler::ReconcilerOptions;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "IMPUBLISH_CONFIG";

/// Config file looked up in the current directory
pub const LOCAL_CONFIG_FILE: &str = "impublish.toml";

pub const DEFAULT_FIGSHARE_URL: &str = "https://api.figshare.com/v2";
pub const DEFAULT_ZENODO_URL: &str = "https://zenodo.org/api";
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Configuration problems. All of them are fatal before any publish starts.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config: {0}")]
    Parse(String),

    #[error("No config file found (looked in: {})", display_candidates(.0))]
    NotFound(Vec<PathBuf>),

    #[error("Config has no [{0}] section")]
    MissingSection(String),

    #[error("Missing field {field} in [{section}]")]
    MissingField { section: String, field: String },

    #[error("Unsupported backend: {0} (expected figshare, zenodo, dspace or memory)")]
    UnknownBackend(String),
}

fn display_candidates(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Supported repository services
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Figshare,
    Zenodo,
    #[serde(rename = "dspace")]
    DSpace,
    /// In-process backend for dry runs
    Memory,
}

impl FromStr for BackendKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "figshare" => Ok(BackendKind::Figshare),
            "zenodo" => Ok(BackendKind::Zenodo),
            "dspace" | "sword2" => Ok(BackendKind::DSpace),
            "memory" => Ok(BackendKind::Memory),
            other => Err(ConfigError::UnknownBackend(other.to_string())),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BackendKind::Figshare => "figshare",
            BackendKind::Zenodo => "zenodo",
            BackendKind::DSpace => "dspace",
            BackendKind::Memory => "memory",
        })
    }
}

/// Root configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImpublishConfig {
    pub general: GeneralConfig,
    pub figshare: Option<FigshareConfig>,
    pub zenodo: Option<ZenodoConfig>,
    pub dspace: Option<DSpaceConfig>,
}

/// Settings shared by all backends
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Backend used when the command line does not pick one
    pub backend: Option<String>,
    pub staging_dir: Option<PathBuf>,
    pub software_category: Option<String>,
    /// HTTP timeout in seconds
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FigshareConfig {
    /// Personal access token
    pub token: String,
    #[serde(default = "default_figshare_url")]
    pub base_url: String,
    #[serde(default)]
    pub search: Option<SearchSupport>,
    #[serde(default)]
    pub doi_at_creation: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZenodoConfig {
    /// Personal access token with deposit scopes
    pub token: String,
    #[serde(default = "default_zenodo_url")]
    pub base_url: String,
    #[serde(default)]
    pub search: Option<SearchSupport>,
    #[serde(default)]
    pub doi_at_creation: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DSpaceConfig {
    pub service_document_url: String,
    pub user_name: String,
    pub user_pass: String,
    /// Collection to deposit into, matched against the service document
    #[serde(default)]
    pub collection_title: Option<String>,
    /// Fallback: position of the collection in the first workspace
    #[serde(default)]
    pub collection_index: Option<usize>,
}

fn default_figshare_url() -> String {
    DEFAULT_FIGSHARE_URL.to_string()
}

fn default_zenodo_url() -> String {
    DEFAULT_ZENODO_URL.to_string()
}

// Keys whose legacy string values are converted before typed decoding.
const INTEGER_KEYS: &[&str] = &["timeout_secs", "collection_index"];
const BOOLEAN_KEYS: &[&str] = &["doi_at_creation"];

impl ImpublishConfig {
    /// Parse TOML, falling back to the legacy `key=value` layout.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        match Self::from_toml(text) {
            Ok(config) => Ok(config),
            Err(toml_err) => Self::from_key_value(text).map_err(|legacy_err| {
                ConfigError::Parse(format!(
                    "not TOML ({}) and not key=value ({})",
                    toml_err, legacy_err
                ))
            }),
        }
    }

    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Parse `key=value` lines with optional `[section]` headers.
    pub fn from_key_value(text: &str) -> Result<Self, ConfigError> {
        let mut root = toml::Table::new();
        let mut section = "general".to_string();

        for (number, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }
            if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
                section = name.trim().to_ascii_lowercase();
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                return Err(ConfigError::Parse(format!(
                    "line {}: expected key=value, got {:?}",
                    number + 1,
                    line
                )));
            };
            let key = key.trim().to_string();
            let value = legacy_value(&key, value.trim())
                .map_err(|msg| ConfigError::Parse(format!("line {}: {}", number + 1, msg)))?;

            let table = root
                .entry(section.clone())
                .or_insert_with(|| toml::Value::Table(toml::Table::new()));
            if let toml::Value::Table(table) = table {
                table.insert(key, value);
            }
        }

        toml::Value::Table(root)
            .try_into()
            .map_err(|e: toml::de::Error| ConfigError::Parse(e.to_string()))
    }

    /// Read and parse a config file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::parse(&text)?;
        tracing::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Candidate config locations, most specific first
    pub fn candidate_paths() -> Vec<PathBuf> {
        let mut candidates = Vec::new();
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            candidates.push(PathBuf::from(path));
        }
        candidates.push(PathBuf::from(LOCAL_CONFIG_FILE));
        if let Some(dir) = dirs::config_dir() {
            candidates.push(dir.join("impublish").join("config.toml"));
        }
        candidates
    }

    /// Load the first existing file among [`Self::candidate_paths`]
    pub fn load_default() -> Result<Self, ConfigError> {
        Self::load_first(&Self::candidate_paths())
    }

    /// Load the first of `candidates` that exists
    pub fn load_first(candidates: &[PathBuf]) -> Result<Self, ConfigError> {
        match candidates.iter().find(|p| p.is_file()) {
            Some(path) => Self::load(path),
            None => Err(ConfigError::NotFound(candidates.to_vec())),
        }
    }

    /// Backend to use: the explicit choice, else `[general] backend`.
    pub fn backend_kind(&self, choice: Option<&str>) -> Result<BackendKind, ConfigError> {
        match choice.or(self.general.backend.as_deref()) {
            Some(name) => name.parse(),
            None => Err(ConfigError::MissingField {
                section: "general".to_string(),
                field: "backend".to_string(),
            }),
        }
    }

    pub fn figshare(&self) -> Result<&FigshareConfig, ConfigError> {
        let section = section(self.figshare.as_ref(), "figshare")?;
        require("figshare", "token", &section.token)?;
        Ok(section)
    }

    pub fn zenodo(&self) -> Result<&ZenodoConfig, ConfigError> {
        let section = section(self.zenodo.as_ref(), "zenodo")?;
        require("zenodo", "token", &section.token)?;
        Ok(section)
    }

    pub fn dspace(&self) -> Result<&DSpaceConfig, ConfigError> {
        let section = section(self.dspace.as_ref(), "dspace")?;
        require("dspace", "service_document_url", &section.service_document_url)?;
        require("dspace", "user_name", &section.user_name)?;
        Ok(section)
    }

    /// Check that the section for `kind` is present and complete
    pub fn validate_for(&self, kind: BackendKind) -> Result<(), ConfigError> {
        match kind {
            BackendKind::Figshare => self.figshare().map(|_| ()),
            BackendKind::Zenodo => self.zenodo().map(|_| ()),
            BackendKind::DSpace => self.dspace().map(|_| ()),
            BackendKind::Memory => Ok(()),
        }
    }

    pub fn timeout_secs(&self) -> u64 {
        self.general.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS)
    }

    pub fn reconciler_options(&self) -> ReconcilerOptions {
        let mut options = ReconcilerOptions::default();
        if let Some(dir) = &self.general.staging_dir {
            options.staging_dir = dir.clone();
        }
        options.software_category = self.general.software_category.clone();
        options
    }
}

fn section<'c, T>(value: Option<&'c T>, name: &str) -> Result<&'c T, ConfigError> {
    value.ok_or_else(|| ConfigError::MissingSection(name.to_string()))
}

fn require(section: &str, field: &str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        Err(ConfigError::MissingField {
            section: section.to_string(),
            field: field.to_string(),
        })
    } else {
        Ok(())
    }
}

fn legacy_value(key: &str, value: &str) -> Result<toml::Value, String> {
    let value = value.trim_matches('"');
    if INTEGER_KEYS.contains(&key) {
        return value
            .parse::<i64>()
            .map(toml::Value::Integer)
            .map_err(|_| format!("{} must be an integer", key));
    }
    if BOOLEAN_KEYS.contains(&key) {
        return match value.to_ascii_lowercase().as_str() {
            "true" | "yes" | "1" => Ok(toml::Value::Boolean(true)),
            "false" | "no" | "0" => Ok(toml::Value::Boolean(false)),
            _ => Err(format!("{} must be true or false", key)),
        };
    }
    Ok(toml::Value::String(value.to_string()))
}
