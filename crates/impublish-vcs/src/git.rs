//! Git working trees
//!
//! Snapshots come from `git archive`. When the local clone cannot produce
//! the requested revision (shallow, stale or damaged clone) the archive is
//! downloaded from the `origin` remote instead, using the
//! `<repository>/archive/<revision>.zip` URL convention of GitHub.

use crate::command::{absolute, first_nonempty_line, run_command};
use impublish_core::{VcsError, VcsKind, VersionControl};
use reqwest::blocking::Client;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(300);

/// A git working tree, addressed by its top-level directory.
#[derive(Debug, Clone)]
pub struct GitRepository {
    root: PathBuf,
}

impl GitRepository {
    /// Open the working tree containing `path`.
    pub fn open(path: &Path) -> Result<Self, VcsError> {
        let stdout = run_command("git", &["rev-parse", "--show-toplevel"], path).map_err(|e| {
            tracing::debug!("{} is not a git working tree: {}", path.display(), e);
            VcsError::NotUnderVersionControl(path.to_path_buf())
        })?;
        let root = first_nonempty_line(&stdout)
            .ok_or_else(|| VcsError::NotUnderVersionControl(path.to_path_buf()))?;
        Ok(Self {
            root: PathBuf::from(root),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// URL of the `origin` remote, if one is configured
    pub fn origin_url(&self) -> Option<String> {
        run_command("git", &["remote", "get-url", "origin"], &self.root)
            .ok()
            .and_then(|out| first_nonempty_line(&out).map(str::to_string))
    }

    fn download_archive(&self, revision: &str, destination: &Path) -> Result<(), String> {
        let origin = self
            .origin_url()
            .ok_or_else(|| "no origin remote to download from".to_string())?;
        let url = archive_url(&origin, revision)
            .ok_or_else(|| format!("cannot derive an archive URL from origin {}", origin))?;

        tracing::info!("Downloading {} revision {} from {}", self.root.display(), revision, url);
        let client = Client::builder()
            .timeout(DOWNLOAD_TIMEOUT)
            .build()
            .map_err(|e| e.to_string())?;
        let response = client.get(url.clone()).send().map_err(|e| e.to_string())?;
        if !response.status().is_success() {
            return Err(format!("GET {} returned {}", url, response.status()));
        }
        let bytes = response.bytes().map_err(|e| e.to_string())?;
        std::fs::write(destination, &bytes).map_err(|e| e.to_string())?;
        tracing::info!("Download successful ({} bytes)", bytes.len());
        Ok(())
    }
}

impl VersionControl for GitRepository {
    fn kind(&self) -> VcsKind {
        VcsKind::Git
    }

    fn current_revision(&self) -> Result<String, VcsError> {
        let stdout = run_command("git", &["rev-parse", "HEAD"], &self.root)?;
        first_nonempty_line(&stdout)
            .map(str::to_string)
            .ok_or_else(|| VcsError::Command {
                command: "git rev-parse HEAD".to_string(),
                message: "empty output".to_string(),
            })
    }

    fn archive(&self, revision: &str, destination: &Path) -> Result<(), VcsError> {
        let destination = absolute(destination)?;
        let dest = destination.to_string_lossy();
        let local = run_command(
            "git",
            &["archive", "--format=zip", "-o", dest.as_ref(), revision],
            &self.root,
        );

        let local_err = match local {
            Ok(_) => return Ok(()),
            Err(e) => e,
        };
        tracing::warn!(
            "Local archive of {} failed ({}); trying the origin remote",
            revision,
            local_err
        );

        self.download_archive(revision, &destination)
            .map_err(|download_err| {
                // Leave no partial file behind
                let _ = std::fs::remove_file(&destination);
                VcsError::Archive {
                    revision: revision.to_string(),
                    message: format!("{}; download fallback: {}", local_err, download_err),
                }
            })
    }

    fn working_directory(&self) -> PathBuf {
        self.root.clone()
    }
}

/// `<origin without .git>/archive/<revision>.zip`.
///
/// SSH remotes (`git@host:owner/repo.git`, `ssh://`, `git://`) are rewritten
/// to HTTPS; local remotes such as `file://` have no archive URL.
pub fn archive_url(origin: &str, revision: &str) -> Option<Url> {
    let origin = origin.trim();
    let https = match origin.split_once("://") {
        Some(("http", _)) | Some(("https", _)) => origin.to_string(),
        // ssh:// and git:// cannot be re-schemed to https by `Url`; rebuild
        Some(("ssh", rest)) | Some(("git", rest)) | Some(("git+ssh", rest)) => {
            let (authority, path) = rest.split_once('/')?;
            let host = authority.rsplit('@').next()?;
            let host = host.split(':').next()?;
            format!("https://{}/{}", host, path)
        }
        Some(_) => return None,
        None => {
            let (user_host, path) = origin.split_once(':')?;
            let host = user_host.rsplit('@').next()?;
            format!("https://{}/{}", host, path.trim_start_matches('/'))
        }
    };
    let base = https.trim_end_matches('/');
    let base = base.strip_suffix(".git").unwrap_or(base);

    let mut url = Url::parse(base).ok()?;
    let _ = url.set_username("");
    let _ = url.set_password(None);
    url.path_segments_mut()
        .ok()?
        .push("archive")
        .push(&format!("{}.zip", revision));
    Some(url)
}
