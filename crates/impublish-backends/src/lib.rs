//! Impublish Backends - Repository service clients
//!
//! Implementations of [`impublish_core::RepositoryBackend`]:
//!
//! - **Figshare**: REST API v2 with personal tokens
//! - **Zenodo**: deposit REST API with personal tokens
//! - **DSpace**: SWORD v2 deposits with basic auth
//!
//! All clients are blocking (`reqwest::blocking`). Dry runs use
//! [`impublish_core::InMemoryBackend`], also reachable through
//! [`build_backend`] as `memory`.

mod http;

pub mod dspace;
pub mod figshare;
pub mod zenodo;

pub use dspace::{DSpaceBackend, dspace_profile};
pub use figshare::{figshare_profile, FigshareBackend};
pub use zenodo::{zenodo_profile, ZenodoBackend};

use impublish_core::{BackendError, BackendKind, ConfigError, ImpublishConfig, InMemoryBackend, RepositoryBackend};
use std::time::Duration;
use thiserror::Error;

/// Failure to construct a backend
#[derive(Error, Debug)]
pub enum BackendSetupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Could not connect to {backend}: {source}")]
    Connect {
        backend: BackendKind,
        #[source]
        source: BackendError,
    },
}

/// Build the backend `kind` from its config section.
pub fn build_backend(
    config: &ImpublishConfig,
    kind: BackendKind,
) -> Result<Box<dyn RepositoryBackend>, BackendSetupError> {
    let timeout = Duration::from_secs(config.timeout_secs());
    let connect = |source| BackendSetupError::Connect { backend: kind, source };

    let backend: Box<dyn RepositoryBackend> = match kind {
        BackendKind::Figshare => Box::new(FigshareBackend::new(config.figshare()?, timeout).map_err(connect)?),
        BackendKind::Zenodo => Box::new(ZenodoBackend::new(config.zenodo()?, timeout).map_err(connect)?),
        BackendKind::DSpace => Box::new(DSpaceBackend::connect(config.dspace()?, timeout).map_err(connect)?),
        BackendKind::Memory => Box::new(InMemoryBackend::new()),
    };
    tracing::debug!("Using {} backend", backend.name());
    Ok(backend)
}
