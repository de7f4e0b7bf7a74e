//! impublish - publish software snapshots and datasets to research repositories
//!
//! Exit codes: 0 on success, 1 when publishing failed, 2 when setup failed
//! (configuration, backend connection, version control detection).

mod policy;

use clap::{Parser, Subcommand};
use impublish_backends::{build_backend, BackendSetupError};
use impublish_core::{
    BackendKind, ChecksumError, ChecksumTracker, ConfigError, DatasetParameters, ImpublishConfig,
    PublishError, PublishOutcome, RecordId, Reconciler, RepositoryBackend, VcsError,
};
use policy::CliPolicy;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "impublish")]
#[command(about = "Publish software and data to Figshare, Zenodo or DSpace")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (default: $IMPUBLISH_CONFIG, ./impublish.toml, user config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Backend to use instead of [general] backend
    #[arg(long, global = true)]
    backend: Option<String>,

    /// Run against an in-memory backend; nothing leaves this machine
    #[arg(long, global = true)]
    dry_run: bool,

    /// Keep records whose upload verification found missing files
    #[arg(long, short = 'y', global = true, conflicts_with = "abort_on_shortfall")]
    yes: bool,

    /// Abort and roll back when upload verification finds missing files
    #[arg(long, global = true)]
    abort_on_shortfall: bool,

    /// Print the outcome as JSON
    #[arg(long, global = true)]
    json: bool,

    /// More logging (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Publish the current revision of a version-controlled source tree
    Software {
        /// Software name; the record is titled NAME-VERSION
        name: String,

        /// Working tree to publish
        #[arg(long, default_value = ".")]
        repo: PathBuf,

        /// Revision to publish (default: the checked-out one)
        #[arg(long)]
        version: Option<String>,

        /// Leave the record as a private draft
        #[arg(long)]
        private: bool,
    },

    /// Publish a dataset, or update an existing one with changed files
    Data {
        #[arg(long)]
        title: String,

        #[arg(long)]
        description: String,

        /// Tag to attach (repeatable)
        #[arg(long = "tag")]
        tags: Vec<String>,

        #[arg(long)]
        category: Option<String>,

        /// Existing record to update
        #[arg(long)]
        pid: Option<String>,

        /// Leave the record as a private draft
        #[arg(long)]
        private: bool,

        /// Files to publish
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// List files whose content changed since their last upload
    Modified {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

#[derive(Error, Debug)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Backend(#[from] BackendSetupError),

    #[error(transparent)]
    Vcs(#[from] VcsError),

    #[error(transparent)]
    Publish(#[from] PublishError),

    #[error(transparent)]
    Checksum(#[from] ChecksumError),

    #[error("Cannot write output: {0}")]
    Output(#[from] serde_json::Error),
}

impl CliError {
    fn exit_code(&self) -> u8 {
        match self {
            CliError::Publish(_) | CliError::Checksum(_) | CliError::Output(_) => 1,
            CliError::Config(_) | CliError::Backend(_) | CliError::Vcs(_) => 2,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            eprintln!("Error: {}", e);
            ExitCode::from(e.exit_code())
        }
    }
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: Cli) -> Result<(), CliError> {
    let policy = || CliPolicy::from_flags(cli.yes, cli.abort_on_shortfall);

    let outcome = match cli.command {
        Commands::Modified { files } => return modified_command(&files),
        Commands::Software {
            name,
            repo,
            version,
            private,
        } => {
            // Before the backend: DSpace contacts its server on connect
            let vcs = impublish_vcs::detect_vcs(&repo)?;
            let session = Session::open(cli.config.as_deref(), cli.backend.as_deref(), cli.dry_run)?;
            let outcome = session
                .reconciler(policy())
                .publish_software(&name, vcs.as_ref(), version.as_deref(), private)?;
            outcome
        }
        Commands::Data {
            title,
            description,
            tags,
            category,
            pid,
            private,
            files,
        } => {
            let session = Session::open(cli.config.as_deref(), cli.backend.as_deref(), cli.dry_run)?;
            let parameters = DatasetParameters {
                title,
                description,
                files,
                tags,
                category,
            };
            let pid = pid.map(RecordId::new);
            let outcome = session
                .reconciler(policy())
                .publish_data(&parameters, pid.as_ref(), private)?;
            outcome
        }
    };

    report(&outcome, cli.json)
}

/// Loaded configuration plus the backend it selects
struct Session {
    config: ImpublishConfig,
    backend: Box<dyn RepositoryBackend>,
}

impl Session {
    fn open(config_path: Option<&Path>, backend: Option<&str>, dry_run: bool) -> Result<Self, CliError> {
        let config = load_config(config_path, dry_run)?;
        let kind = if dry_run {
            BackendKind::Memory
        } else {
            config.backend_kind(backend)?
        };
        config.validate_for(kind)?;
        let backend = build_backend(&config, kind)?;
        Ok(Self { config, backend })
    }

    fn reconciler(&self, policy: CliPolicy) -> Reconciler<'_> {
        Reconciler::new(self.backend.as_ref())
            .with_options(self.config.reconciler_options())
            .with_policy(policy)
    }
}

fn load_config(path: Option<&Path>, dry_run: bool) -> Result<ImpublishConfig, ConfigError> {
    load_config_from(path, &ImpublishConfig::candidate_paths(), dry_run)
}

fn load_config_from(
    path: Option<&Path>,
    candidates: &[PathBuf],
    dry_run: bool,
) -> Result<ImpublishConfig, ConfigError> {
    let loaded = match path {
        Some(path) => ImpublishConfig::load(path),
        None => ImpublishConfig::load_first(candidates),
    };
    match loaded {
        // A dry run needs no credentials
        Err(ConfigError::NotFound(_)) if dry_run => Ok(ImpublishConfig::default()),
        other => other,
    }
}

fn modified_command(files: &[PathBuf]) -> Result<(), CliError> {
    let modified = ChecksumTracker::default().find_modified(files)?;
    for path in &modified {
        println!("{}", path.display());
    }
    tracing::info!("{} of {} file(s) modified", modified.len(), files.len());
    Ok(())
}

fn report(outcome: &PublishOutcome, json: bool) -> Result<(), CliError> {
    if json {
        println!("{}", serde_json::to_string_pretty(outcome)?);
        return Ok(());
    }
    let doi = outcome.doi.as_deref().unwrap_or("none");
    if outcome.created {
        println!("Published record {} (DOI: {})", outcome.id, doi);
    } else if outcome.uploaded.is_empty() {
        println!("Already published as record {} (DOI: {})", outcome.id, doi);
    } else {
        println!("Updated record {} (DOI: {})", outcome.id, doi);
    }
    for path in &outcome.skipped {
        println!("  skipped (missing): {}", path.display());
    }
    if !outcome.verified {
        println!("  warning: upload verification found missing files");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_data_command() {
        let cli = Cli::try_parse_from([
            "impublish", "--dry-run", "data", "--title", "Tidal run", "--description", "Model output",
            "--tag", "ocean", "--tag", "tides", "--pid", "42", "a.h5", "b.h5",
        ])
        .unwrap();
        assert!(cli.dry_run);
        match cli.command {
            Commands::Data { tags, pid, files, .. } => {
                assert_eq!(tags, vec!["ocean".to_string(), "tides".to_string()]);
                assert_eq!(pid.as_deref(), Some("42"));
                assert_eq!(files.len(), 2);
            }
            _ => panic!("expected data command"),
        }
    }

    #[test]
    fn yes_conflicts_with_abort() {
        assert!(Cli::try_parse_from(["impublish", "-y", "--abort-on-shortfall", "modified", "a"]).is_err());
    }

    #[test]
    fn setup_and_publish_failures_have_distinct_codes() {
        let setup = CliError::Config(ConfigError::UnknownBackend("dropbox".to_string()));
        assert_eq!(setup.exit_code(), 2);
        let publish = CliError::Publish(PublishError::RecordNotFound(RecordId::from("1")));
        assert_eq!(publish.exit_code(), 1);
    }

    #[test]
    fn dry_run_tolerates_missing_default_config() {
        let dir = tempfile::tempdir().unwrap();
        let candidates = vec![dir.path().join("impublish.toml"), dir.path().join("config.toml")];

        assert_eq!(load_config_from(None, &candidates, true).unwrap(), ImpublishConfig::default());
        assert!(matches!(
            load_config_from(None, &candidates, false),
            Err(ConfigError::NotFound(paths)) if paths == candidates
        ));
    }

    #[test]
    fn default_lookup_takes_first_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let second = dir.path().join("config.toml");
        std::fs::write(&second, "[general]\nbackend = \"zenodo\"\n").unwrap();
        let candidates = vec![dir.path().join("impublish.toml"), second];

        let config = load_config_from(None, &candidates, false).unwrap();
        assert_eq!(config.backend_kind(None).unwrap(), BackendKind::Zenodo);
    }

    #[test]
    fn explicit_missing_config_is_an_error_even_when_dry() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("none.toml");
        assert!(matches!(load_config(Some(&missing), true), Err(ConfigError::Io { .. })));
        assert!(matches!(load_config(Some(&missing), false), Err(ConfigError::Io { .. })));
    }

    #[test]
    fn dry_run_publishes_dataset_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.txt");
        std::fs::write(&file, "alpha").unwrap();
        let config_path = dir.path().join("impublish.toml");
        std::fs::write(&config_path, "[general]\nbackend = \"memory\"\n").unwrap();

        let cli = Cli::try_parse_from([
            "impublish".to_string(),
            "--config".to_string(),
            config_path.display().to_string(),
            "--abort-on-shortfall".to_string(),
            "data".to_string(),
            "--title".to_string(),
            "t".to_string(),
            "--description".to_string(),
            "d".to_string(),
            file.display().to_string(),
        ])
        .unwrap();
        run(cli).unwrap();
        assert!(!ChecksumTracker::default().is_modified(&file).unwrap());
    }

    #[test]
    fn untracked_tree_fails_before_contacting_the_backend() {
        let dir = tempfile::tempdir().unwrap();
        let tree = dir.path().join("tree");
        std::fs::create_dir(&tree).unwrap();
        let config_path = dir.path().join("impublish.toml");
        // Nothing listens on port 9; connecting would fail with a backend error
        std::fs::write(
            &config_path,
            "[general]\nbackend = \"dspace\"\n\n[dspace]\n\
             service_document_url = \"http://127.0.0.1:9/swordv2/servicedocument\"\n\
             user_name = \"u\"\nuser_pass = \"p\"\n",
        )
        .unwrap();

        let cli = Cli::try_parse_from([
            "impublish".to_string(),
            "--config".to_string(),
            config_path.display().to_string(),
            "software".to_string(),
            "Demo".to_string(),
            "--repo".to_string(),
            tree.display().to_string(),
        ])
        .unwrap();
        let err = run(cli).unwrap_err();
        assert!(matches!(err, CliError::Vcs(_)), "unexpected error: {}", err);
        assert_eq!(err.exit_code(), 2);
    }
}
