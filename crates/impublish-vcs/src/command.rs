//! External command runner shared by the git and bzr adapters

use impublish_core::VcsError;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Run `program args...` in `cwd` and return its stdout.
///
/// A non-zero exit status becomes [`VcsError::Command`] carrying stderr.
pub(crate) fn run_command(program: &str, args: &[&str], cwd: &Path) -> Result<String, VcsError> {
    let command_line = format!("{} {}", program, args.join(" "));
    tracing::debug!("Running `{}` in {}", command_line, cwd.display());

    let output = Command::new(program)
        .args(args)
        .current_dir(cwd)
        .output()
        .map_err(|err| VcsError::Command {
            command: command_line.clone(),
            message: if err.kind() == std::io::ErrorKind::NotFound {
                format!("{} is not installed or not in PATH", program)
            } else {
                err.to_string()
            },
        })?;

    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        Err(VcsError::Command {
            command: command_line,
            message: if stderr.is_empty() {
                format!("exited with {}", output.status)
            } else {
                stderr
            },
        })
    }
}

pub(crate) fn first_nonempty_line(input: &str) -> Option<&str> {
    input.lines().map(str::trim).find(|line| !line.is_empty())
}

/// Commands run inside the working tree, so relative destinations must be
/// resolved against the caller's directory first.
pub(crate) fn absolute(path: &Path) -> Result<PathBuf, VcsError> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_nonempty_line_trims() {
        assert_eq!(first_nonempty_line("\n\n  abc123  \n"), Some("abc123"));
        assert_eq!(first_nonempty_line(" \n\t\n"), None);
    }

    #[test]
    fn missing_program_is_a_command_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = run_command("impublish-no-such-tool", &["--version"], dir.path()).unwrap_err();
        match err {
            VcsError::Command { command, message } => {
                assert_eq!(command, "impublish-no-such-tool --version");
                assert!(message.contains("not installed"));
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn relative_paths_become_absolute() {
        assert!(absolute(Path::new("out.zip")).unwrap().is_absolute());
        assert_eq!(absolute(Path::new("/tmp/x.zip")).unwrap(), PathBuf::from("/tmp/x.zip"));
    }
}
