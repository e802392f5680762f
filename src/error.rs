// Error types shared by the menu, the credential flows and the tool session.
// None of these ever escape the menu loop: each action boundary turns them
// into an operator-visible message.

use std::path::PathBuf;
use thiserror::Error;

/// Failures of one run of the external download tool.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// The binary could not be located on the search path.
    #[error("{0} is not installed or not in PATH")]
    ToolNotFound(String),

    /// The tool ran but exited with a non-zero status (-1 when killed by a signal).
    #[error("download tool exited with status {0}")]
    ToolFailed(i32),

    /// The configured session timeout elapsed and the tool was killed.
    #[error("download tool timed out after {0} seconds")]
    TimedOut(u64),

    /// Any other I/O fault while spawning or reading from the tool.
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

/// Problems with a credentials file. Reported and retried, never propagated
/// past the credential resolver.
#[derive(Error, Debug)]
pub enum CredentialError {
    #[error("file not found: {}", .0.display())]
    PathNotFound(PathBuf),

    #[error(
        "{} has {found} non-blank line(s); expected a username and a password on separate lines",
        path.display()
    )]
    MalformedCredentialFile { path: PathBuf, found: usize },

    #[error("error reading {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Problems loading the batch manifest.
#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("{} not found. Run Setup to create it.", .0.display())]
    PathNotFound(PathBuf),

    #[error("error reading {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Problems loading or creating the settings file.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("io error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid settings json at {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}
