//! Git-layer error types.

use thiserror::Error;

/// Errors surfaced by the git layer.
///
/// Variants carry owned strings so a value can be stored in mirror state and
/// replayed to later status queries.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GitError {
    #[error("git repo does not have valid config")]
    NoConfig,

    #[error("git repo has not been cloned yet")]
    NotCloned,

    #[error("git repo has been cloned but not yet checked for write access")]
    ClonedOnly,

    #[error("git repo not ready: {source}")]
    NotReady {
        #[source]
        source: Box<GitError>,
    },

    #[error("git operation timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("no changes made in repo")]
    NoChanges,

    #[error("failed to push to {upstream}: {source}")]
    Push {
        upstream: String,
        #[source]
        source: Box<GitError>,
    },

    #[error("git network error: {0}")]
    Network(String),

    #[error("git authentication failed: {0}")]
    Auth(String),

    #[error("git command failed: {0}")]
    Command(String),

    #[error("i/o error: {0}")]
    Io(String),

    #[error("note payload error: {0}")]
    Note(String),
}

impl GitError {
    /// Wraps an error as the blocking cause of a not-ready repo.
    pub fn not_ready(source: GitError) -> Self {
        GitError::NotReady {
            source: Box::new(source),
        }
    }

    /// Wraps a push failure with the remote it targeted, for
    /// permission/connectivity triage.
    pub fn push(upstream: impl Into<String>, source: GitError) -> Self {
        GitError::Push {
            upstream: upstream.into(),
            source: Box::new(source),
        }
    }

    /// Returns true if the error is likely transient and the operation can be
    /// retried from a clean state.
    pub fn is_retryable(&self) -> bool {
        match self {
            GitError::Network(_) | GitError::Timeout { .. } => true,
            GitError::Push { source, .. } => source.is_retryable(),
            _ => false,
        }
    }
}

impl From<std::io::Error> for GitError {
    fn from(err: std::io::Error) -> Self {
        GitError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for GitError {
    fn from(err: serde_json::Error) -> Self {
        GitError::Note(err.to_string())
    }
}

/// Classifies an extracted git diagnostic into a more specific variant.
pub fn classify_git_error(message: &str) -> GitError {
    let lower = message.to_lowercase();

    if lower.contains("could not resolve host")
        || lower.contains("connection refused")
        || lower.contains("connection timed out")
        || lower.contains("network is unreachable")
        || lower.contains("unable to access")
        || lower.contains("failed to connect")
        || lower.contains("couldn't connect to server")
        || lower.contains("the remote end hung up unexpectedly")
    {
        return GitError::Network(message.trim().to_string());
    }

    if lower.contains("authentication failed")
        || lower.contains("permission denied")
        || lower.contains("invalid credentials")
    {
        return GitError::Auth(message.trim().to_string());
    }

    GitError::Command(message.trim().to_string())
}

/// Result type for git operations.
pub type Result<T> = std::result::Result<T, GitError>;
