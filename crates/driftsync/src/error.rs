//! Crate-level error type.

use thiserror::Error;

/// Any error the reconciliation core can surface.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Git(#[from] crate::git::GitError),

    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),
}

/// Result type alias using the crate-level error.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::GitError;

    #[test]
    fn test_git_error_converts() {
        let err: Error = GitError::NoChanges.into();
        assert_eq!(err.to_string(), "no changes made in repo");
    }
}
