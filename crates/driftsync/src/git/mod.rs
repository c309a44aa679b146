//! Git mirror, working checkout, and the underlying CLI primitive layer.

pub mod auth;
pub mod checkout;
pub mod client;
pub mod error;
pub mod mirror;
pub mod parse;
pub mod types;

pub use checkout::Checkout;
pub use client::{GitCli, GitClient};
pub use error::{GitError, Result};
pub use mirror::Mirror;
pub use types::{CheckoutConfig, Commit, CommitAction, MirrorStatus, Remote, SyncMarkerAction};

use std::future::Future;
use std::time::Duration;

/// Runs an external operation under a deadline. Expiry aborts the operation
/// (child processes are killed on drop) and is reported as the distinguished
/// timeout error, never a generic failure.
pub(crate) async fn with_timeout<T>(
    duration: Duration,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    match tokio::time::timeout(duration, fut).await {
        Ok(res) => res,
        Err(_) => Err(GitError::Timeout {
            secs: duration.as_secs(),
        }),
    }
}
