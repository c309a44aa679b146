//! Reconciliation core for a GitOps delivery agent.
//!
//! Keeps a cluster's running state synchronized with the desired state
//! declared in a git repository:
//!
//! - [`git::Mirror`] maintains a bare local mirror of the remote, walking a
//!   readiness state machine (clone, verify write access) and then keeping
//!   itself fetched on a poll interval or on demand.
//! - [`sync::SyncProvider`] records reconciliation progress as a high-water
//!   mark, either as a force-pushed tag or in an external resource store.
//! - [`git::Checkout`] is a disposable working clone performing one
//!   commit+note+push transaction on the user's behalf.
//!
//! The diff/apply logic, cluster client, and manifest handling live in the
//! consuming daemon; this crate only speaks git.

pub mod config;
pub mod error;
pub mod git;
pub mod logging;
pub mod sync;

#[cfg(test)]
pub(crate) mod testutil;

pub use config::{load_settings, ConfigError, GitAuthSettings, GitAuthType, SyncSettings};
pub use error::{Error, Result};
pub use git::{
    Checkout, CheckoutConfig, Commit, CommitAction, GitCli, GitClient, GitError, Mirror,
    MirrorStatus, Remote, SyncMarkerAction,
};
pub use sync::{ResourceSyncProvider, StateMode, SyncProvider, TagSyncProvider};
