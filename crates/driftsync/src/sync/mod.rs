//! Sync-marker persistence: the high-water mark of reconciliation.
//!
//! The marker records the most recent fully-reconciled revision. Two
//! interchangeable backends exist: a force-pushed git tag, and an
//! externally-owned resource record. Adding a backend means adding a type,
//! not a branch at every call site.

pub mod resource;
pub mod tag;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use crate::git::types::SyncMarkerAction;
use crate::git::Result;
pub use resource::ResourceSyncProvider;
pub use tag::TagSyncProvider;

/// Where the agent keeps its sync marker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StateMode {
    /// The marker is a tag in the synced repository itself.
    #[default]
    GitTag,
    /// The marker lives in an externally-managed resource store.
    Resource,
}

impl std::fmt::Display for StateMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StateMode::GitTag => write!(f, "git-tag"),
            StateMode::Resource => write!(f, "resource"),
        }
    }
}

/// Persistence of the reconciliation high-water mark.
#[async_trait]
pub trait SyncProvider: Send + Sync {
    /// The revision the marker currently points at, or `None` if it has
    /// never been set. A missing marker is an answer, not an error.
    async fn get_revision(&self) -> Result<Option<String>>;

    /// Moves the marker to `action.revision`, annotated with
    /// `action.message`. The signing key defaults to the provider's
    /// configured key when the action omits one.
    async fn update_marker(&self, action: SyncMarkerAction) -> Result<()>;

    /// Clears the marker.
    async fn delete_marker(&self) -> Result<()>;
}
