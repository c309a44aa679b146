//! Pure data types for the git layer.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::sync::StateMode;

/// Upstream repository coordinates. Immutable once handed to a
/// [`Mirror`](super::mirror::Mirror).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Remote {
    /// Repository URL. An empty URL means "no repo configured".
    #[serde(default)]
    pub url: String,
    /// Branch being synced.
    #[serde(default = "default_branch")]
    pub branch: String,
    /// Which marker backend is active for this remote.
    #[serde(default)]
    pub state_mode: StateMode,
}

fn default_branch() -> String {
    "master".to_string()
}

impl Remote {
    /// Creates a remote on the default branch in the default state mode.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            branch: default_branch(),
            state_mode: StateMode::default(),
        }
    }
}

/// Progress made synchronising with the upstream repo.
///
/// Listed in expected order; status regresses only to `New` (e.g. when a
/// deploy key is revoked and a fetch starts failing).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MirrorStatus {
    /// Configuration is empty; nothing will ever happen.
    #[serde(rename = "unconfigured")]
    NoConfig,
    /// No attempt made to clone yet, or the last refresh failed.
    New,
    /// Cloned; no attempt made to verify write access.
    Cloned,
    /// Cloned and verified, ready to sync.
    Ready,
}

impl std::fmt::Display for MirrorStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MirrorStatus::NoConfig => write!(f, "unconfigured"),
            MirrorStatus::New => write!(f, "new"),
            MirrorStatus::Cloned => write!(f, "cloned"),
            MirrorStatus::Ready => write!(f, "ready"),
        }
    }
}

/// Values used when working in a checkout of the repo.
#[derive(Debug, Clone, Default)]
pub struct CheckoutConfig {
    /// Branch we are syncing to.
    pub branch: String,
    /// Paths within the repo containing the files we care about. Empty means
    /// the whole repo.
    pub paths: Vec<String>,
    /// The agent may read but never write the repo.
    pub read_only: bool,
    /// Name of the sync-marker tag (or external resource).
    pub sync_marker_name: String,
    /// Short name of the notes ref carrying commit metadata.
    pub notes_ref: String,
    /// Committer name.
    pub user_name: String,
    /// Committer email.
    pub user_email: String,
    /// Default GPG key for commits and the marker tag.
    pub signing_key: Option<String>,
    /// Record the requesting user as commit author.
    pub set_author: bool,
    /// Suffix appended to commit messages so downstream tooling can
    /// recognize the agent's own commits.
    pub skip_message: String,
}

/// Inputs for one commit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitAction {
    /// `Name <email>` of the author, when distinct from the committer.
    pub author: Option<String>,
    pub message: String,
    /// GPG key id; falls back to the checkout's configured key.
    pub signing_key: Option<String>,
}

/// One commit as projected from log queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Commit {
    /// Key id the commit was signed with; empty when unsigned.
    pub signing_key: String,
    pub revision: String,
    /// First line of the commit message.
    pub message: String,
}

/// The sync-marker position to record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncMarkerAction {
    /// Revision the marker should point at.
    pub revision: String,
    /// Annotation explaining the move.
    pub message: String,
    /// GPG key id; falls back to the provider's configured key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signing_key: Option<String>,
}

/// Joins configured sub-paths onto a checkout directory, falling back to the
/// directory itself so callers always get at least one path.
pub fn manifest_dirs(dir: &std::path::Path, paths: &[String]) -> Vec<PathBuf> {
    if paths.is_empty() {
        return vec![dir.to_path_buf()];
    }
    paths.iter().map(|p| dir.join(p)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_ordering_matches_progress() {
        assert!(MirrorStatus::NoConfig < MirrorStatus::New);
        assert!(MirrorStatus::New < MirrorStatus::Cloned);
        assert!(MirrorStatus::Cloned < MirrorStatus::Ready);
    }

    #[test]
    fn test_status_display() {
        assert_eq!(MirrorStatus::NoConfig.to_string(), "unconfigured");
        assert_eq!(MirrorStatus::Ready.to_string(), "ready");
    }

    #[test]
    fn test_status_serialization() {
        assert_eq!(
            serde_json::to_string(&MirrorStatus::NoConfig).unwrap(),
            "\"unconfigured\""
        );
        assert_eq!(serde_json::to_string(&MirrorStatus::Cloned).unwrap(), "\"cloned\"");
    }

    #[test]
    fn test_remote_default_branch() {
        let remote = Remote::new("https://example.com/repo.git");
        assert_eq!(remote.branch, "master");
    }

    #[test]
    fn test_manifest_dirs_fallback() {
        let dir = std::path::Path::new("/work");
        assert_eq!(manifest_dirs(dir, &[]), vec![PathBuf::from("/work")]);

        let paths = vec!["deploy".to_string(), "charts".to_string()];
        assert_eq!(
            manifest_dirs(dir, &paths),
            vec![PathBuf::from("/work/deploy"), PathBuf::from("/work/charts")]
        );
    }
}
