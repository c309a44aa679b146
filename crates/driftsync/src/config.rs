//! Settings for the reconciliation core, loadable from a YAML file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::git::{CheckoutConfig, Remote};
use crate::sync::StateMode;

/// Errors from loading settings.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read settings file '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse settings file '{path}': {message}")]
    Parse { path: PathBuf, message: String },
}

/// Synchronization settings.
///
/// Every field has a default so a minimal file (or an empty one) parses; an
/// empty `url` produces a permanently unconfigured mirror.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncSettings {
    /// Repository URL to sync with.
    #[serde(default)]
    pub url: String,

    /// Branch to sync to.
    #[serde(default = "default_branch")]
    pub branch: String,

    /// Which marker backend records reconciliation progress.
    #[serde(default)]
    pub state_mode: StateMode,

    /// Paths within the repo containing the files we care about.
    #[serde(default)]
    pub paths: Vec<String>,

    /// The agent may read but never write the repo.
    #[serde(default)]
    pub read_only: bool,

    /// Background fetch period in seconds.
    #[serde(default = "default_poll_interval")]
    pub poll_interval: u64,

    /// Deadline for a single git operation in seconds.
    #[serde(default = "default_op_timeout")]
    pub op_timeout: u64,

    /// Name of the sync-marker tag (or external resource).
    #[serde(default = "default_sync_marker_name")]
    pub sync_marker_name: String,

    /// Short name of the notes ref carrying commit metadata.
    #[serde(default = "default_notes_ref")]
    pub notes_ref: String,

    /// Committer name.
    #[serde(default = "default_user_name")]
    pub user_name: String,

    /// Committer email.
    #[serde(default = "default_user_email")]
    pub user_email: String,

    /// Default GPG key for commits and the marker tag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signing_key: Option<String>,

    /// Record the requesting user as commit author.
    #[serde(default)]
    pub set_author: bool,

    /// Suffix appended to commit messages so downstream tooling can skip
    /// the agent's own commits.
    #[serde(default = "default_skip_message")]
    pub skip_message: String,

    /// Authentication settings.
    #[serde(default)]
    pub auth: GitAuthSettings,
}

fn default_branch() -> String {
    "master".to_string()
}

fn default_poll_interval() -> u64 {
    300 // 5 minutes
}

fn default_op_timeout() -> u64 {
    20
}

fn default_sync_marker_name() -> String {
    "driftsync-sync".to_string()
}

fn default_notes_ref() -> String {
    "driftsync".to_string()
}

fn default_user_name() -> String {
    "Driftsync".to_string()
}

fn default_user_email() -> String {
    "driftsync@localhost".to_string()
}

fn default_skip_message() -> String {
    "\n\n[ci skip]".to_string()
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            url: String::new(),
            branch: default_branch(),
            state_mode: StateMode::default(),
            paths: Vec::new(),
            read_only: false,
            poll_interval: default_poll_interval(),
            op_timeout: default_op_timeout(),
            sync_marker_name: default_sync_marker_name(),
            notes_ref: default_notes_ref(),
            user_name: default_user_name(),
            user_email: default_user_email(),
            signing_key: None,
            set_author: false,
            skip_message: default_skip_message(),
            auth: GitAuthSettings::default(),
        }
    }
}

impl SyncSettings {
    /// The remote these settings describe.
    pub fn remote(&self) -> Remote {
        Remote {
            url: self.url.clone(),
            branch: self.branch.clone(),
            state_mode: self.state_mode,
        }
    }

    /// The checkout config these settings describe.
    pub fn checkout_config(&self) -> CheckoutConfig {
        CheckoutConfig {
            branch: self.branch.clone(),
            paths: self.paths.clone(),
            read_only: self.read_only,
            sync_marker_name: self.sync_marker_name.clone(),
            notes_ref: self.notes_ref.clone(),
            user_name: self.user_name.clone(),
            user_email: self.user_email.clone(),
            signing_key: self.signing_key.clone(),
            set_author: self.set_author,
            skip_message: self.skip_message.clone(),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval)
    }

    pub fn op_timeout(&self) -> Duration {
        Duration::from_secs(self.op_timeout)
    }
}

/// Git authentication settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GitAuthSettings {
    /// Authentication type: none, token, or ssh-key.
    #[serde(default, rename = "type")]
    pub auth_type: GitAuthType,

    /// Environment variable the token is resolved from at call time; the
    /// token itself is never stored.
    #[serde(default)]
    pub token_env_var: String,

    /// Path to the SSH key file; `~` expands to the home directory.
    #[serde(default)]
    pub ssh_key_path: String,
}

/// Git authentication type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GitAuthType {
    #[default]
    None,
    Token,
    SshKey,
}

/// Loads settings from a YAML file.
pub fn load_settings(path: impl AsRef<Path>) -> Result<SyncSettings, ConfigError> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_yaml::from_str(&raw).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}
