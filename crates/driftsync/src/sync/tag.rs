//! Tag-backed sync marker: a signed, force-moved, force-pushed tag.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::{SyncMarkerAction, SyncProvider};
use crate::git::error::{GitError, Result};
use crate::git::with_timeout;
use crate::git::GitClient;

/// Keeps the sync marker as an annotated tag in the synced repository,
/// operating on the mirror directory and pushing to the real upstream.
pub struct TagSyncProvider {
    git: Arc<dyn GitClient>,
    working_dir: PathBuf,
    tag: String,
    upstream_url: String,
    signing_key: Option<String>,
    user_name: String,
    user_email: String,
    timeout: Duration,
}

impl TagSyncProvider {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        git: Arc<dyn GitClient>,
        working_dir: impl Into<PathBuf>,
        tag: impl Into<String>,
        upstream_url: impl Into<String>,
        signing_key: Option<String>,
        user_name: impl Into<String>,
        user_email: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            git,
            working_dir: working_dir.into(),
            tag: tag.into(),
            upstream_url: upstream_url.into(),
            signing_key,
            user_name: user_name.into(),
            user_email: user_email.into(),
            timeout,
        }
    }

    /// Validates the GPG signature on the marker tag. Independent of
    /// [`update_marker`](SyncProvider::update_marker) so trust policy can be
    /// enforced on markers written by other parties.
    pub async fn verify_sync_tag(&self) -> Result<()> {
        with_timeout(self.timeout, self.git.verify_tag(&self.working_dir, &self.tag)).await
    }
}

#[async_trait]
impl SyncProvider for TagSyncProvider {
    async fn get_revision(&self) -> Result<Option<String>> {
        with_timeout(self.timeout, self.git.ref_revision(&self.working_dir, &self.tag)).await
    }

    /// Moves the tag and force-pushes it as one unit of work. A local-only
    /// move without a successful push is a failure, never a durable progress
    /// update: on a failed push the tag is put back at its previous position
    /// (or removed, if it had never been set), so `get_revision` never
    /// observes a partially completed update.
    async fn update_marker(&self, mut action: SyncMarkerAction) -> Result<()> {
        if action.signing_key.is_none() {
            action.signing_key = self.signing_key.clone();
        }

        with_timeout(
            self.timeout,
            self.git
                .set_identity(&self.working_dir, &self.user_name, &self.user_email),
        )
        .await?;

        let prior = with_timeout(
            self.timeout,
            self.git.ref_revision(&self.working_dir, &self.tag),
        )
        .await?;

        with_timeout(
            self.timeout,
            self.git.move_tag(&self.working_dir, &self.tag, &action),
        )
        .await?;

        let refspec = format!("refs/tags/{}:refs/tags/{}", self.tag, self.tag);
        let pushed = with_timeout(
            self.timeout,
            self.git.push_tag(&self.working_dir, &self.upstream_url, &refspec),
        )
        .await;

        if let Err(e) = pushed {
            let rollback = match prior {
                Some(revision) => {
                    let restore = SyncMarkerAction {
                        revision,
                        message: action.message.clone(),
                        signing_key: action.signing_key.clone(),
                    };
                    with_timeout(
                        self.timeout,
                        self.git.move_tag(&self.working_dir, &self.tag, &restore),
                    )
                    .await
                }
                None => {
                    with_timeout(self.timeout, self.git.delete_tag(&self.working_dir, &self.tag))
                        .await
                }
            };
            if let Err(rollback_err) = rollback {
                log::warn!(
                    "failed to roll back sync tag {} after push failure: {}",
                    self.tag,
                    rollback_err
                );
            }
            return Err(GitError::push(&self.upstream_url, e));
        }
        Ok(())
    }

    async fn delete_marker(&self) -> Result<()> {
        with_timeout(
            self.timeout,
            self.git.delete_tag(&self.working_dir, &self.tag),
        )
        .await?;
        with_timeout(
            self.timeout,
            self.git
                .delete_remote_tag(&self.working_dir, &self.upstream_url, &self.tag),
        )
        .await
    }
}
