//! Disposable working clone for one commit+push transaction.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::client::GitClient;
use super::error::{GitError, Result};
use super::types::{manifest_dirs, CheckoutConfig, CommitAction, Remote};
use super::with_timeout;

/// A local working clone of the remote repo, intended for one-off
/// transactions: committing changes, then pushing upstream. It has no
/// locking; it is single-owner by contract.
///
/// The commit and the note are local and reversible right up until the push,
/// which is the only irreversible step: retrying a failed push is safe while
/// the same commit is current, retrying a commit is not, hence the upfront
/// empty-diff check in [`commit_and_push`](Checkout::commit_and_push).
pub struct Checkout {
    dir: PathBuf,
    config: CheckoutConfig,
    upstream: Remote,
    // Cached long form of the notes ref, since we push it by that name.
    real_notes_ref: String,
    git: Arc<dyn GitClient>,
    timeout: Duration,
}

impl std::fmt::Debug for Checkout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Checkout")
            .field("dir", &self.dir)
            .field("config", &self.config)
            .field("upstream", &self.upstream)
            .field("real_notes_ref", &self.real_notes_ref)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl Checkout {
    pub(crate) fn new(
        dir: PathBuf,
        config: CheckoutConfig,
        upstream: Remote,
        real_notes_ref: String,
        git: Arc<dyn GitClient>,
        timeout: Duration,
    ) -> Self {
        Self {
            dir,
            config,
            upstream,
            real_notes_ref,
            git,
            timeout,
        }
    }

    /// Path to the working clone.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Paths to the manifest directories; always at least one, so the result
    /// can be handed straight to a manifest loader.
    pub fn manifest_dirs(&self) -> Vec<PathBuf> {
        manifest_dirs(&self.dir, &self.config.paths)
    }

    /// Commits changes made in this checkout, attaches any extra data as a
    /// note, and pushes the commit (and note) to the remote repo.
    ///
    /// Fails with [`GitError::NoChanges`] when the diff over the configured
    /// paths is empty; no commit is created and nothing is pushed.
    pub async fn commit_and_push<N>(
        &self,
        mut action: CommitAction,
        note: Option<&N>,
    ) -> Result<()>
    where
        N: Serialize + Sync,
    {
        let changed = with_timeout(
            self.timeout,
            self.git.has_changes(&self.dir, &self.config.paths),
        )
        .await?;
        if !changed {
            return Err(GitError::NoChanges);
        }

        // Mark the commit as our own so downstream tooling can skip it
        // instead of reconciling in a loop.
        action.message.push_str(&self.config.skip_message);
        if action.signing_key.is_none() {
            action.signing_key = self.config.signing_key.clone();
        }

        with_timeout(self.timeout, self.git.commit(&self.dir, &action)).await?;

        if let Some(note) = note {
            let rev = self.head_revision().await?;
            let payload = serde_json::to_string(note)?;
            with_timeout(
                self.timeout,
                self.git
                    .add_note(&self.dir, &rev, &self.config.notes_ref, &payload),
            )
            .await?;
        }

        let mut refs = vec![self.config.branch.clone()];
        // A notes ref that has never been pushed has no remote counterpart
        // to update under the short name, so only push it once it exists.
        if with_timeout(self.timeout, self.git.ref_exists(&self.dir, &self.real_notes_ref)).await? {
            refs.push(self.real_notes_ref.clone());
        }

        with_timeout(
            self.timeout,
            self.git.push(&self.dir, &self.upstream.url, &refs),
        )
        .await
        .map_err(|e| GitError::push(&self.upstream.url, e))
    }

    /// The note attached to `rev`, or `None` if there is no such note.
    pub async fn get_note<N>(&self, rev: &str) -> Result<Option<N>>
    where
        N: DeserializeOwned,
    {
        let payload = with_timeout(
            self.timeout,
            self.git.show_note(&self.dir, &self.real_notes_ref, rev),
        )
        .await?;
        match payload {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// The revision of the current git HEAD.
    pub async fn head_revision(&self) -> Result<String> {
        let rev = with_timeout(self.timeout, self.git.ref_revision(&self.dir, "HEAD")).await?;
        rev.ok_or_else(|| GitError::Command("no revision for HEAD".to_string()))
    }

    /// Files changed since `ref` under the configured paths, as absolute
    /// paths into this checkout.
    pub async fn changed_files(&self, r: &str) -> Result<Vec<PathBuf>> {
        let files = with_timeout(
            self.timeout,
            self.git.changed_files(&self.dir, r, &self.config.paths),
        )
        .await?;
        Ok(files.into_iter().map(|f| self.dir.join(f)).collect())
    }

    /// All revisions carrying a note. The ordering git reports is not
    /// meaningful, so membership queries are the intended use.
    pub async fn note_rev_list(&self) -> Result<HashSet<String>> {
        with_timeout(
            self.timeout,
            self.git.note_rev_list(&self.dir, &self.real_notes_ref),
        )
        .await
    }

    /// Removes the working clone.
    pub fn clean(&self) {
        if let Err(e) = std::fs::remove_dir_all(&self.dir) {
            if e.kind() != std::io::ErrorKind::NotFound {
                log::warn!("failed to remove working clone {}: {}", self.dir.display(), e);
            }
        }
    }
}
