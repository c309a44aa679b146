//! The VCS primitive layer: a thin, structured wrapper over the `git` CLI.
//!
//! Nothing above this layer assembles argument lists, and nothing in this
//! layer knows about mirror states or markers. Policy that git itself
//! enforces is not duplicated here: pushing to a repo without write access
//! fails in git, so `push` simply returns that error.

use std::collections::HashSet;
use std::path::Path;

use async_trait::async_trait;
use tokio::process::Command;

use super::auth::{base_env, build_auth_env};
use super::error::{classify_git_error, GitError, Result};
use super::parse::{find_error_message, parse_note_list, parse_oneline_log, split_list};
use super::types::{Commit, CommitAction, SyncMarkerAction};
use crate::config::GitAuthSettings;

/// Individual VCS operations against a working directory.
///
/// The mirror, checkout, and marker providers talk to the repository only
/// through this trait, so they can be exercised against a fake in unit
/// tests. [`GitCli`] is the production implementation.
#[async_trait]
pub trait GitClient: Send + Sync {
    /// `git clone --mirror <url> <dir>`.
    async fn mirror_clone(&self, dir: &Path, url: &str) -> Result<()>;

    /// `git clone --branch <branch> <src> <target>`. `src` may be a local
    /// mirror path.
    async fn clone_branch(&self, target: &Path, src: &str, branch: &str) -> Result<()>;

    /// `git fetch --tags <upstream> [refspec...]`. A refspec naming a ref the
    /// upstream does not have yet is not an error.
    async fn fetch(&self, dir: &Path, upstream: &str, refspecs: &[String]) -> Result<()>;

    /// `git push <upstream> <ref>...`.
    async fn push(&self, dir: &Path, upstream: &str, refs: &[String]) -> Result<()>;

    /// Sanity-checks that we can write to the upstream repo by pushing and
    /// deleting a disposable tag. Being able to clone is an adequate check
    /// that we can read.
    async fn check_push(&self, dir: &Path, upstream: &str) -> Result<()>;

    /// Sets the committer identity for the working directory.
    async fn set_identity(&self, dir: &Path, name: &str, email: &str) -> Result<()>;

    /// `git commit --no-verify --all` with the given message, author, and
    /// signing key.
    async fn commit(&self, dir: &Path, action: &CommitAction) -> Result<()>;

    /// `git checkout <ref>`.
    async fn checkout_ref(&self, dir: &Path, r: &str) -> Result<()>;

    /// Whether the working tree has local changes under the given paths
    /// (`git diff --quiet` semantics).
    async fn has_changes(&self, dir: &Path, paths: &[String]) -> Result<bool>;

    /// Files changed since `ref` under the given paths, excluding deletions
    /// (`--diff-filter=ACMRT`), relative to the working directory.
    async fn changed_files(&self, dir: &Path, r: &str, paths: &[String]) -> Result<Vec<String>>;

    /// Whether `ref` resolves to any revision.
    async fn ref_exists(&self, dir: &Path, r: &str) -> Result<bool>;

    /// The commit hash `ref` points at, or `None` for an unknown ref.
    async fn ref_revision(&self, dir: &Path, r: &str) -> Result<Option<String>>;

    /// Revisions and one-line messages for `refspec`, optionally restricted
    /// to paths.
    async fn oneline_log(&self, dir: &Path, refspec: &str, paths: &[String])
        -> Result<Vec<Commit>>;

    /// Resolves a shorthand notes ref to its long form.
    async fn notes_ref(&self, dir: &Path, short: &str) -> Result<String>;

    /// Attaches a raw note payload to `rev` under `notes_ref`.
    async fn add_note(&self, dir: &Path, rev: &str, notes_ref: &str, payload: &str) -> Result<()>;

    /// The raw note payload for `rev`, or `None` if the revision has no note.
    async fn show_note(&self, dir: &Path, notes_ref: &str, rev: &str) -> Result<Option<String>>;

    /// All revisions carrying a note under `notes_ref`. The ordering git
    /// reports is not meaningful, hence a set.
    async fn note_rev_list(&self, dir: &Path, notes_ref: &str) -> Result<HashSet<String>>;

    /// Force-moves an annotated (optionally signed) tag to
    /// `action.revision`.
    async fn move_tag(&self, dir: &Path, tag: &str, action: &SyncMarkerAction) -> Result<()>;

    /// Force-pushes a tag refspec (`refs/tags/a:refs/tags/b`) to the
    /// upstream.
    async fn push_tag(&self, dir: &Path, upstream: &str, refspec: &str) -> Result<()>;

    /// Deletes a local tag.
    async fn delete_tag(&self, dir: &Path, tag: &str) -> Result<()>;

    /// Deletes a tag on the upstream.
    async fn delete_remote_tag(&self, dir: &Path, upstream: &str, tag: &str) -> Result<()>;

    /// Validates the GPG signature on a tag.
    async fn verify_tag(&self, dir: &Path, tag: &str) -> Result<()>;
}

/// Name of the disposable tag used to probe write access.
pub const WRITE_CHECK_TAG: &str = "driftsync-write-check";

/// Subprocess-backed [`GitClient`].
#[derive(Debug, Default)]
pub struct GitCli {
    auth: GitAuthSettings,
}

impl GitCli {
    /// Creates a client that authenticates per the given settings.
    pub fn new(auth: GitAuthSettings) -> Self {
        Self { auth }
    }

    /// Runs git with the restricted environment and returns trimmed stdout.
    async fn run(&self, dir: Option<&Path>, args: &[&str]) -> Result<String> {
        log::trace!("git {}", args.join(" "));

        // Must outlive the child so the askpass script stays on disk.
        let auth_env = build_auth_env(&self.auth)?;

        let mut cmd = Command::new("git");
        cmd.args(args);
        if let Some(dir) = dir {
            cmd.current_dir(dir);
        }
        cmd.env_clear();
        for (key, value) in base_env() {
            cmd.env(key, value);
        }
        for (key, value) in &auth_env.env_vars {
            cmd.env(key, value);
        }
        cmd.kill_on_drop(true);

        let output = cmd.output().await?;
        drop(auth_env);

        if output.status.success() {
            return Ok(String::from_utf8_lossy(&output.stdout).trim().to_string());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let message = find_error_message(&stderr).unwrap_or_else(|| {
            let trimmed = stderr.trim();
            if trimmed.is_empty() {
                format!(
                    "git {} failed with exit code {}",
                    args.first().copied().unwrap_or(""),
                    output.status.code().unwrap_or(-1)
                )
            } else {
                trimmed.to_string()
            }
        });
        Err(classify_git_error(&message))
    }
}

#[async_trait]
impl GitClient for GitCli {
    async fn mirror_clone(&self, dir: &Path, url: &str) -> Result<()> {
        let target = path_str(dir)?;
        self.run(None, &["clone", "--mirror", url, target]).await?;
        Ok(())
    }

    async fn clone_branch(&self, target: &Path, src: &str, branch: &str) -> Result<()> {
        let target = path_str(target)?;
        self.run(None, &["clone", "--branch", branch, src, target])
            .await?;
        Ok(())
    }

    async fn fetch(&self, dir: &Path, upstream: &str, refspecs: &[String]) -> Result<()> {
        let mut args = vec!["fetch", "--tags", upstream];
        args.extend(refspecs.iter().map(|s| s.as_str()));
        match self.run(Some(dir), &args).await {
            Ok(_) => Ok(()),
            // A notes ref that has never been pushed has no remote
            // counterpart yet; that is not a failure.
            Err(e) if e.to_string().to_lowercase().contains("couldn't find remote ref") => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn push(&self, dir: &Path, upstream: &str, refs: &[String]) -> Result<()> {
        let mut args = vec!["push", upstream];
        args.extend(refs.iter().map(|s| s.as_str()));
        self.run(Some(dir), &args).await?;
        Ok(())
    }

    async fn check_push(&self, dir: &Path, upstream: &str) -> Result<()> {
        // --force in case the tag was fetched from upstream when cloning.
        self.run(Some(dir), &["tag", "--force", WRITE_CHECK_TAG])
            .await?;
        self.run(Some(dir), &["push", "--force", upstream, "tag", WRITE_CHECK_TAG])
            .await?;
        self.run(Some(dir), &["push", "--delete", upstream, "tag", WRITE_CHECK_TAG])
            .await?;
        Ok(())
    }

    async fn set_identity(&self, dir: &Path, name: &str, email: &str) -> Result<()> {
        self.run(Some(dir), &["config", "user.name", name]).await?;
        self.run(Some(dir), &["config", "user.email", email]).await?;
        Ok(())
    }

    async fn commit(&self, dir: &Path, action: &CommitAction) -> Result<()> {
        let mut args = vec![
            "commit",
            "--no-verify",
            "--all",
            "--message",
            action.message.as_str(),
        ];
        if let Some(author) = &action.author {
            args.push("--author");
            args.push(author);
        }
        let sign;
        if let Some(key) = &action.signing_key {
            sign = format!("--gpg-sign={}", key);
            args.push(&sign);
        }
        self.run(Some(dir), &args).await?;
        Ok(())
    }

    async fn checkout_ref(&self, dir: &Path, r: &str) -> Result<()> {
        self.run(Some(dir), &["checkout", r]).await?;
        Ok(())
    }

    async fn has_changes(&self, dir: &Path, paths: &[String]) -> Result<bool> {
        // `--quiet` means "exit with 1 if there are changes".
        let mut args = vec!["diff", "--quiet"];
        if !paths.is_empty() {
            args.push("--");
            args.extend(paths.iter().map(|s| s.as_str()));
        }
        Ok(self.run(Some(dir), &args).await.is_err())
    }

    async fn changed_files(&self, dir: &Path, r: &str, paths: &[String]) -> Result<Vec<String>> {
        // --diff-filter so we only report files still present in the working
        // dir, not things that no longer appear.
        let mut args = vec!["diff", "--name-only", "--diff-filter=ACMRT", r];
        if !paths.is_empty() {
            args.push("--");
            args.extend(paths.iter().map(|s| s.as_str()));
        }
        let out = self.run(Some(dir), &args).await?;
        Ok(split_list(&out))
    }

    async fn ref_exists(&self, dir: &Path, r: &str) -> Result<bool> {
        match self.run(Some(dir), &["rev-list", r]).await {
            Ok(_) => Ok(true),
            Err(e) if e.to_string().contains("unknown revision") => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn ref_revision(&self, dir: &Path, r: &str) -> Result<Option<String>> {
        match self
            .run(Some(dir), &["rev-list", "--max-count", "1", r])
            .await
        {
            Ok(out) if out.is_empty() => Ok(None),
            Ok(out) => Ok(Some(out)),
            Err(e) if e.to_string().contains("unknown revision") => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn oneline_log(
        &self,
        dir: &Path,
        refspec: &str,
        paths: &[String],
    ) -> Result<Vec<Commit>> {
        let mut args = vec!["log", "--pretty=format:%GK|%H|%s", refspec];
        if !paths.is_empty() {
            args.push("--");
            args.extend(paths.iter().map(|s| s.as_str()));
        }
        let out = self.run(Some(dir), &args).await?;
        Ok(parse_oneline_log(&out))
    }

    async fn notes_ref(&self, dir: &Path, short: &str) -> Result<String> {
        self.run(Some(dir), &["notes", "--ref", short, "get-ref"])
            .await
    }

    async fn add_note(&self, dir: &Path, rev: &str, notes_ref: &str, payload: &str) -> Result<()> {
        self.run(
            Some(dir),
            &["notes", "--ref", notes_ref, "add", "--message", payload, rev],
        )
        .await?;
        Ok(())
    }

    async fn show_note(&self, dir: &Path, notes_ref: &str, rev: &str) -> Result<Option<String>> {
        match self
            .run(Some(dir), &["notes", "--ref", notes_ref, "show", rev])
            .await
        {
            Ok(out) => Ok(Some(out)),
            Err(e) if e.to_string().to_lowercase().contains("no note found for object") => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn note_rev_list(&self, dir: &Path, notes_ref: &str) -> Result<HashSet<String>> {
        let out = self
            .run(Some(dir), &["notes", "--ref", notes_ref, "list"])
            .await?;
        Ok(parse_note_list(&out))
    }

    async fn move_tag(&self, dir: &Path, tag: &str, action: &SyncMarkerAction) -> Result<()> {
        let mut args = vec![
            "tag",
            "--force",
            "--annotate",
            "--message",
            action.message.as_str(),
        ];
        let sign;
        if let Some(key) = &action.signing_key {
            sign = format!("--local-user={}", key);
            args.push(&sign);
        }
        args.push(tag);
        args.push(&action.revision);
        self.run(Some(dir), &args).await?;
        Ok(())
    }

    async fn push_tag(&self, dir: &Path, upstream: &str, refspec: &str) -> Result<()> {
        self.run(Some(dir), &["push", "--force", upstream, refspec])
            .await?;
        Ok(())
    }

    async fn delete_tag(&self, dir: &Path, tag: &str) -> Result<()> {
        self.run(Some(dir), &["tag", "--delete", tag]).await?;
        Ok(())
    }

    async fn delete_remote_tag(&self, dir: &Path, upstream: &str, tag: &str) -> Result<()> {
        self.run(Some(dir), &["push", "--delete", upstream, "tag", tag])
            .await?;
        Ok(())
    }

    async fn verify_tag(&self, dir: &Path, tag: &str) -> Result<()> {
        self.run(Some(dir), &["verify-tag", tag]).await?;
        Ok(())
    }
}

fn path_str(path: &Path) -> Result<&str> {
    path.to_str()
        .ok_or_else(|| GitError::Io(format!("path is not valid UTF-8: {}", path.display())))
}
