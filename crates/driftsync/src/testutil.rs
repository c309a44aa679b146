//! Fake VCS primitive layer for exercising the state machine and the
//! transaction protocol without a git binary.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::git::error::{GitError, Result};
use crate::git::{Commit, CommitAction, GitClient, SyncMarkerAction};

/// In-memory [`GitClient`] that records every call and can be scripted to
/// fail specific operations.
#[derive(Default)]
pub struct FakeGit {
    calls: Mutex<Vec<String>>,
    failing: Mutex<HashSet<&'static str>>,
    tags: Mutex<HashMap<String, String>>,
    refs: Mutex<HashSet<String>>,
    notes: Mutex<HashMap<String, String>>,
    head: Mutex<String>,
    changes: Mutex<bool>,
}

impl FakeGit {
    pub fn new() -> Self {
        let fake = Self::default();
        *fake.head.lock().unwrap() = "headrev".to_string();
        *fake.changes.lock().unwrap() = true;
        fake
    }

    /// Makes the named operation fail until cleared.
    pub fn fail_on(&self, op: &'static str) {
        self.failing.lock().unwrap().insert(op);
    }

    pub fn clear_fail(&self, op: &str) {
        self.failing.lock().unwrap().remove(op);
    }

    /// Controls what `has_changes` reports.
    pub fn set_changes(&self, changes: bool) {
        *self.changes.lock().unwrap() = changes;
    }

    /// Number of recorded calls to the named operation.
    pub fn count(&self, op: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.split_whitespace().next() == Some(op))
            .count()
    }

    /// Recorded calls starting with the given prefix.
    pub fn calls_matching(&self, prefix: &str) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.starts_with(prefix))
            .cloned()
            .collect()
    }

    /// Where a tag currently points, if anywhere.
    pub fn tag_revision(&self, tag: &str) -> Option<String> {
        self.tags.lock().unwrap().get(tag).cloned()
    }

    fn hit(&self, op: &'static str, detail: &str) -> Result<()> {
        let entry = if detail.is_empty() {
            op.to_string()
        } else {
            format!("{} {}", op, detail)
        };
        self.calls.lock().unwrap().push(entry);
        if self.failing.lock().unwrap().contains(op) {
            return Err(GitError::Command(format!("fake {} failure", op)));
        }
        Ok(())
    }
}

fn signed_detail(base: String, signing_key: &Option<String>) -> String {
    match signing_key {
        Some(key) => format!("{} gpg:{}", base, key),
        None => base,
    }
}

#[async_trait]
impl GitClient for FakeGit {
    async fn mirror_clone(&self, _dir: &Path, url: &str) -> Result<()> {
        self.hit("mirror_clone", url)
    }

    async fn clone_branch(&self, _target: &Path, src: &str, branch: &str) -> Result<()> {
        self.hit("clone_branch", &format!("{} {}", src, branch))
    }

    async fn fetch(&self, _dir: &Path, upstream: &str, refspecs: &[String]) -> Result<()> {
        self.hit("fetch", &format!("{} {}", upstream, refspecs.join(" ")))
    }

    async fn push(&self, _dir: &Path, upstream: &str, refs: &[String]) -> Result<()> {
        self.hit("push", &format!("{} {}", upstream, refs.join(" ")))
    }

    async fn check_push(&self, _dir: &Path, upstream: &str) -> Result<()> {
        self.hit("check_push", upstream)
    }

    async fn set_identity(&self, _dir: &Path, name: &str, email: &str) -> Result<()> {
        self.hit("set_identity", &format!("{} {}", name, email))
    }

    async fn commit(&self, _dir: &Path, action: &CommitAction) -> Result<()> {
        self.hit(
            "commit",
            &signed_detail(action.message.clone(), &action.signing_key),
        )
    }

    async fn checkout_ref(&self, _dir: &Path, r: &str) -> Result<()> {
        self.hit("checkout_ref", r)
    }

    async fn has_changes(&self, _dir: &Path, _paths: &[String]) -> Result<bool> {
        self.hit("has_changes", "")?;
        Ok(*self.changes.lock().unwrap())
    }

    async fn changed_files(&self, _dir: &Path, r: &str, _paths: &[String]) -> Result<Vec<String>> {
        self.hit("changed_files", r)?;
        Ok(Vec::new())
    }

    async fn ref_exists(&self, _dir: &Path, r: &str) -> Result<bool> {
        self.hit("ref_exists", r)?;
        Ok(self.refs.lock().unwrap().contains(r) || self.tags.lock().unwrap().contains_key(r))
    }

    async fn ref_revision(&self, _dir: &Path, r: &str) -> Result<Option<String>> {
        self.hit("ref_revision", r)?;
        if r == "HEAD" {
            return Ok(Some(self.head.lock().unwrap().clone()));
        }
        Ok(self.tags.lock().unwrap().get(r).cloned())
    }

    async fn oneline_log(
        &self,
        _dir: &Path,
        refspec: &str,
        _paths: &[String],
    ) -> Result<Vec<Commit>> {
        self.hit("oneline_log", refspec)?;
        Ok(Vec::new())
    }

    async fn notes_ref(&self, _dir: &Path, short: &str) -> Result<String> {
        self.hit("notes_ref", short)?;
        Ok(format!("refs/notes/{}", short))
    }

    async fn add_note(
        &self,
        _dir: &Path,
        rev: &str,
        notes_ref: &str,
        payload: &str,
    ) -> Result<()> {
        self.hit("add_note", &format!("{} {}", notes_ref, rev))?;
        self.notes
            .lock()
            .unwrap()
            .insert(rev.to_string(), payload.to_string());
        let mut refs = self.refs.lock().unwrap();
        refs.insert(notes_ref.to_string());
        if !notes_ref.starts_with("refs/") {
            refs.insert(format!("refs/notes/{}", notes_ref));
        }
        Ok(())
    }

    async fn show_note(&self, _dir: &Path, _notes_ref: &str, rev: &str) -> Result<Option<String>> {
        self.hit("show_note", rev)?;
        Ok(self.notes.lock().unwrap().get(rev).cloned())
    }

    async fn note_rev_list(&self, _dir: &Path, _notes_ref: &str) -> Result<HashSet<String>> {
        self.hit("note_rev_list", "")?;
        Ok(self.notes.lock().unwrap().keys().cloned().collect())
    }

    async fn move_tag(&self, _dir: &Path, tag: &str, action: &SyncMarkerAction) -> Result<()> {
        self.hit(
            "move_tag",
            &signed_detail(format!("{} {}", tag, action.revision), &action.signing_key),
        )?;
        self.tags
            .lock()
            .unwrap()
            .insert(tag.to_string(), action.revision.clone());
        Ok(())
    }

    async fn push_tag(&self, _dir: &Path, upstream: &str, refspec: &str) -> Result<()> {
        self.hit("push_tag", &format!("{} {}", upstream, refspec))
    }

    async fn delete_tag(&self, _dir: &Path, tag: &str) -> Result<()> {
        self.hit("delete_tag", tag)?;
        self.tags.lock().unwrap().remove(tag);
        Ok(())
    }

    async fn delete_remote_tag(&self, _dir: &Path, upstream: &str, tag: &str) -> Result<()> {
        self.hit("delete_remote_tag", &format!("{} {}", upstream, tag))
    }

    async fn verify_tag(&self, _dir: &Path, tag: &str) -> Result<()> {
        self.hit("verify_tag", tag)
    }
}
