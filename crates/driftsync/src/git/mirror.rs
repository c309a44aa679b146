//! Repository mirror lifecycle: clone, verify write access, keep fetched.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, Mutex, RwLock};

use super::checkout::Checkout;
use super::client::{GitCli, GitClient};
use super::error::{GitError, Result};
use super::types::{CheckoutConfig, Commit, MirrorStatus, Remote};
use super::with_timeout;
use crate::sync::StateMode;

/// How often the refresh loop fetches when nothing else triggers it.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5 * 60);
/// Deadline for a single external git operation.
pub const DEFAULT_OP_TIMEOUT: Duration = Duration::from_secs(20);
/// Pause before re-driving the state machine after a failure.
const RETRY_BACKOFF: Duration = Duration::from_secs(10);

struct MirrorState {
    status: MirrorStatus,
    last_error: Option<GitError>,
}

/// A bare local mirror of the remote repo, kept fetched.
///
/// State is private so progress can only be observed through [`status`]
/// queries and the `refreshed` signal. One `RwLock` guards the mutable
/// fields: state-advancing operations hold the write guard for the duration
/// of the external call, serializing mutations while leaving reads cheap.
///
/// [`status`]: Mirror::status
pub struct Mirror {
    origin: Remote,
    dir: PathBuf,
    interval: Duration,
    timeout: Duration,
    readonly: bool,
    git: Arc<dyn GitClient>,
    state: RwLock<MirrorState>,
    // Capacity-one mailboxes: a try_send that finds the slot full is simply
    // dropped, preserving "at least one pending wake-up, never more".
    notify_tx: mpsc::Sender<()>,
    notify_rx: Mutex<mpsc::Receiver<()>>,
    refreshed_tx: mpsc::Sender<()>,
    refreshed_rx: Mutex<mpsc::Receiver<()>>,
}

impl Mirror {
    /// Constructs a mirror which will sync itself once driven.
    ///
    /// The local directory is reserved immediately so marker providers can
    /// be pointed at it before the first clone completes. A remote with an
    /// empty URL yields a permanently `NoConfig` mirror.
    pub fn new(origin: Remote) -> Self {
        let status = if origin.url.is_empty() {
            MirrorStatus::NoConfig
        } else {
            MirrorStatus::New
        };
        let dir = std::env::temp_dir().join(format!("driftsync-mirror-{}", uuid::Uuid::new_v4()));
        let (notify_tx, notify_rx) = mpsc::channel(1);
        let (refreshed_tx, refreshed_rx) = mpsc::channel(1);
        Self {
            origin,
            dir,
            interval: DEFAULT_POLL_INTERVAL,
            timeout: DEFAULT_OP_TIMEOUT,
            readonly: false,
            git: Arc::new(GitCli::default()),
            state: RwLock::new(MirrorState {
                status,
                last_error: Some(GitError::NotCloned),
            }),
            notify_tx,
            notify_rx: Mutex::new(notify_rx),
            refreshed_tx,
            refreshed_rx: Mutex::new(refreshed_rx),
        }
    }

    /// Sets the period of the background refresh loop.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Sets the deadline applied to each external git operation.
    pub fn with_op_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Marks the repo as one the agent may read but never write.
    pub fn read_only(mut self, readonly: bool) -> Self {
        self.readonly = readonly;
        self
    }

    /// Swaps the VCS primitive layer, e.g. for a fake in tests.
    pub fn with_client(mut self, git: Arc<dyn GitClient>) -> Self {
        self.git = git;
        self
    }

    /// The remote this mirror was constructed with.
    pub fn origin(&self) -> &Remote {
        &self.origin
    }

    /// The local directory holding the bare mirror. Only valid once the
    /// status has reached `Cloned`.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Whether the repo is in read-only mode.
    pub fn is_read_only(&self) -> bool {
        self.readonly
    }

    /// Current readiness status and, when short of `Ready`, the error
    /// blocking the next transition. Never blocks on in-flight operations
    /// longer than the read lock.
    pub async fn status(&self) -> (MirrorStatus, Option<GitError>) {
        let state = self.state.read().await;
        (state.status, state.last_error.clone())
    }

    /// Asks the refresh loop to fetch from the origin as soon as possible.
    /// Never blocks; a notification already pending absorbs this one.
    pub fn notify(&self) {
        let _ = self.notify_tx.try_send(());
    }

    /// Waits until the mirror has fetched from upstream (or transitioned to
    /// ready) since the last call. Successive refreshes coalesce into one
    /// pending signal.
    pub async fn refreshed(&self) {
        let mut rx = self.refreshed_rx.lock().await;
        let _ = rx.recv().await;
    }

    fn publish_refreshed(&self) {
        let _ = self.refreshed_tx.try_send(());
    }

    /// Attempts to advance the state machine one transition; returns whether
    /// progress was made.
    pub(crate) async fn step(&self) -> bool {
        let mut state = self.state.write().await;
        match state.status {
            // Not going to change in the lifetime of this process.
            MirrorStatus::NoConfig => false,

            MirrorStatus::New => match self.clone_and_fetch().await {
                Ok(()) => {
                    state.status = MirrorStatus::Cloned;
                    state.last_error = Some(GitError::ClonedOnly);
                    true
                }
                Err(e) => {
                    let _ = std::fs::remove_dir_all(&self.dir);
                    log::warn!("mirror clone of {} failed: {}", self.origin.url, e);
                    state.last_error = Some(e);
                    false
                }
            },

            MirrorStatus::Cloned => {
                // Write access is only required when the marker itself lives
                // in the repo; resource-backed markers never need it here.
                if self.origin.state_mode == StateMode::GitTag {
                    if let Err(e) =
                        with_timeout(self.timeout, self.git.check_push(&self.dir, &self.origin.url))
                            .await
                    {
                        log::warn!("write check against {} failed: {}", self.origin.url, e);
                        state.last_error = Some(e);
                        return false;
                    }
                }
                state.status = MirrorStatus::Ready;
                state.last_error = None;
                drop(state);
                // Treat every transition to ready as a refresh, so listeners
                // can respond in the same way.
                self.publish_refreshed();
                true
            }

            MirrorStatus::Ready => false,
        }
    }

    async fn clone_and_fetch(&self) -> Result<()> {
        prepare_dir(&self.dir)?;
        with_timeout(self.timeout, self.git.mirror_clone(&self.dir, &self.origin.url)).await?;
        with_timeout(self.timeout, self.git.fetch(&self.dir, "origin", &[])).await
    }

    /// Drives the state machine as far as it will go, returning an error if
    /// it cannot reach `Ready`.
    pub async fn ready(&self) -> Result<()> {
        while self.step().await {}
        let (status, err) = self.status().await;
        match status {
            MirrorStatus::Ready => Ok(()),
            MirrorStatus::NoConfig => Err(GitError::NoConfig),
            _ => Err(err.unwrap_or(GitError::NotCloned)),
        }
    }

    /// Fetches from the upstream now, publishing the refreshed signal on
    /// success.
    pub async fn refresh(&self) -> Result<()> {
        let state = self.state.write().await;
        error_if_not_ready(&state)?;
        with_timeout(self.timeout, self.git.fetch(&self.dir, "origin", &[])).await?;
        drop(state);
        self.publish_refreshed();
        Ok(())
    }

    async fn refresh_loop(&self, shutdown: &mut broadcast::Receiver<()>) -> Result<()> {
        let mut notify_rx = self.notify_rx.lock().await;
        let mut poll = tokio::time::interval(self.interval);
        poll.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        poll.tick().await; // the first tick completes immediately
        loop {
            tokio::select! {
                _ = shutdown.recv() => return Ok(()),
                _ = poll.tick() => self.notify(),
                Some(()) = notify_rx.recv() => {
                    self.refresh().await?;
                    // A manual notification preempts the pending tick.
                    poll.reset();
                }
            }
        }
    }

    /// Synchronises the repo until shutdown: walks the state machine to
    /// `Ready`, then keeps it fetched via the refresh loop. Failures demote
    /// the status and are retried after a fixed backoff; a `NoConfig` mirror
    /// exits immediately since only operator action can change it.
    pub async fn start(&self, mut shutdown: broadcast::Receiver<()>) {
        loop {
            if self.step().await {
                continue;
            }

            let (status, _) = self.status().await;
            match status {
                MirrorStatus::Ready => match self.refresh_loop(&mut shutdown).await {
                    Ok(()) => return,
                    Err(e) => {
                        log::warn!("refresh of {} failed: {}", self.origin.url, e);
                        self.set_unready(MirrorStatus::New, e).await;
                        // Re-drive with the new status, skipping the backoff.
                        continue;
                    }
                },
                MirrorStatus::NoConfig => {
                    log::info!("no git repo configured; mirror loop exiting");
                    return;
                }
                _ => {}
            }

            tokio::select! {
                _ = shutdown.recv() => return,
                _ = tokio::time::sleep(RETRY_BACKOFF) => {}
            }
        }
    }

    async fn set_unready(&self, status: MirrorStatus, err: GitError) {
        let mut state = self.state.write().await;
        state.status = status;
        state.last_error = Some(err);
    }

    /// The revision the given ref points at, or `None` for an unknown ref.
    pub async fn revision(&self, r: &str) -> Result<Option<String>> {
        let state = self.state.read().await;
        error_if_not_ready(&state)?;
        with_timeout(self.timeout, self.git.ref_revision(&self.dir, r)).await
    }

    /// Commits reachable from `r`, newest first, optionally restricted to
    /// paths.
    pub async fn commits_before(&self, r: &str, paths: &[String]) -> Result<Vec<Commit>> {
        let state = self.state.read().await;
        error_if_not_ready(&state)?;
        with_timeout(self.timeout, self.git.oneline_log(&self.dir, r, paths)).await
    }

    /// Commits after `r1` up to and including `r2`, optionally restricted to
    /// paths.
    pub async fn commits_between(
        &self,
        r1: &str,
        r2: &str,
        paths: &[String],
    ) -> Result<Vec<Commit>> {
        let state = self.state.read().await;
        error_if_not_ready(&state)?;
        let refspec = format!("{}..{}", r1, r2);
        with_timeout(self.timeout, self.git.oneline_log(&self.dir, &refspec, paths)).await
    }

    /// Produces a working clone of the mirrored repo for one
    /// commit+push transaction, using the config given.
    ///
    /// The clone is taken from the local mirror, never the origin, so the
    /// transaction only touches the real upstream on its final push.
    pub async fn working_clone(&self, config: CheckoutConfig) -> Result<Checkout> {
        let state = self.state.read().await;
        error_if_not_ready(&state)?;

        let working =
            std::env::temp_dir().join(format!("driftsync-working-{}", uuid::Uuid::new_v4()));
        match self.clone_into(&working, &config).await {
            Ok(real_notes_ref) => Ok(Checkout::new(
                working,
                config,
                self.origin.clone(),
                real_notes_ref,
                Arc::clone(&self.git),
                self.timeout,
            )),
            Err(e) => {
                let _ = std::fs::remove_dir_all(&working);
                Err(e)
            }
        }
    }

    async fn clone_into(&self, working: &Path, config: &CheckoutConfig) -> Result<String> {
        let mirror = self
            .dir
            .to_str()
            .ok_or_else(|| GitError::Io(format!("path is not valid UTF-8: {}", self.dir.display())))?;

        with_timeout(
            self.timeout,
            self.git.clone_branch(working, mirror, &config.branch),
        )
        .await?;
        with_timeout(
            self.timeout,
            self.git
                .set_identity(working, &config.user_name, &config.user_email),
        )
        .await?;

        // The notes ref is needed for pushing later, so resolve and fetch it
        // up front. This assumes we are the one syncing it.
        let real_notes_ref =
            with_timeout(self.timeout, self.git.notes_ref(working, &config.notes_ref)).await?;
        let refspec = format!("{}:{}", real_notes_ref, real_notes_ref);
        with_timeout(self.timeout, self.git.fetch(working, mirror, &[refspec])).await?;

        Ok(real_notes_ref)
    }

    /// Removes the mirrored repo. Syncing may continue by re-driving the
    /// state machine, which will clone afresh.
    pub async fn clean(&self) {
        let mut state = self.state.write().await;
        let _ = std::fs::remove_dir_all(&self.dir);
        state.status = MirrorStatus::New;
        state.last_error = Some(GitError::NotCloned);
    }
}

fn error_if_not_ready(state: &MirrorState) -> Result<()> {
    match state.status {
        MirrorStatus::Ready => Ok(()),
        MirrorStatus::NoConfig => Err(GitError::NoConfig),
        _ => Err(GitError::not_ready(
            state.last_error.clone().unwrap_or(GitError::NotCloned),
        )),
    }
}

fn prepare_dir(dir: &Path) -> Result<()> {
    if dir.exists() {
        std::fs::remove_dir_all(dir)?;
    }
    std::fs::create_dir_all(dir)?;
    Ok(())
}
