//! Download manager: conflict checks, dry runs, session reuse and
//! cancellation cleanup around a delegated [`Downloader`].

use crate::downloader::session::{Credentials, Session, SessionClient};
use crate::downloader::task::{DownloadTask, TaskState};
use crate::downloader::traits::{Authorization, Downloader};
use crate::utils::error::{NicoloaderError, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};
use url::Url;

/// Canonical watch page prefix
pub const DEFAULT_WATCH_PREFIX: &str = "https://www.nicovideo.jp/watch/";

pub struct DownloadManager {
    credentials: Credentials,
    session_client: SessionClient,
    session: OnceCell<Session>,
    downloader: Arc<dyn Downloader>,
    watch_prefix: Url,
}

impl DownloadManager {
    /// Create a manager that logs in on the first real download
    pub fn new(
        credentials: Credentials,
        session_client: SessionClient,
        downloader: Arc<dyn Downloader>,
    ) -> Result<Self> {
        let watch_prefix = Url::parse(DEFAULT_WATCH_PREFIX)
            .map_err(|e| NicoloaderError::Config(format!("bad watch prefix: {}", e)))?;

        Ok(Self {
            credentials,
            session_client,
            session: OnceCell::new(),
            downloader,
            watch_prefix,
        })
    }

    /// Create a manager and log in immediately.
    ///
    /// Fails with [`NicoloaderError::AuthenticationFailed`] when no session
    /// cookie is obtained.
    pub async fn connect(
        credentials: Credentials,
        session_client: SessionClient,
        downloader: Arc<dyn Downloader>,
    ) -> Result<Self> {
        let manager = Self::new(credentials, session_client, downloader)?;
        manager.session().await?;
        Ok(manager)
    }

    /// Override the watch page prefix (must end with `/`)
    pub fn with_watch_prefix(mut self, prefix: &str) -> Result<Self> {
        if !prefix.ends_with('/') {
            return Err(NicoloaderError::Config(format!(
                "watch prefix must end with '/': {}",
                prefix
            )));
        }
        self.watch_prefix = Url::parse(prefix)
            .map_err(|e| NicoloaderError::Config(format!("bad watch prefix: {}", e)))?;
        Ok(self)
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.initialized()
    }

    pub fn downloader_id(&self) -> &str {
        self.downloader.id()
    }

    /// Watch page URL for `video_id`
    pub fn watch_url(&self, video_id: &str) -> Result<Url> {
        if video_id.is_empty() || !video_id.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(NicoloaderError::InvalidQuery(format!(
                "invalid video id '{}'",
                video_id
            )));
        }
        self.watch_prefix
            .join(video_id)
            .map_err(|e| NicoloaderError::InvalidQuery(format!("{}: {}", video_id, e)))
    }

    /// The shared session, logging in on first use.
    ///
    /// Any login failure, including exhausted retries, is reported as
    /// [`NicoloaderError::AuthenticationFailed`]: without a session the
    /// manager cannot download anything.
    async fn session(&self) -> Result<&Session> {
        self.session
            .get_or_try_init(|| self.session_client.login(&self.credentials))
            .await
            .map_err(|e| match e {
                e @ NicoloaderError::AuthenticationFailed(_) => e,
                other => NicoloaderError::AuthenticationFailed(format!("login failed: {}", other)),
            })
    }

    /// Download a task, returning its destination on success
    pub async fn download(&self, task: &DownloadTask, cancel: &CancellationToken) -> Result<PathBuf> {
        self.run(task, cancel).await.1
    }

    /// Download a task, also reporting the terminal state it reached
    #[instrument(skip(self, cancel), fields(video_id = %task.video_id))]
    pub async fn run(
        &self,
        task: &DownloadTask,
        cancel: &CancellationToken,
    ) -> (TaskState, Result<PathBuf>) {
        let destination = &task.destination;
        let pending = TaskState::Pending;

        if task.options.dry_run {
            info!(
                "#DRYRUN# Download from url: {}{} to {}",
                self.watch_prefix,
                task.video_id,
                destination.display()
            );
            return settle(pending, TaskState::DryRunSkipped, Ok(destination.clone()));
        }

        let url = match self.watch_url(&task.video_id) {
            Ok(url) => url,
            Err(e) => return settle(pending, TaskState::Failed, Err(e)),
        };

        let exists = match tokio::fs::try_exists(destination).await {
            Ok(exists) => exists,
            Err(e) => return settle(pending, TaskState::Failed, Err(e.into())),
        };
        if exists {
            if !task.options.overwrite {
                warn!("{} already exists, skipping", destination.display());
                return settle(
                    pending,
                    TaskState::ConflictRejected,
                    Err(NicoloaderError::AlreadyExists(destination.clone())),
                );
            }
            info!("{} already exists and will be overwritten", destination.display());
        }

        if cancel.is_cancelled() {
            return settle(
                pending,
                TaskState::CancelledCleanedUp,
                Err(NicoloaderError::Cancelled(destination.clone())),
            );
        }

        // Existence is checked first so conflicts never cost a login.
        let session = match self.session().await {
            Ok(session) => session,
            Err(e) => {
                error!("Could not establish a session: {}", e);
                return settle(pending, TaskState::Failed, Err(e));
            }
        };

        if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                return settle(pending, TaskState::Failed, Err(e.into()));
            }
        }

        let auth = Authorization {
            credentials: &self.credentials,
            session,
        };
        let in_progress = advance(pending, TaskState::InProgress);
        info!("Downloading {} to {}", url, destination.display());

        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                warn!("Download of {} interrupted, removing partial files", url);
                cleanup_partial_files(destination).await;
                settle(
                    in_progress,
                    TaskState::CancelledCleanedUp,
                    Err(NicoloaderError::Cancelled(destination.clone())),
                )
            }
            result = self.downloader.fetch(auth, &url, destination) => match result {
                Ok(()) => {
                    info!("Saved {}", destination.display());
                    settle(in_progress, TaskState::Succeeded, Ok(destination.clone()))
                }
                Err(e) => {
                    error!("Download of {} to {} failed: {}", url, destination.display(), e);
                    let e = wrap_download_error(e, &task.video_id, &url);
                    settle(in_progress, TaskState::Failed, Err(e))
                }
            },
        }
    }
}

fn advance(from: TaskState, to: TaskState) -> TaskState {
    debug_assert!(from.can_transition_to(to), "illegal transition {} -> {}", from, to);
    debug!("{} -> {}", from, to);
    to
}

fn settle(
    from: TaskState,
    to: TaskState,
    result: Result<PathBuf>,
) -> (TaskState, Result<PathBuf>) {
    (advance(from, to), result)
}

fn wrap_download_error(err: NicoloaderError, video_id: &str, url: &Url) -> NicoloaderError {
    match err {
        err @ NicoloaderError::DownloadFailed { .. } => err,
        err @ NicoloaderError::Cancelled(_) => err,
        other => NicoloaderError::DownloadFailed {
            video_id: video_id.to_string(),
            url: url.to_string(),
            detail: other.to_string(),
        },
    }
}

/// Files a delegated tool may leave behind for `destination`
pub fn partial_paths(destination: &Path) -> Vec<PathBuf> {
    let mut paths = vec![destination.to_path_buf()];
    for suffix in [".part", ".ytdl"] {
        let mut name = destination.as_os_str().to_os_string();
        name.push(suffix);
        paths.push(PathBuf::from(name));
    }
    paths
}

/// Remove `destination` and its known partial siblings
pub async fn cleanup_partial_files(destination: &Path) {
    for path in partial_paths(destination) {
        match tokio::fs::remove_file(&path).await {
            Ok(()) => debug!("Removed partial file: {}", path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove partial file {}: {}", path.display(), e),
        }
    }
}
