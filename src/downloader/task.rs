//! Download task and its lifecycle states

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Per-task switches
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DownloadOptions {
    /// Replace a file that already exists at the destination
    pub overwrite: bool,
    /// Log the intended download and touch nothing
    pub dry_run: bool,
}

/// One video to fetch to one path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTask {
    pub video_id: String,
    pub destination: PathBuf,
    pub options: DownloadOptions,
}

impl DownloadTask {
    pub fn new(video_id: impl Into<String>, destination: impl Into<PathBuf>) -> Self {
        Self {
            video_id: video_id.into(),
            destination: destination.into(),
            options: DownloadOptions::default(),
        }
    }

    pub fn with_options(mut self, options: DownloadOptions) -> Self {
        self.options = options;
        self
    }

    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.options.overwrite = overwrite;
        self
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.options.dry_run = dry_run;
        self
    }
}

/// Task lifecycle
///
/// `Pending -> DryRunSkipped | ConflictRejected | InProgress`,
/// `InProgress -> Succeeded | Failed | CancelledCleanedUp`.
/// A task can also fail straight from `Pending` when it never reaches the
/// transfer (bad video id, login failure), and a task whose cancellation
/// arrives before the transfer starts goes straight to `CancelledCleanedUp`
/// with nothing to clean.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Pending,
    DryRunSkipped,
    ConflictRejected,
    InProgress,
    Succeeded,
    Failed,
    CancelledCleanedUp,
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TaskState::Pending | TaskState::InProgress)
    }

    /// Whether `next` is a legal successor of `self`
    pub fn can_transition_to(&self, next: TaskState) -> bool {
        match self {
            TaskState::Pending => matches!(
                next,
                TaskState::DryRunSkipped
                    | TaskState::ConflictRejected
                    | TaskState::InProgress
                    | TaskState::Failed
                    | TaskState::CancelledCleanedUp
            ),
            TaskState::InProgress => matches!(
                next,
                TaskState::Succeeded | TaskState::Failed | TaskState::CancelledCleanedUp
            ),
            _ => false,
        }
    }

    /// Same label the JSON report uses
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskState::Pending => "pending",
            TaskState::DryRunSkipped => "dry_run_skipped",
            TaskState::ConflictRejected => "conflict_rejected",
            TaskState::InProgress => "in_progress",
            TaskState::Succeeded => "succeeded",
            TaskState::Failed => "failed",
            TaskState::CancelledCleanedUp => "cancelled_cleaned_up",
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
