//! Per-item outcomes of a batch run

use crate::downloader::TaskState;
use crate::utils::error::{NicoloaderError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// What happened to one matched video
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemOutcome {
    pub query: String,
    pub video_id: String,
    pub title: String,
    pub path: PathBuf,
    pub state: TaskState,
    pub error: Option<String>,
    pub finished_at: DateTime<Utc>,
}

/// A query whose search request failed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryFailure {
    pub query: String,
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct BatchReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub items: Vec<ItemOutcome>,
    pub failed_queries: Vec<QueryFailure>,
    /// Set when a fatal error stopped the batch early
    #[serde(serialize_with = "serialize_error")]
    pub aborted: Option<NicoloaderError>,
}

fn serialize_error<S>(error: &Option<NicoloaderError>, serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    match error {
        Some(e) => serializer.serialize_some(&e.to_string()),
        None => serializer.serialize_none(),
    }
}

impl Default for BatchReport {
    fn default() -> Self {
        Self::new()
    }
}

impl BatchReport {
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            finished_at: None,
            items: Vec::new(),
            failed_queries: Vec::new(),
            aborted: None,
        }
    }

    pub fn record(&mut self, item: ItemOutcome) {
        self.items.push(item);
    }

    pub fn record_query_failure(&mut self, query: &str, error: &NicoloaderError) {
        self.failed_queries.push(QueryFailure {
            query: query.to_string(),
            error: error.to_string(),
        });
    }

    pub fn abort(&mut self, error: NicoloaderError) {
        self.aborted = Some(error);
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    pub fn count(&self, state: TaskState) -> usize {
        self.items.iter().filter(|item| item.state == state).count()
    }

    /// True when nothing failed and the batch ran to the end
    pub fn is_clean(&self) -> bool {
        self.aborted.is_none()
            && self.failed_queries.is_empty()
            && self.count(TaskState::Failed) == 0
    }

    pub fn was_cancelled(&self) -> bool {
        matches!(self.aborted, Some(NicoloaderError::Cancelled(_)))
    }

    /// One-line summary for the final log message
    pub fn summary(&self) -> String {
        let mut summary = format!(
            "{} downloaded, {} dry-run, {} already existed, {} failed, {} search failures",
            self.count(TaskState::Succeeded),
            self.count(TaskState::DryRunSkipped),
            self.count(TaskState::ConflictRejected),
            self.count(TaskState::Failed),
            self.failed_queries.len(),
        );
        if let Some(error) = &self.aborted {
            summary.push_str(&format!(" (aborted: {})", error));
        }
        summary
    }

    /// Write the report as pretty JSON
    pub async fn write_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_vec_pretty(self)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, json).await?;
        Ok(())
    }
}
