//! Sequential query-then-download driver

use crate::batch::report::{BatchReport, ItemOutcome};
use crate::downloader::{DownloadManager, DownloadOptions, DownloadTask, TaskState};
use crate::search::{SearchClient, SearchHit, SearchQuery};
use crate::utils::config::AppConfig;
use crate::utils::error::{NicoloaderError, Result};
use crate::utils::paths::{query_dir, video_path};
use chrono::Utc;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

/// A search and the directory its hits are saved to
#[derive(Debug, Clone)]
pub struct QueryJob {
    pub query: SearchQuery,
    pub directory: PathBuf,
}

impl QueryJob {
    /// Jobs for every `[[queries]]` entry
    pub fn from_config(config: &AppConfig) -> Result<Vec<QueryJob>> {
        config
            .queries
            .iter()
            .map(|entry| {
                Ok(QueryJob {
                    query: entry.to_search_query(config.limit)?,
                    directory: query_dir(&config.saveroot, entry.subdir.as_deref()),
                })
            })
            .collect()
    }
}

pub struct BatchRunner {
    search: SearchClient,
    manager: DownloadManager,
    jobs: Vec<QueryJob>,
    options: DownloadOptions,
}

impl BatchRunner {
    pub fn new(
        search: SearchClient,
        manager: DownloadManager,
        jobs: Vec<QueryJob>,
        options: DownloadOptions,
    ) -> Self {
        Self {
            search,
            manager,
            jobs,
            options,
        }
    }

    pub fn manager(&self) -> &DownloadManager {
        &self.manager
    }

    /// Run every job in order.
    ///
    /// Search failures, conflicts and failed downloads are recorded and the
    /// batch moves on; fatal errors (authentication, cancellation) stop it.
    /// Cancellation is honoured before each search, during it and between
    /// downloads.
    pub async fn run(&self, cancel: &CancellationToken) -> BatchReport {
        let mut report = BatchReport::new();

        'jobs: for job in &self.jobs {
            let span = info_span!("query", q = %job.query.text());
            if cancel.is_cancelled() {
                warn!(parent: &span, "Cancelled before searching");
                report.abort(NicoloaderError::Cancelled(job.directory.clone()));
                break;
            }

            let searched = tokio::select! {
                biased;

                _ = cancel.cancelled() => None,
                result = self.search.search(&job.query).instrument(span.clone()) => Some(result),
            };
            let hits = match searched {
                None => {
                    warn!(parent: &span, "Search interrupted");
                    report.abort(NicoloaderError::Cancelled(job.directory.clone()));
                    break;
                }
                Some(Ok(hits)) => hits,
                Some(Err(e)) => {
                    error!(parent: &span, "Search failed: {}", e);
                    report.record_query_failure(job.query.text(), &e);
                    continue;
                }
            };
            info!(parent: &span, "{} candidate video(s)", hits.len());

            for hit in hits {
                if cancel.is_cancelled() {
                    report.abort(NicoloaderError::Cancelled(job.directory.clone()));
                    break 'jobs;
                }

                let (outcome, fatal) = self
                    .download_hit(job, &hit, cancel)
                    .instrument(span.clone())
                    .await;
                report.record(outcome);

                if let Some(error) = fatal {
                    error!(parent: &span, "Stopping batch: {}", error);
                    report.abort(error);
                    break 'jobs;
                }
            }
        }

        report.finish();
        info!("Batch finished: {}", report.summary());
        report
    }

    async fn download_hit(
        &self,
        job: &QueryJob,
        hit: &SearchHit,
        cancel: &CancellationToken,
    ) -> (ItemOutcome, Option<NicoloaderError>) {
        let path = video_path(&job.directory, &hit.title);
        let task = DownloadTask::new(hit.video_id.clone(), path.clone()).with_options(self.options);
        debug!("{} -> {}", hit.video_id, path.display());

        let (state, result) = self.manager.run(&task, cancel).await;

        let (error, fatal) = match result {
            Ok(_) => (None, None),
            Err(e) if e.is_fatal() => (Some(e.to_string()), Some(e)),
            Err(e) => {
                if state == TaskState::ConflictRejected {
                    info!("Skipping {}: {}", hit.video_id, e);
                } else {
                    warn!("{} ({}) failed: {}", hit.video_id, path.display(), e);
                }
                (Some(e.to_string()), None)
            }
        };

        let outcome = ItemOutcome {
            query: job.query.text().to_string(),
            video_id: hit.video_id.clone(),
            title: hit.title.clone(),
            path,
            state,
            error,
            finished_at: Utc::now(),
        };
        (outcome, fatal)
    }
}
