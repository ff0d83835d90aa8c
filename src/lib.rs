//! Nicoloader library

pub mod batch;
pub mod downloader;
pub mod search;
pub mod utils;

// Re-export main types for easier use
pub use batch::{BatchReport, BatchRunner, QueryJob};
pub use downloader::{
    Credentials, DownloadManager, DownloadOptions, DownloadTask, Downloader, ExternalDownloader,
    RetryPolicy, SessionClient, TaskState,
};
pub use search::{SearchClient, SearchHit, SearchQuery, TargetField};
pub use utils::{AppConfig, NicoloaderError};
