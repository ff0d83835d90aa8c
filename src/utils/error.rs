//! Error handling for Nicoloader

use std::path::PathBuf;
use thiserror::Error;

/// Result alias used across the library
pub type Result<T> = std::result::Result<T, NicoloaderError>;

/// Main error type for Nicoloader
#[derive(Debug, Error)]
pub enum NicoloaderError {
    #[error("{0} already exists")]
    AlreadyExists(PathBuf),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Network error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("HTTP {status} from {url}")]
    HttpStatus {
        status: reqwest::StatusCode,
        url: String,
    },

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("Download of {video_id} from {url} failed: {detail}")]
    DownloadFailed {
        video_id: String,
        url: String,
        detail: String,
    },

    #[error("Download into {0} was cancelled")]
    Cancelled(PathBuf),

    #[error("{0} not found. Please install it or set [downloader].path")]
    DownloaderNotFound(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl NicoloaderError {
    /// Whether this error must abort the whole batch rather than a single item.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            NicoloaderError::AuthenticationFailed(_)
                | NicoloaderError::Cancelled(_)
                | NicoloaderError::DownloaderNotFound(_)
                | NicoloaderError::Config(_)
        )
    }
}

impl From<serde_json::Error> for NicoloaderError {
    fn from(e: serde_json::Error) -> Self {
        NicoloaderError::Parse(e.to_string())
    }
}
