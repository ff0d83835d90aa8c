//! Download manager module

pub mod external;
pub mod manager;
pub mod retry;
pub mod session;
pub mod task;
pub mod traits;

// Re-export for convenience
pub use external::{ExternalDownloader, Tool};
pub use manager::{DownloadManager, DEFAULT_WATCH_PREFIX};
pub use retry::RetryPolicy;
pub use session::{Credentials, Session, SessionClient, DEFAULT_LOGIN_URL};
pub use task::{DownloadOptions, DownloadTask, TaskState};
pub use traits::{Authorization, Downloader};
