//! Utility modules for error handling, configuration and logging

pub mod config;
pub mod error;
pub mod logging;
pub mod paths;
pub mod platform;

// Re-export for convenience
pub use config::{AppConfig, QueryConfig};
pub use error::{NicoloaderError, Result};
pub use logging::{init_logging, LogOptions, LoggingGuard};
pub use paths::{query_dir, sanitize_title, video_path};
pub use platform::resolve_config_path;
