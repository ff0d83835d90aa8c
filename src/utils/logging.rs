//! Logging setup
//!
//! [`init_logging`] is called once from `main`. Library code only emits
//! `tracing` events and never installs a subscriber itself.

use crate::utils::error::{NicoloaderError, Result};
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// File name prefix for daily log files
const LOG_FILE_PREFIX: &str = "nicoloader.log";

#[derive(Debug, Clone, Default)]
pub struct LogOptions {
    /// Log at debug level instead of info
    pub verbose: bool,
    /// Also write daily-rotated log files here
    pub directory: Option<PathBuf>,
}

/// Keeps the background log writer alive; drop it at process exit
pub struct LoggingGuard {
    _file_guard: Option<WorkerGuard>,
}

/// Default filter directive for the given verbosity
pub fn default_directive(verbose: bool) -> &'static str {
    if verbose {
        "nicoloader=debug"
    } else {
        "nicoloader=info"
    }
}

fn build_filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)))
}

/// Install the global subscriber: stderr, plus a rolling file when configured
pub fn init_logging(options: &LogOptions) -> Result<LoggingGuard> {
    let stderr_layer = fmt::layer().with_writer(std::io::stderr).with_target(false);

    let (file_layer, file_guard) = match &options.directory {
        Some(directory) => {
            std::fs::create_dir_all(directory)?;
            let appender = tracing_appender::rolling::daily(directory, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_writer(writer).with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(build_filter(options.verbose))
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| NicoloaderError::Config(format!("logging already initialised: {}", e)))?;

    Ok(LoggingGuard {
        _file_guard: file_guard,
    })
}
