//! Nicoloader - batch video downloader
//!
//! Runs the configured snapshot searches and hands every matched video to an
//! external download tool, saving it under the configured root directory.

use anyhow::{Context, Result};
use clap::Parser;
use nicoloader::downloader::{
    DownloadManager, DownloadOptions, Downloader, ExternalDownloader, SessionClient,
};
use nicoloader::search::SearchClient;
use nicoloader::utils::{self, AppConfig, LogOptions};
use nicoloader::{BatchRunner, QueryJob};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Exit code used after a user interrupt
const EXIT_INTERRUPTED: i32 = 130;

/// Download videos matching configured search queries
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Config file (defaults to ./config.toml, then the user config directory)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log what would be downloaded without downloading
    #[arg(long)]
    dry_run: bool,

    /// Overwrite files that already exist
    #[arg(long)]
    overwrite: bool,

    /// Set log level to DEBUG
    #[arg(short, long)]
    verbose: bool,

    /// Also write daily log files to this directory
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Write a JSON report of every item to this file
    #[arg(long)]
    report: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let cwd = std::env::current_dir().context("cannot determine working directory")?;
    let config_path = utils::resolve_config_path(args.config.as_deref(), &cwd);
    let config = AppConfig::load(&config_path)
        .await
        .with_context(|| format!("loading {}", config_path.display()))?;

    let _log_guard = utils::init_logging(&LogOptions {
        verbose: args.verbose,
        directory: args.log_dir.clone().or_else(|| config.logging.directory.clone()),
    })?;
    info!("Loaded {}", config_path.display());

    let code = run(&args, config).await?;
    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}

async fn run(args: &Args, config: AppConfig) -> Result<i32> {
    let downloader = ExternalDownloader::new(
        config.downloader.tool,
        config.downloader.path.clone(),
        config.downloader.extra_args.clone(),
    )?;
    if !args.dry_run {
        downloader.check_available().await?;
    }
    let downloader: Arc<dyn Downloader> = Arc::new(downloader);

    let search = SearchClient::new(config.endpoints.search_url()?)?;
    let session_client = SessionClient::new(config.endpoints.login_url()?, config.retry_policy())?;

    // A dry run never logs in; a real run fails fast on bad credentials.
    let manager = if args.dry_run {
        DownloadManager::new(config.credentials(), session_client, downloader)?
    } else {
        DownloadManager::connect(config.credentials(), session_client, downloader).await?
    }
    .with_watch_prefix(&config.endpoints.watch_prefix)?;

    let jobs = QueryJob::from_config(&config)?;
    let options = DownloadOptions {
        overwrite: args.overwrite,
        dry_run: args.dry_run,
    };
    let runner = BatchRunner::new(search, manager, jobs, options);

    let cancel = CancellationToken::new();
    let listener = tokio::spawn(cancel_on_ctrl_c(cancel.clone()));

    let report = runner.run(&cancel).await;
    listener.abort();

    if let Some(path) = &args.report {
        if let Err(e) = report.write_json(path).await {
            warn!("Failed to write report to {}: {}", path.display(), e);
        }
    }

    if report.was_cancelled() {
        warn!("Interrupted");
        return Ok(EXIT_INTERRUPTED);
    }
    if let Some(e) = &report.aborted {
        error!("Batch aborted: {}", e);
        return Ok(1);
    }
    Ok(0)
}

async fn cancel_on_ctrl_c(cancel: CancellationToken) {
    match signal::ctrl_c().await {
        Ok(()) => {
            warn!("Interrupt received, cancelling current download");
            cancel.cancel();
        }
        Err(e) => error!("Failed to install Ctrl+C handler: {}", e),
    }
}
