//! Delegation to an external download tool
//!
//! Supports yt-dlp (authenticated with the session cookie) and nndownload
//! (authenticated with the account credentials). The binary is looked up
//! once at construction.

use crate::downloader::traits::{Authorization, Downloader};
use crate::utils::error::{NicoloaderError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, error, info, instrument, warn};
use url::Url;

/// Lines of stderr kept in a failure message
const STDERR_TAIL_LINES: usize = 8;

/// Supported external tools
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Tool {
    #[default]
    #[serde(rename = "yt-dlp")]
    YtDlp,
    #[serde(rename = "nndownload")]
    Nndownload,
}

impl Tool {
    pub fn binary_name(&self) -> &'static str {
        match self {
            Tool::YtDlp => "yt-dlp",
            Tool::Nndownload => "nndownload",
        }
    }

    /// Full argument list for one download
    pub fn build_args(
        &self,
        auth: Authorization<'_>,
        url: &Url,
        destination: &Path,
        extra_args: &[String],
    ) -> Vec<String> {
        let destination = destination.to_string_lossy();
        let mut args = match self {
            Tool::YtDlp => vec![
                "--no-progress".to_string(),
                "--no-warnings".to_string(),
                "--add-header".to_string(),
                format!("Cookie:{}", auth.session.cookie_header()),
                "-o".to_string(),
                // -o is an output template; keep literal percent signs
                destination.replace('%', "%%"),
            ],
            Tool::Nndownload => vec![
                "-u".to_string(),
                auth.credentials.user_identifier.clone(),
                "-p".to_string(),
                auth.credentials.password.clone(),
                "-o".to_string(),
                destination.replace('{', "{{").replace('}', "}}"),
            ],
        };
        args.extend(extra_args.iter().cloned());
        args.push(url.to_string());
        args
    }
}

/// Runs the external tool as a child process
pub struct ExternalDownloader {
    tool: Tool,
    binary: PathBuf,
    extra_args: Vec<String>,
}

impl ExternalDownloader {
    /// Locate the tool, preferring `explicit_path` when given
    pub fn new(tool: Tool, explicit_path: Option<PathBuf>, extra_args: Vec<String>) -> Result<Self> {
        let binary = match explicit_path {
            Some(path) if path.exists() => path,
            Some(path) => {
                error!("Configured downloader path does not exist: {}", path.display());
                return Err(NicoloaderError::DownloaderNotFound(
                    path.display().to_string(),
                ));
            }
            None => find_tool(tool.binary_name()).ok_or_else(|| {
                NicoloaderError::DownloaderNotFound(tool.binary_name().to_string())
            })?,
        };

        info!("Using {} at {}", tool.binary_name(), binary.display());
        Ok(Self {
            tool,
            binary,
            extra_args,
        })
    }

    pub fn tool(&self) -> Tool {
        self.tool
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }
}

#[async_trait]
impl Downloader for ExternalDownloader {
    fn id(&self) -> &str {
        self.tool.binary_name()
    }

    async fn check_available(&self) -> Result<()> {
        let output = Command::new(&self.binary)
            .arg("--version")
            .stdin(Stdio::null())
            .output()
            .await?;

        if !output.status.success() {
            return Err(NicoloaderError::DownloaderNotFound(format!(
                "{} (--version exited with {})",
                self.binary.display(),
                output.status
            )));
        }

        debug!(
            "{} version: {}",
            self.tool.binary_name(),
            String::from_utf8_lossy(&output.stdout).trim()
        );
        Ok(())
    }

    #[instrument(skip(self, auth), fields(tool = self.tool.binary_name()))]
    async fn fetch(&self, auth: Authorization<'_>, url: &Url, destination: &Path) -> Result<()> {
        let args = self
            .tool
            .build_args(auth, url, destination, &self.extra_args);

        // Killed if this future is dropped mid-download.
        let output = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let tail = stderr_tail(&stderr, STDERR_TAIL_LINES);
            warn!("{} exited with {}: {}", self.tool.binary_name(), output.status, tail);
            return Err(NicoloaderError::DownloadFailed {
                video_id: video_id_from_url(url),
                url: url.to_string(),
                detail: format!("{} exited with {}: {}", self.tool.binary_name(), output.status, tail),
            });
        }

        Ok(())
    }
}

fn video_id_from_url(url: &Url) -> String {
    url.path_segments()
        .and_then(|segments| segments.last())
        .unwrap_or_default()
        .to_string()
}

fn stderr_tail(stderr: &str, lines: usize) -> String {
    let collected: Vec<&str> = stderr
        .lines()
        .filter(|line| !line.trim().is_empty())
        .collect();
    let start = collected.len().saturating_sub(lines);
    collected[start..].join(" | ")
}

// ============================================================
// Tool detection
// ============================================================

/// Find a tool binary: PATH first, then common installation paths
pub fn find_tool(name: &str) -> Option<PathBuf> {
    if let Ok(path) = which::which(name) {
        debug!("Found {} in PATH: {:?}", name, path);
        return Some(path);
    }

    if let Some(path) = find_in_common_paths(name) {
        debug!("Found {} in common path: {:?}", name, path);
        return Some(path);
    }

    warn!("{} not found anywhere", name);
    None
}

fn find_in_common_paths(name: &str) -> Option<PathBuf> {
    let mut candidates = vec![
        PathBuf::from("/opt/homebrew/bin").join(name),
        PathBuf::from("/usr/local/bin").join(name),
        PathBuf::from("/usr/bin").join(name),
    ];
    if let Some(home) = dirs::home_dir() {
        candidates.push(home.join(".local").join("bin").join(name));
    }

    candidates
        .into_iter()
        .find(|path| path.exists() && is_executable(path))
}

fn is_executable(path: &Path) -> bool {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;

        std::fs::metadata(path)
            .map(|metadata| metadata.is_file() && metadata.permissions().mode() & 0o111 != 0)
            .unwrap_or(false)
    }

    #[cfg(not(unix))]
    {
        path.is_file()
    }
}
