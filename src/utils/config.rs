//! Application configuration, loaded from a TOML file
//!
//! ```toml
//! uid = "me@example.com"
//! passwd = "secret"
//! saveroot = "/data/videos"
//! limit = 10
//!
//! [[queries]]
//! query = "THE IDOLM@STER MillionRADIO"
//! target = "title"
//! subdir = "radio"
//! ```

use crate::downloader::external::Tool;
use crate::downloader::retry::RetryPolicy;
use crate::downloader::session::{Credentials, DEFAULT_LOGIN_URL};
use crate::downloader::manager::DEFAULT_WATCH_PREFIX;
use crate::search::{SearchQuery, TargetField, DEFAULT_SEARCH_ENDPOINT, MAX_SEARCH_LIMIT};
use crate::utils::error::{NicoloaderError, Result};
use path_absolutize::Absolutize;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

/// Top level configuration file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Account mail address or phone number
    pub uid: String,

    /// Account password
    pub passwd: String,

    /// Root directory for saved videos
    #[serde(default = "default_save_root")]
    pub saveroot: PathBuf,

    /// Default number of results per query
    #[serde(default = "default_limit")]
    pub limit: u32,

    #[serde(default)]
    pub queries: Vec<QueryConfig>,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub downloader: DownloaderConfig,

    #[serde(default)]
    pub endpoints: EndpointConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// One search to run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryConfig {
    pub query: String,

    /// Comma separated target fields
    #[serde(default = "default_target")]
    pub target: String,

    /// Sub directory under `saveroot`; empty means none
    #[serde(default)]
    pub subdir: Option<String>,

    /// Overrides the global `limit`
    #[serde(default)]
    pub limit: Option<u32>,
}

/// Login retry settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub attempts: u32,
    pub backoff_factor_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            attempts: policy.attempts,
            backoff_factor_ms: policy.backoff_factor.as_millis() as u64,
            max_delay_ms: policy.max_delay.as_millis() as u64,
        }
    }
}

/// External download tool settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloaderConfig {
    pub tool: Tool,
    pub path: Option<PathBuf>,
    pub extra_args: Vec<String>,
}

/// Remote endpoints; the defaults are the platform's public URLs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    pub search: String,
    pub login: String,
    pub watch_prefix: String,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            search: DEFAULT_SEARCH_ENDPOINT.to_string(),
            login: DEFAULT_LOGIN_URL.to_string(),
            watch_prefix: DEFAULT_WATCH_PREFIX.to_string(),
        }
    }
}

impl EndpointConfig {
    pub fn search_url(&self) -> Result<Url> {
        parse_endpoint("search", &self.search)
    }

    pub fn login_url(&self) -> Result<Url> {
        parse_endpoint("login", &self.login)
    }
}

/// Log file settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Directory for daily log files; stderr only when unset
    pub directory: Option<PathBuf>,
}

fn default_save_root() -> PathBuf {
    dirs::video_dir().unwrap_or_else(|| PathBuf::from("./videos"))
}

fn default_limit() -> u32 {
    100
}

fn default_target() -> String {
    TargetField::Title.as_str().to_string()
}

fn parse_endpoint(name: &str, value: &str) -> Result<Url> {
    Url::parse(value)
        .map_err(|e| NicoloaderError::Config(format!("invalid {} endpoint '{}': {}", name, value, e)))
}

impl AppConfig {
    /// Read, parse and validate a configuration file
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
            NicoloaderError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        let mut config: AppConfig = toml::from_str(&raw)
            .map_err(|e| NicoloaderError::Config(format!("{}: {}", path.display(), e)))?;

        config.saveroot = config.saveroot.absolutize()?.into_owned();
        config.validate()?;
        Ok(config)
    }

    /// Parse without validating
    pub fn from_toml(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| NicoloaderError::Config(e.to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        if self.uid.trim().is_empty() || self.passwd.is_empty() {
            return Err(NicoloaderError::Config(
                "uid and passwd must both be set".into(),
            ));
        }
        if self.limit == 0 {
            return Err(NicoloaderError::Config("limit must be at least 1".into()));
        }
        if self.queries.is_empty() {
            return Err(NicoloaderError::Config("no [[queries]] configured".into()));
        }
        if self.limit > MAX_SEARCH_LIMIT {
            return Err(NicoloaderError::Config(format!(
                "limit {} exceeds the search API maximum of {}",
                self.limit, MAX_SEARCH_LIMIT
            )));
        }
        for (i, query) in self.queries.iter().enumerate() {
            if let Some(limit) = query.limit.filter(|l| *l > MAX_SEARCH_LIMIT) {
                return Err(NicoloaderError::Config(format!(
                    "queries[{}]: limit {} exceeds the search API maximum of {}",
                    i, limit, MAX_SEARCH_LIMIT
                )));
            }
            query
                .to_search_query(self.limit)
                .map_err(|e| NicoloaderError::Config(format!("queries[{}]: {}", i, e)))?;
        }
        self.endpoints.search_url()?;
        self.endpoints.login_url()?;
        parse_endpoint("watch_prefix", &self.endpoints.watch_prefix)?;
        Ok(())
    }

    pub fn credentials(&self) -> Credentials {
        Credentials::new(self.uid.clone(), self.passwd.clone())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            attempts: self.retry.attempts,
            backoff_factor: Duration::from_millis(self.retry.backoff_factor_ms),
            max_delay: Duration::from_millis(self.retry.max_delay_ms),
        }
    }
}

impl QueryConfig {
    pub fn to_search_query(&self, default_limit: u32) -> Result<SearchQuery> {
        let targets = TargetField::parse_list(&self.target)?;
        SearchQuery::new(
            self.query.clone(),
            targets,
            self.limit.unwrap_or(default_limit),
        )
    }
}
