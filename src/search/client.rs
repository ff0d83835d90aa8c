//! Snapshot search API client
//!
//! Issues a single GET per query and keeps the server's ordering
//! (newest upload first). There is no retry here: a transport failure is
//! returned to the caller as-is.

use crate::search::models::{SearchHit, SearchQuery, SnapshotResponse};
use crate::utils::error::{NicoloaderError, Result};
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, instrument, warn};
use url::Url;

/// Public snapshot search endpoint
pub const DEFAULT_SEARCH_ENDPOINT: &str =
    "https://api.search.nicovideo.jp/api/v2/snapshot/video/contents/search";

/// Largest `_limit` the snapshot API accepts
pub const MAX_SEARCH_LIMIT: u32 = 100;

/// Fields requested from the API
const RESULT_FIELDS: &str = "contentId,title";
/// Descending by upload start time
const SORT_ORDER: &str = "-startTime";
/// Client tag the snapshot API asks callers to send
const CONTEXT: &str = "nicoloader";

pub struct SearchClient {
    client: Client,
    endpoint: Url,
}

impl SearchClient {
    pub fn new(endpoint: Url) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("nicoloader/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self { client, endpoint })
    }

    pub fn with_default_endpoint() -> Result<Self> {
        let endpoint = Url::parse(DEFAULT_SEARCH_ENDPOINT)
            .map_err(|e| NicoloaderError::Config(format!("bad search endpoint: {}", e)))?;
        Self::new(endpoint)
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Query parameters sent for `query`
    pub fn query_params(query: &SearchQuery) -> Vec<(&'static str, String)> {
        vec![
            ("q", query.text().to_string()),
            ("targets", query.targets_param()),
            ("fields", RESULT_FIELDS.to_string()),
            ("_sort", SORT_ORDER.to_string()),
            ("_limit", query.limit().to_string()),
            ("_context", CONTEXT.to_string()),
        ]
    }

    /// Search for videos matching `query`, newest first
    #[instrument(skip(self), fields(q = %query.text(), targets = %query.targets_param()))]
    pub async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchHit>> {
        let response = self
            .client
            .get(self.endpoint.clone())
            .query(&Self::query_params(query))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            warn!("Search request returned {}", status);
            return Err(NicoloaderError::HttpStatus {
                status,
                url: self.endpoint.to_string(),
            });
        }

        let body = response.text().await?;
        let mut hits = parse_search_response(&body)?;

        let limit = query.limit() as usize;
        if hits.len() > limit {
            warn!(
                "Server returned {} hits for limit {}, truncating",
                hits.len(),
                limit
            );
            hits.truncate(limit);
        }

        debug!("Search returned {} hits", hits.len());
        Ok(hits)
    }
}

/// Parse a snapshot API body into `(contentId, title)` hits in server order
pub fn parse_search_response(body: &str) -> Result<Vec<SearchHit>> {
    let response: SnapshotResponse = serde_json::from_str(body)?;

    if let Some(meta) = &response.meta {
        if meta.status != 200 {
            return Err(NicoloaderError::Parse(format!(
                "search API reported status {}",
                meta.status
            )));
        }
        debug!(
            "Snapshot API total count: {}",
            meta.total_count.unwrap_or_default()
        );
    }

    Ok(response.data)
}
