//! Data structures for snapshot search queries and results

use crate::utils::error::{NicoloaderError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::NonZeroU32;
use std::str::FromStr;

/// Metadata field a search query is matched against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TargetField {
    Title,
    Description,
    Tags,
    TagsExact,
    CategoryTags,
    LockTagsExact,
    GenreKeyword,
    Genre,
}

impl TargetField {
    /// Name used by the search API
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetField::Title => "title",
            TargetField::Description => "description",
            TargetField::Tags => "tags",
            TargetField::TagsExact => "tagsExact",
            TargetField::CategoryTags => "categoryTags",
            TargetField::LockTagsExact => "lockTagsExact",
            TargetField::GenreKeyword => "genre.keyword",
            TargetField::Genre => "genre",
        }
    }

    /// Parse a comma separated list such as `"title,tags"`
    pub fn parse_list(s: &str) -> Result<Vec<TargetField>> {
        s.split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(TargetField::from_str)
            .collect()
    }
}

impl FromStr for TargetField {
    type Err = NicoloaderError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "title" => Ok(TargetField::Title),
            "description" => Ok(TargetField::Description),
            "tags" => Ok(TargetField::Tags),
            "tagsExact" => Ok(TargetField::TagsExact),
            "categoryTags" => Ok(TargetField::CategoryTags),
            "lockTagsExact" => Ok(TargetField::LockTagsExact),
            "genre.keyword" => Ok(TargetField::GenreKeyword),
            "genre" => Ok(TargetField::Genre),
            other => Err(NicoloaderError::InvalidQuery(format!(
                "unknown target field '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for TargetField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A search request: free text, the fields it targets and how many hits to keep
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    text: String,
    targets: Vec<TargetField>,
    limit: NonZeroU32,
}

impl SearchQuery {
    pub fn new(text: impl Into<String>, targets: Vec<TargetField>, limit: u32) -> Result<Self> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(NicoloaderError::InvalidQuery("query text is empty".into()));
        }
        if targets.is_empty() {
            return Err(NicoloaderError::InvalidQuery(
                "at least one target field is required".into(),
            ));
        }
        let limit = NonZeroU32::new(limit)
            .ok_or_else(|| NicoloaderError::InvalidQuery("limit must be at least 1".into()))?;

        let mut unique = Vec::with_capacity(targets.len());
        for target in targets {
            if !unique.contains(&target) {
                unique.push(target);
            }
        }

        Ok(Self {
            text,
            targets: unique,
            limit,
        })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn targets(&self) -> &[TargetField] {
        &self.targets
    }

    pub fn limit(&self) -> u32 {
        self.limit.get()
    }

    /// Targets rendered the way the API expects them (`title,tags`)
    pub fn targets_param(&self) -> String {
        self.targets
            .iter()
            .map(TargetField::as_str)
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// One matched video
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    #[serde(rename = "contentId")]
    pub video_id: String,
    pub title: String,
}

/// Raw snapshot API response body
#[derive(Debug, Deserialize)]
pub(crate) struct SnapshotResponse {
    #[serde(default)]
    pub meta: Option<SnapshotMeta>,
    pub data: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SnapshotMeta {
    pub status: u16,
    #[serde(rename = "totalCount")]
    pub total_count: Option<u64>,
}
