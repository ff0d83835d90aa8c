pub mod client;
pub mod models;

pub use client::{parse_search_response, SearchClient, DEFAULT_SEARCH_ENDPOINT, MAX_SEARCH_LIMIT};
pub use models::{SearchHit, SearchQuery, TargetField};
