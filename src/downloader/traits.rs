use crate::downloader::session::{Credentials, Session};
use crate::utils::error::Result;
use async_trait::async_trait;
use std::path::Path;
use url::Url;

/// What a downloader may use to authenticate against the platform
#[derive(Debug, Clone, Copy)]
pub struct Authorization<'a> {
    pub credentials: &'a Credentials,
    pub session: &'a Session,
}

/// The external mechanism that performs the actual media transfer.
///
/// Implementations write the finished file to `destination` and return once
/// it is complete. Dropping the returned future must stop the transfer.
#[async_trait]
pub trait Downloader: Send + Sync {
    /// Short identifier used in logs (e.g. "yt-dlp")
    fn id(&self) -> &str;

    /// Checks that the mechanism is usable before any batch work starts
    async fn check_available(&self) -> Result<()> {
        Ok(())
    }

    /// Fetch `url` into `destination`
    async fn fetch(&self, auth: Authorization<'_>, url: &Url, destination: &Path) -> Result<()>;
}
