//! Platform URL resolution: turn a
//! social-video share link into a direct, downloadable media URL. New
//! platforms are added by implementing [`Crawler`] and registering an
//! instance in [`CrawlerRegistry`]; the staging pipeline is indifferent to
//! which platform it is talking to.

mod douyin;
mod error;
mod registry;
mod tiktok;

pub use douyin::DouyinCrawler;
pub use error::CrawlerError;
pub use registry::CrawlerRegistry;
pub use tiktok::TiktokCrawler;

use async_trait::async_trait;
use serde::Deserialize;
use serde::Serialize;

/// The result of resolving a share URL to a playable media location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedMedia {
    pub direct_media_url: String,
    pub display_metadata: Option<serde_json::Value>,
}

#[async_trait]
pub trait Crawler: Send + Sync {
    /// Unique, lowercase platform identifier, e.g. `"tiktok"`.
    fn platform(&self) -> &'static str;

    async fn resolve(&self, url: &str) -> Result<ResolvedMedia, CrawlerError>;
}
