use std::collections::HashMap;
use std::sync::Arc;

use crate::Crawler;
use crate::CrawlerError;
use crate::DouyinCrawler;
use crate::ResolvedMedia;
use crate::TiktokCrawler;

/// Dispatches by platform name to the registered [`Crawler`]. Built with
/// `tiktok` and `douyin` by default; additional platforms are added by
/// constructing the registry with more entries, not by changing its API.
#[derive(Clone)]
pub struct CrawlerRegistry {
    crawlers: HashMap<&'static str, Arc<dyn Crawler>>,
}

impl CrawlerRegistry {
    pub fn new(crawlers: Vec<Arc<dyn Crawler>>) -> Self {
        let crawlers = crawlers
            .into_iter()
            .map(|crawler| (crawler.platform(), crawler))
            .collect();
        Self { crawlers }
    }

    /// The default registry, wired with the built-in resolvers.
    pub fn with_defaults(client: reqwest::Client) -> Self {
        Self::new(vec![
            Arc::new(TiktokCrawler::new(client.clone())),
            Arc::new(DouyinCrawler::new(client)),
        ])
    }

    pub async fn resolve(&self, platform: &str, url: &str) -> Result<ResolvedMedia, CrawlerError> {
        let crawler = self
            .crawlers
            .get(platform)
            .ok_or_else(|| CrawlerError::UnsupportedPlatform(platform.to_owned()))?;
        crawler.resolve(url).await
    }

    pub fn supports(&self, platform: &str) -> bool {
        self.crawlers.contains_key(platform)
    }
}
