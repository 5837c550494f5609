use async_trait::async_trait;

use crate::Crawler;
use crate::CrawlerError;
use crate::ResolvedMedia;

const VIDEO_URL_MARKER: &str = "\"play_addr\":{\"url_list\":[\"";

/// Resolves a Douyin share link the same way [`crate::TiktokCrawler`] does:
/// follow the redirect, scan the rendered page for the player's video URL
/// marker.
pub struct DouyinCrawler {
    client: reqwest::Client,
}

impl DouyinCrawler {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Crawler for DouyinCrawler {
    fn platform(&self) -> &'static str {
        "douyin"
    }

    async fn resolve(&self, url: &str) -> Result<ResolvedMedia, CrawlerError> {
        url::Url::parse(url).map_err(|err| CrawlerError::InvalidUrl(err.to_string()))?;
        let body = self.client.get(url).send().await?.error_for_status()?.text().await?;
        let start = body.find(VIDEO_URL_MARKER).ok_or(CrawlerError::NotFound)?;
        let rest = &body[start + VIDEO_URL_MARKER.len()..];
        let end = rest.find('"').ok_or(CrawlerError::NotFound)?;
        let direct_media_url = rest[..end].replace("\\u002F", "/").replace("\\/", "/");
        Ok(ResolvedMedia {
            direct_media_url,
            display_metadata: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use wiremock::Mock;
    use wiremock::MockServer;
    use wiremock::ResponseTemplate;
    use wiremock::matchers::method;
    use wiremock::matchers::path;

    #[tokio::test]
    async fn resolves_the_embedded_play_addr_url_list() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/video/123"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"aweme_detail":{"video":{"play_addr":{"url_list":["https:\/\/cdn.example.cn\/v.mp4"]}}}}"#,
            ))
            .mount(&server)
            .await;

        let crawler = DouyinCrawler::new(reqwest::Client::new());
        let resolved = crawler.resolve(&format!("{}/video/123", server.uri())).await.unwrap();
        assert_eq!(resolved.direct_media_url, "https://cdn.example.cn/v.mp4");
    }
}
