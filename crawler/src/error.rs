use thiserror::Error;

/// All variants map to HTTP 502 at intake.
#[derive(Debug, Error)]
pub enum CrawlerError {
    #[error("unsupported platform: {0}")]
    UnsupportedPlatform(String),

    #[error("invalid share url: {0}")]
    InvalidUrl(String),

    #[error("upstream request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("could not locate a direct media url in the resolved page")]
    NotFound,
}
