use thiserror::Error;

#[derive(Debug, Error)]
pub enum StagingError {
    #[error("upload exceeds the configured max size of {max_bytes} bytes")]
    TooLarge { max_bytes: u64 },

    #[error("file extension {0:?} is not in the allowed set")]
    DisallowedExtension(String),

    #[error("invalid source url: {0}")]
    InvalidUrl(String),

    #[error(transparent)]
    Crawler(#[from] gateway_crawler::CrawlerError),

    #[error("download failed: {0}")]
    Download(#[from] reqwest::Error),

    #[error("filesystem error: {0}")]
    Io(#[from] std::io::Error),
}

impl StagingError {
    /// Whether the caller should retry this staging attempt with backoff.
    pub fn is_transient(&self) -> bool {
        matches!(self, StagingError::Download(_) | StagingError::Io(_))
    }
}
