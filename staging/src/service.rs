use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::Stream;
use futures::StreamExt;
use gateway_crawler::CrawlerRegistry;
use gateway_model::Backoff;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio::sync::Semaphore;
use tracing::warn;
use uuid::Uuid;

use crate::StagingError;

#[derive(Debug, Clone)]
pub struct StagingConfig {
    pub staging_dir: PathBuf,
    pub max_file_size_bytes: u64,
    /// Empty means "any extension allowed".
    pub allowed_extensions: Vec<String>,
    pub download_concurrency: usize,
    pub download_backoff: Backoff,
}

/// File staging: the only writer of files into the staging
/// directory, so it is the natural place to enforce the size cap and the
/// allowed-extension allowlist.
pub struct StagingService {
    config: StagingConfig,
    client: reqwest::Client,
    crawlers: CrawlerRegistry,
    download_semaphore: Arc<Semaphore>,
}

fn extension_of(name: &str) -> Option<String> {
    Path::new(name).extension().map(|ext| ext.to_string_lossy().to_ascii_lowercase())
}

fn check_extension_allowed(allowed: &[String], name: &str) -> Result<(), StagingError> {
    if allowed.is_empty() {
        return Ok(());
    }
    let ext = extension_of(name).unwrap_or_default();
    if allowed.iter().any(|candidate| candidate.eq_ignore_ascii_case(&ext)) {
        Ok(())
    } else {
        Err(StagingError::DisallowedExtension(ext))
    }
}

impl StagingService {
    pub fn new(config: StagingConfig, client: reqwest::Client, crawlers: CrawlerRegistry) -> Self {
        let download_semaphore = Arc::new(Semaphore::new(config.download_concurrency.max(1)));
        Self { config, client, crawlers, download_semaphore }
    }

    fn unique_path(&self, declared_name: &str) -> PathBuf {
        let ext = extension_of(declared_name);
        let stem = Uuid::new_v4();
        let filename = match ext {
            Some(ext) => format!("{stem}.{ext}"),
            None => stem.to_string(),
        };
        self.config.staging_dir.join(filename)
    }

    /// Streams `stream` to a uniquely-named file under the staging directory,
    /// enforcing the size cap and extension allowlist. Rejects before any bytes are written if the
    /// extension is disallowed.
    pub async fn stage_upload<S>(&self, mut stream: S, declared_name: &str) -> Result<String, StagingError>
    where
        S: Stream<Item = Result<Bytes, std::io::Error>> + Unpin,
    {
        check_extension_allowed(&self.config.allowed_extensions, declared_name)?;
        let path = self.unique_path(declared_name);
        let mut file = File::create(&path).await?;
        let mut written: u64 = 0;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            written += chunk.len() as u64;
            if written > self.config.max_file_size_bytes {
                drop(file);
                let _ = tokio::fs::remove_file(&path).await;
                return Err(StagingError::TooLarge { max_bytes: self.config.max_file_size_bytes });
            }
            file.write_all(&chunk).await?;
        }
        file.flush().await?;
        Ok(path.to_string_lossy().into_owned())
    }

    /// Resolves `platform` via the crawler registry when present, then
    /// performs a chunked, size-capped download into the staging directory.
    /// Retries transient failures with backoff, bounded by a
    /// download-concurrency semaphore.
    pub async fn stage_url(&self, url: &str, platform: Option<&str>) -> Result<String, StagingError> {
        let direct_url = match platform {
            Some(platform) if self.crawlers.supports(platform) => {
                self.crawlers.resolve(platform, url).await?.direct_media_url
            }
            _ => url.to_owned(),
        };
        let _permit = self
            .download_semaphore
            .acquire()
            .await
            .expect("download semaphore is never closed");

        let declared_name = direct_url.rsplit('/').next().unwrap_or("download");
        let path = self.unique_path(declared_name);

        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.download_once(&direct_url, &path).await {
                Ok(()) => return Ok(path.to_string_lossy().into_owned()),
                Err(err) if err.is_transient() => {
                    let Some(delay) = self.config.download_backoff.delay_for_attempt(attempt) else {
                        return Err(err);
                    };
                    warn!(attempt, delay_ms = delay.as_millis() as u64, url = %direct_url, "retrying staged download");
                    let _ = tokio::fs::remove_file(&path).await;
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn download_once(&self, url: &str, path: &Path) -> Result<(), StagingError> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        let mut file = File::create(path).await?;
        let mut written: u64 = 0;
        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            written += chunk.len() as u64;
            if written > self.config.max_file_size_bytes {
                drop(file);
                let _ = tokio::fs::remove_file(path).await;
                return Err(StagingError::TooLarge { max_bytes: self.config.max_file_size_bytes });
            }
            file.write_all(&chunk).await?;
        }
        file.flush().await?;
        Ok(())
    }

    /// Registers `path` for deletion after `when` elapses. Fire-and-forget:
    /// the reconciliation scan (see [`crate::reconcile_orphans`]) is the
    /// restart-safe backstop if the process dies before this fires.
    pub fn schedule_delete(&self, path: String, when: Duration) {
        tokio::spawn(async move {
            tokio::time::sleep(when).await;
            if let Err(err) = tokio::fs::remove_file(&path).await {
                if err.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %path, error = %err, "failed to delete staged file");
                }
            }
        });
    }
}
