use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::time::UNIX_EPOCH;

use async_trait::async_trait;
use gateway_model::DecodeOptions;
use gateway_model::Segment;

use crate::AsrEngine;
use crate::EngineError;
use crate::InferenceOutput;

/// A path whose name contains this marker simulates a transient device error
/// on the next `infer` call — useful for exercising the processor's
/// retry-once-on-a-fresh-worker path without a real GPU.
pub const FORCE_TRANSIENT_ERROR_MARKER: &str = "force-transient-error";

/// A deterministic stand-in for a real speech model:
/// derives a transcript from the audio file's byte length and modification
/// time rather than decoding any audio, so the processor's pipeline and
/// end-to-end scenarios can run without bundling a model.
pub struct MockAsrEngine {
    default_language: String,
    healthy: AtomicBool,
}

impl MockAsrEngine {
    pub fn new(default_language: impl Into<String>) -> Self {
        Self {
            default_language: default_language.into(),
            healthy: AtomicBool::new(true),
        }
    }

    /// Flips this engine's health-check result, simulating a worker the pool
    /// should discard and replace.
    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }
}

impl Default for MockAsrEngine {
    fn default() -> Self {
        Self::new("en")
    }
}

#[async_trait]
impl AsrEngine for MockAsrEngine {
    async fn infer(&self, audio_path: &Path, options: &DecodeOptions) -> Result<InferenceOutput, EngineError> {
        let name = audio_path.to_string_lossy();
        if name.contains(FORCE_TRANSIENT_ERROR_MARKER) {
            return Err(EngineError::Transient(format!(
                "simulated device fault decoding {name}"
            )));
        }

        let metadata = tokio::fs::metadata(audio_path).await?;
        let byte_len = metadata.len();
        let modified_secs = metadata
            .modified()
            .ok()
            .and_then(|modified| modified.duration_since(UNIX_EPOCH).ok())
            .map(|duration| duration.as_secs())
            .unwrap_or(0);

        let segment_count = ((byte_len % 5) + 1) as usize;
        let segment_len = 2.0_f64;
        let mut segments = Vec::with_capacity(segment_count);
        let mut text_parts = Vec::with_capacity(segment_count);
        for index in 0..segment_count {
            let start = index as f64 * segment_len;
            let end = start + segment_len;
            let segment_text = format!("segment {index} of {byte_len} bytes at {modified_secs}");
            segments.push(Segment {
                id: index as i64,
                start,
                end,
                text: segment_text.clone(),
                extra: serde_json::json!({}),
            });
            text_parts.push(segment_text);
        }

        let language = options
            .language
            .clone()
            .unwrap_or_else(|| self.default_language.clone());

        Ok(InferenceOutput {
            text: text_parts.join(" "),
            segments,
            info: serde_json::json!({"engine": "mock", "byte_len": byte_len}),
            language,
        })
    }

    async fn health_check(&self) -> bool {
        self.healthy.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::NamedTempFile;

    #[tokio::test]
    async fn infers_deterministically_from_file_metadata() {
        let file = NamedTempFile::new().unwrap();
        std::fs::write(file.path(), b"hello world").unwrap();
        let engine = MockAsrEngine::default();
        let first = engine.infer(file.path(), &DecodeOptions::default()).await.unwrap();
        let second = engine.infer(file.path(), &DecodeOptions::default()).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.language, "en");
        assert!(!first.segments.is_empty());
    }

    #[tokio::test]
    async fn honors_a_forced_language_override() {
        let file = NamedTempFile::new().unwrap();
        std::fs::write(file.path(), b"abc").unwrap();
        let engine = MockAsrEngine::default();
        let options = DecodeOptions {
            language: Some("zh".into()),
            ..Default::default()
        };
        let result = engine.infer(file.path(), &options).await.unwrap();
        assert_eq!(result.language, "zh");
    }

    #[tokio::test]
    async fn marker_path_simulates_a_transient_error() {
        let engine = MockAsrEngine::default();
        let path = Path::new("/tmp/force-transient-error-123.wav");
        let result = engine.infer(path, &DecodeOptions::default()).await;
        assert!(matches!(result, Err(EngineError::Transient(_))));
    }

    #[tokio::test]
    async fn health_check_reflects_set_healthy() {
        let engine = MockAsrEngine::default();
        assert!(engine.health_check().await);
        engine.set_healthy(false);
        assert!(!engine.health_check().await);
    }
}
