//! The ASR inference collaborator: an external black box behind a single
//! `infer` operation. This crate provides a concrete [`AsrEngine`] trait and
//! [`MockAsrEngine`], a deterministic implementation that exercises every
//! pool/processor code path without bundling a real speech model.

mod error;
mod mock;

pub use error::EngineError;
pub use mock::MockAsrEngine;

use std::path::Path;

use async_trait::async_trait;
use gateway_model::DecodeOptions;
use gateway_model::Segment;

/// What a successful `infer` call yields.
#[derive(Debug, Clone, PartialEq)]
pub struct InferenceOutput {
    pub text: String,
    pub segments: Vec<Segment>,
    pub info: serde_json::Value,
    pub language: String,
}

/// The inference contract. Implementations are synchronous,
/// CPU/GPU-bound work; callers must run `infer` on a blocking-task pool
/// rather than the event-loop thread.
#[async_trait]
pub trait AsrEngine: Send + Sync {
    async fn infer(&self, audio_path: &Path, options: &DecodeOptions) -> Result<InferenceOutput, EngineError>;

    /// A trivial liveness probe.
    async fn health_check(&self) -> bool;
}
