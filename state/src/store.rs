use std::time::Duration;

use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;
use gateway_model::Job;
use gateway_model::JobFilter;
use gateway_model::JobId;
use gateway_model::JobPatch;
use gateway_model::JobSpec;
use gateway_model::TranscriptResult;

use crate::StoreError;

/// The durable job store capability. Backends implement this
/// trait; the processor and API depend only on the trait object so the
/// backend is swappable.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn create(&self, spec: &JobSpec) -> Result<Job, StoreError>;

    async fn get(&self, id: JobId) -> Result<Option<Job>, StoreError>;

    async fn query(&self, filter: &JobFilter) -> Result<Vec<Job>, StoreError>;

    /// Returns `true` if a row was deleted, `false` if `id` was not found.
    async fn delete(&self, id: JobId) -> Result<bool, StoreError>;

    async fn update(&self, id: JobId, patch: &JobPatch) -> Result<(), StoreError>;

    /// The scheduling primitive: atomically selects the oldest
    /// `queued` row of the highest priority matching `engine_name`,
    /// transitions it to `processing`, and returns it.
    async fn claim_next(&self, engine_name: &str) -> Result<Option<Job>, StoreError>;

    async fn mark_completed(
        &self,
        id: JobId,
        result: &TranscriptResult,
        language: Option<&str>,
        duration_s: f64,
    ) -> Result<(), StoreError>;

    async fn mark_failed(
        &self,
        id: JobId,
        error_message: &str,
        duration_s: f64,
    ) -> Result<(), StoreError>;

    /// Records a callback delivery outcome. A no-op if a terminal success was
    /// already recorded.
    async fn record_callback(
        &self,
        id: JobId,
        status_code: Option<i32>,
        message: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Crash recovery: transitions every `processing` row whose
    /// `updated_at` is older than `older_than` back to `queued`. Returns the
    /// ids that were reclaimed.
    async fn reclaim_orphans(&self, older_than: Duration) -> Result<Vec<JobId>, StoreError>;

    /// Terminal jobs with a callback still pending delivery, used by the
    /// callback dispatcher to re-derive its queue at startup.
    async fn pending_callbacks(&self) -> Result<Vec<Job>, StoreError>;
}
