use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;

use crate::DecodeOptions;
use crate::GatewayError;
use crate::TranscriptResult;

pub type JobId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Result<Self, GatewayError> {
        match value {
            "queued" => Ok(Self::Queued),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(GatewayError::Store(format!("invalid job status: {other}"))),
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

/// Ordered `high < normal < low` only for display; scheduling uses
/// [`Priority::rank`], where a *lower* rank claims first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Normal,
    Low,
}

impl Priority {
    pub const fn as_str(self) -> &'static str {
        match self {
            Priority::High => "high",
            Priority::Normal => "normal",
            Priority::Low => "low",
        }
    }

    pub fn parse(value: &str) -> Result<Self, GatewayError> {
        match value {
            "high" => Ok(Self::High),
            "normal" => Ok(Self::Normal),
            "low" => Ok(Self::Low),
            other => Err(GatewayError::Store(format!("invalid priority: {other}"))),
        }
    }

    /// Lower rank claims before higher rank.
    pub const fn rank(self) -> i32 {
        match self {
            Priority::High => 0,
            Priority::Normal => 1,
            Priority::Low => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskType {
    Transcribe,
    Translate,
}

impl TaskType {
    pub const fn as_str(self) -> &'static str {
        match self {
            TaskType::Transcribe => "transcribe",
            TaskType::Translate => "translate",
        }
    }

    pub fn parse(value: &str) -> Result<Self, GatewayError> {
        match value {
            "transcribe" => Ok(Self::Transcribe),
            "translate" => Ok(Self::Translate),
            other => Err(GatewayError::Store(format!("invalid task type: {other}"))),
        }
    }
}

/// A job's source is exactly one of a staged local path or a remote URL.
/// `file_url` is kept alongside on [`Job`] verbatim for audit even
/// when the source is a local upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum JobSource {
    LocalPath { path: String },
    RemoteUrl { url: String },
}

/// The durable job record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub status: JobStatus,
    pub priority: Priority,
    pub engine_name: String,
    pub task_type: TaskType,
    pub source: JobSource,
    pub file_url: Option<String>,
    pub file_name: Option<String>,
    pub file_size_bytes: Option<i64>,
    pub file_duration_seconds: Option<f64>,
    pub platform: Option<String>,
    pub language: Option<String>,
    pub decode_options: DecodeOptions,
    pub result: Option<TranscriptResult>,
    pub error_message: Option<String>,
    pub task_processing_time_seconds: Option<f64>,
    pub callback_url: Option<String>,
    pub callback_status_code: Option<i32>,
    pub callback_message: Option<String>,
    pub callback_time: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// `callback_url` is only ever "present" when
    /// non-empty; an explicit empty string from intake is normalized to
    /// `None` by [`JobSpec`] before it ever reaches the store.
    pub fn wants_callback(&self) -> bool {
        self.callback_url.as_deref().is_some_and(|url| !url.is_empty())
    }
}

/// Parameters accepted by `JobStore::create`.
#[derive(Debug, Clone)]
pub struct JobSpec {
    pub priority: Priority,
    pub engine_name: String,
    pub task_type: TaskType,
    pub source: JobSource,
    pub file_url: Option<String>,
    pub platform: Option<String>,
    pub decode_options: DecodeOptions,
    pub callback_url: Option<String>,
}

impl JobSpec {
    pub fn normalized_callback_url(&self) -> Option<String> {
        self.callback_url
            .as_ref()
            .filter(|url| !url.is_empty())
            .cloned()
    }
}

/// Partial update accepted by `JobStore::update`. Only
/// `status`-confined transitions are legal; the store enforces that
/// server-side inside the transaction, not here.
#[derive(Debug, Clone, Default)]
pub struct JobPatch {
    pub file_name: Option<String>,
    pub file_size_bytes: Option<i64>,
    pub file_duration_seconds: Option<f64>,
    pub language: Option<String>,
}

/// Filters accepted by `JobStore::query`.
#[derive(Debug, Clone, Default)]
pub struct JobFilter {
    pub status: Option<JobStatus>,
    pub priority: Option<Priority>,
    pub engine_name: Option<String>,
    pub language: Option<String>,
    pub created_after: Option<DateTime<Utc>>,
    pub created_before: Option<DateTime<Utc>>,
    pub limit: i64,
    pub offset: i64,
}

impl JobFilter {
    pub fn with_paging(limit: i64, offset: i64) -> Self {
        Self {
            limit,
            offset,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn priority_rank_orders_high_before_low() {
        assert!(Priority::High.rank() < Priority::Normal.rank());
        assert!(Priority::Normal.rank() < Priority::Low.rank());
    }

    #[test]
    fn status_round_trips_through_str() {
        for status in [
            JobStatus::Queued,
            JobStatus::Processing,
            JobStatus::Completed,
            JobStatus::Failed,
        ] {
            assert_eq!(JobStatus::parse(status.as_str()).unwrap(), status);
        }
    }

    #[test]
    fn empty_callback_url_is_normalized_away() {
        let spec = JobSpec {
            priority: Priority::Normal,
            engine_name: "whisper-large".into(),
            task_type: TaskType::Transcribe,
            source: JobSource::LocalPath {
                path: "/tmp/a.mp4".into(),
            },
            file_url: None,
            platform: None,
            decode_options: DecodeOptions::default(),
            callback_url: Some(String::new()),
        };
        assert_eq!(spec.normalized_callback_url(), None);
    }
}
