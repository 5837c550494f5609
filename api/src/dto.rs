use chrono::DateTime;
use chrono::Utc;
use gateway_model::Job;
use gateway_model::JobFilter;
use gateway_model::JobStatus;
use gateway_model::Priority;
use serde::Deserialize;
use serde::Serialize;

use crate::error::ApiError;

/// Response body for `POST /tasks`.
#[derive(Debug, Serialize)]
pub struct CreateTaskResponse {
    #[serde(flatten)]
    pub job: Job,
    pub result_poll_url: String,
}

impl CreateTaskResponse {
    pub fn new(job: Job) -> Self {
        let result_poll_url = format!("/tasks/{}", job.id);
        Self { job, result_poll_url }
    }
}

/// Query parameters for `GET /tasks`.
#[derive(Debug, Deserialize, Default)]
pub struct ListTasksQuery {
    pub status: Option<String>,
    pub priority: Option<String>,
    pub engine_name: Option<String>,
    pub language: Option<String>,
    pub created_after: Option<DateTime<Utc>>,
    pub created_before: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl ListTasksQuery {
    pub fn into_filter(self) -> Result<JobFilter, ApiError> {
        let status = self
            .status
            .as_deref()
            .map(JobStatus::parse)
            .transpose()
            .map_err(|err| ApiError::Validation(err.to_string()))?;
        let priority = self
            .priority
            .as_deref()
            .map(Priority::parse)
            .transpose()
            .map_err(|err| ApiError::Validation(err.to_string()))?;
        Ok(JobFilter {
            status,
            priority,
            engine_name: self.engine_name,
            language: self.language,
            created_after: self.created_after,
            created_before: self.created_before,
            limit: self.limit.unwrap_or(50),
            offset: self.offset.unwrap_or(0),
        })
    }
}

/// Query parameters for `GET /tasks/{id}/subtitle`.
#[derive(Debug, Deserialize)]
pub struct SubtitleQuery {
    pub format: String,
}

/// Multipart/JSON fields accepted by `POST /audio/extract`.
#[derive(Debug, Deserialize)]
pub struct ExtractAudioFields {
    pub container: String,
    pub sample_rate_hz: Option<u32>,
    pub bit_depth: Option<u32>,
}

/// JSON body accepted by `POST /platforms/{platform}/video_task`.
#[derive(Debug, Deserialize)]
pub struct VideoTaskRequest {
    pub url: String,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub engine_name: Option<String>,
    #[serde(default)]
    pub task_type: Option<String>,
    #[serde(default)]
    pub decode_options: Option<gateway_model::DecodeOptions>,
    #[serde(default)]
    pub callback_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub deleted: bool,
}
