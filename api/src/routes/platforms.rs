use axum::Json;
use axum::extract::Path;
use axum::extract::State;
use gateway_model::JobSource;
use gateway_model::JobSpec;
use gateway_model::Priority;
use gateway_model::TaskType;

use crate::dto::CreateTaskResponse;
use crate::dto::VideoTaskRequest;
use crate::error::ApiError;
use crate::state::AppState;

/// `POST /platforms/{platform}/video_task`. Only validates that
/// the platform is registered; the actual crawler resolution and download
/// happen inside the processor's pipeline so a share URL is resolved exactly once.
pub async fn video_task(
    State(state): State<AppState>,
    Path(platform): Path<String>,
    Json(request): Json<VideoTaskRequest>,
) -> Result<Json<CreateTaskResponse>, ApiError> {
    if !state.crawlers.supports(&platform) {
        return Err(ApiError::BadGateway(format!("unsupported platform: {platform}")));
    }
    url::Url::parse(&request.url).map_err(|err| ApiError::Validation(format!("invalid url: {err}")))?;

    let task_type = match request.task_type.as_deref() {
        Some(raw) => TaskType::parse(raw).map_err(|_| ApiError::Validation(format!("invalid task_type: {raw}")))?,
        None => TaskType::Transcribe,
    };
    let priority = match request.priority.as_deref() {
        Some(raw) => Priority::parse(raw).map_err(|_| ApiError::Validation(format!("invalid priority: {raw}")))?,
        None => Priority::Normal,
    };

    let spec = JobSpec {
        priority,
        engine_name: request.engine_name.unwrap_or_else(|| state.default_engine_name.clone()),
        task_type,
        source: JobSource::RemoteUrl { url: request.url.clone() },
        file_url: Some(request.url),
        platform: Some(platform),
        decode_options: request.decode_options.unwrap_or_default(),
        callback_url: request.callback_url,
    };

    let job = state.store.create(&spec).await?;
    state.processor.notify_new_job();
    Ok(Json(CreateTaskResponse::new(job)))
}
