use axum::Json;
use axum::extract::Multipart;
use axum::extract::Path;
use axum::extract::Query;
use axum::extract::State;
use axum::http::StatusCode;
use axum::http::header;
use axum::response::IntoResponse;
use axum::response::Response;
use futures::StreamExt;
use gateway_model::DecodeOptions;
use gateway_model::Job;
use gateway_model::JobId;
use gateway_model::JobSource;
use gateway_model::JobSpec;
use gateway_model::Priority;
use gateway_model::TaskType;
use gateway_media::SubtitleFormat;
use gateway_media::render_subtitle;

use crate::dto::CreateTaskResponse;
use crate::dto::DeleteResponse;
use crate::dto::ListTasksQuery;
use crate::dto::SubtitleQuery;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Default)]
struct ParsedFields {
    local_path: Option<String>,
    url: Option<String>,
    platform: Option<String>,
    priority: Option<String>,
    task_type: Option<String>,
    engine_name: Option<String>,
    callback_url: Option<String>,
    decode_options_raw: Option<String>,
}

async fn parse_multipart(state: &AppState, mut multipart: Multipart) -> Result<ParsedFields, ApiError> {
    let mut fields = ParsedFields::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| ApiError::Validation(err.to_string()))?
    {
        let name = field.name().unwrap_or("").to_owned();
        match name.as_str() {
            "file" => {
                let declared_name = field.file_name().unwrap_or("upload").to_owned();
                let stream = field.map(|chunk| chunk.map_err(|err| std::io::Error::other(err.to_string())));
                let path = state.staging.stage_upload(stream, &declared_name).await?;
                fields.local_path = Some(path);
            }
            "url" => fields.url = Some(text_of(field).await?),
            "platform" => fields.platform = Some(text_of(field).await?),
            "priority" => fields.priority = Some(text_of(field).await?),
            "task_type" => fields.task_type = Some(text_of(field).await?),
            "engine_name" => fields.engine_name = Some(text_of(field).await?),
            "callback_url" => fields.callback_url = Some(text_of(field).await?),
            "decode_options" => fields.decode_options_raw = Some(text_of(field).await?),
            _ => {}
        }
    }
    Ok(fields)
}

async fn text_of(field: axum::extract::multipart::Field<'_>) -> Result<String, ApiError> {
    field.text().await.map_err(|err| ApiError::Validation(err.to_string()))
}

/// `POST /tasks`: multipart upload or URL field, staged through C2
/// for uploads, queued for URL sources (the processor stages those at run
/// time).
pub async fn create_task(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<CreateTaskResponse>, ApiError> {
    let fields = parse_multipart(&state, multipart).await?;

    let task_type = match fields.task_type.as_deref() {
        Some(raw) => TaskType::parse(raw).map_err(|_| ApiError::Validation(format!("invalid task_type: {raw}")))?,
        None => return Err(ApiError::Validation("task_type is required".to_owned())),
    };
    let priority = match fields.priority.as_deref() {
        Some(raw) => Priority::parse(raw).map_err(|_| ApiError::Validation(format!("invalid priority: {raw}")))?,
        None => Priority::Normal,
    };
    let decode_options = match fields.decode_options_raw.as_deref() {
        Some(raw) => {
            serde_json::from_str::<DecodeOptions>(raw).map_err(|err| ApiError::Validation(err.to_string()))?
        }
        None => DecodeOptions::default(),
    };

    let (source, file_url) = match (fields.local_path, fields.url) {
        (Some(path), _) => (JobSource::LocalPath { path }, None),
        (None, Some(url)) => {
            url::Url::parse(&url).map_err(|err| ApiError::Validation(format!("invalid url: {err}")))?;
            (JobSource::RemoteUrl { url: url.clone() }, Some(url))
        }
        (None, None) => return Err(ApiError::Validation("either a file upload or a url field is required".into())),
    };

    let spec = JobSpec {
        priority,
        engine_name: fields.engine_name.unwrap_or_else(|| state.default_engine_name.clone()),
        task_type,
        source,
        file_url,
        platform: fields.platform,
        decode_options,
        callback_url: fields.callback_url,
    };

    let job = state.store.create(&spec).await?;
    state.processor.notify_new_job();
    Ok(Json(CreateTaskResponse::new(job)))
}

/// `GET /tasks/{id}`.
pub async fn get_task(State(state): State<AppState>, Path(id): Path<JobId>) -> Result<Json<Job>, ApiError> {
    state.store.get(id).await?.map(Json).ok_or(ApiError::NotFound(id))
}

/// `GET /tasks?...`.
pub async fn list_tasks(
    State(state): State<AppState>,
    Query(query): Query<ListTasksQuery>,
) -> Result<Json<Vec<Job>>, ApiError> {
    let filter = query.into_filter()?;
    let jobs = state.store.query(&filter).await?;
    Ok(Json(jobs))
}

/// `DELETE /tasks/{id}`.
pub async fn delete_task(
    State(state): State<AppState>,
    Path(id): Path<JobId>,
) -> Result<Json<DeleteResponse>, ApiError> {
    let deleted = state.store.delete(id).await?;
    if deleted {
        Ok(Json(DeleteResponse { deleted: true }))
    } else {
        Err(ApiError::NotFound(id))
    }
}

/// `GET /tasks/{id}/subtitle?format=srt|vtt`.
pub async fn get_subtitle(
    State(state): State<AppState>,
    Path(id): Path<JobId>,
    Query(query): Query<SubtitleQuery>,
) -> Result<Response, ApiError> {
    let format = SubtitleFormat::parse(&query.format)
        .ok_or_else(|| ApiError::Validation(format!("unsupported subtitle format: {}", query.format)))?;
    let job = state.store.get(id).await?.ok_or(ApiError::NotFound(id))?;
    let Some(result) = job.result.as_ref() else {
        return Err(ApiError::Conflict(format!("job {id} is not completed")));
    };
    let body = render_subtitle(result, format);
    let content_type = match format {
        SubtitleFormat::Srt => "application/x-subrip; charset=utf-8",
        SubtitleFormat::Vtt => "text/vtt; charset=utf-8",
    };
    Ok((StatusCode::OK, [(header::CONTENT_TYPE, content_type)], body).into_response())
}
