use axum::extract::Multipart;
use axum::extract::State;
use axum::http::StatusCode;
use axum::http::header;
use axum::response::IntoResponse;
use axum::response::Response;
use futures::StreamExt;
use gateway_media::AudioContainer;
use gateway_media::ExtractOptions;
use gateway_media::extract_audio;

use crate::error::ApiError;
use crate::state::AppState;

/// `POST /audio/extract`: stages the upload, shells out to
/// ffmpeg, streams the result back, and always removes the staged copy.
pub async fn extract_audio_handler(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Response, ApiError> {
    let mut staged_path: Option<String> = None;
    let mut container: Option<String> = None;
    let mut sample_rate_hz: Option<u32> = None;
    let mut bit_depth: Option<u32> = None;

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
                staged_path = Some(state.staging.stage_upload(stream, &declared_name).await?);
            }
            "container" => {
                container = Some(field.text().await.map_err(|err| ApiError::Validation(err.to_string()))?);
            }
            "sample_rate_hz" => {
                let raw = field.text().await.map_err(|err| ApiError::Validation(err.to_string()))?;
                sample_rate_hz = Some(
                    raw.parse()
                        .map_err(|_| ApiError::Validation(format!("invalid sample_rate_hz: {raw}")))?,
                );
            }
            "bit_depth" => {
                let raw = field.text().await.map_err(|err| ApiError::Validation(err.to_string()))?;
                bit_depth =
                    Some(raw.parse().map_err(|_| ApiError::Validation(format!("invalid bit_depth: {raw}")))?);
            }
            _ => {}
        }
    }

    let path = staged_path.ok_or_else(|| ApiError::Validation("a file upload is required".to_owned()))?;
    let result = async {
        let container = container.ok_or_else(|| ApiError::Validation("container is required".to_owned()))?;
        let container = AudioContainer::parse(&container)?;
        let options = ExtractOptions { container, sample_rate_hz, bit_depth };
        let bytes = extract_audio(&path, &options, &state.ffmpeg_program).await?;
        let content_type = match container {
            AudioContainer::Wav => "audio/wav",
            AudioContainer::Mp3 => "audio/mpeg",
        };
        Ok::<Response, ApiError>((StatusCode::OK, [(header::CONTENT_TYPE, content_type)], bytes).into_response())
    }
    .await;

    let _ = tokio::fs::remove_file(&path).await;
    result
}
