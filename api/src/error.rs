use axum::Json;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use serde::Serialize;
use thiserror::Error;

/// The HTTP-facing error taxonomy for the intake API:
/// validation failures never create a job row, and a crawler failure at
/// intake maps to 502 rather than a job-level failure.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("job {0} not found")]
    NotFound(i64),

    #[error("{0}")]
    Conflict(String),

    #[error("upstream platform resolution failed: {0}")]
    BadGateway(String),

    #[error(transparent)]
    Store(#[from] gateway_state::StoreError),

    #[error(transparent)]
    Staging(#[from] gateway_staging::StagingError),

    #[error(transparent)]
    Media(#[from] gateway_media::MediaError),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::BadGateway(_) => StatusCode::BAD_GATEWAY,
            ApiError::Staging(err) if matches!(err, gateway_staging::StagingError::TooLarge { .. }) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Staging(err) if matches!(err, gateway_staging::StagingError::DisallowedExtension(_)) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Staging(_) => StatusCode::BAD_GATEWAY,
            ApiError::Media(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = Json(ErrorBody { error: self.to_string() });
        (status, body).into_response()
    }
}
