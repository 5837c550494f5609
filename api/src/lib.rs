//! The HTTP intake API: translates external requests into new job
//! rows and staged files, and lets callers poll for status, results, and
//! rendered subtitles.

mod dto;
mod error;
mod routes;
mod state;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::delete;
use axum::routing::get;
use axum::routing::post;
use tower_http::trace::TraceLayer;

pub use error::ApiError;
pub use state::AppState;

/// Assembles the full router. `max_upload_bytes`
/// bounds the raw request body axum will buffer per multipart field, ahead
/// of the staging service's own size-cap enforcement.
pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/tasks", post(routes::create_task).get(routes::list_tasks))
        .route("/tasks/{id}", get(routes::get_task).delete(routes::delete_task))
        .route("/tasks/{id}/subtitle", get(routes::get_subtitle))
        .route("/audio/extract", post(routes::extract_audio_handler))
        .route("/platforms/{platform}/video_task", post(routes::video_task))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
