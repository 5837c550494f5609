use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::Request;
use axum::http::StatusCode;
use gateway_callback::CallbackConfig;
use gateway_callback::CallbackDispatcher;
use gateway_crawler::CrawlerRegistry;
use gateway_engine::MockAsrEngine;
use gateway_model::Backoff;
use gateway_pool::ModelPool;
use gateway_pool::PoolConfig;
use gateway_processor::ProcessorConfig;
use gateway_processor::TaskProcessor;
use gateway_staging::StagingConfig;
use gateway_staging::StagingService;
use gateway_state::JobStore;
use gateway_state::SqliteJobStore;
use http_body_util::BodyExt;
use tower::ServiceExt;

async fn test_app(dir: &std::path::Path) -> axum::Router {
    let store: Arc<dyn JobStore> = Arc::new(SqliteJobStore::in_memory().await.unwrap());
    let crawlers = CrawlerRegistry::new(vec![]);
    let staging = Arc::new(StagingService::new(
        StagingConfig {
            staging_dir: dir.to_path_buf(),
            max_file_size_bytes: 10_000_000,
            allowed_extensions: vec![],
            download_concurrency: 2,
            download_backoff: Backoff::new(Duration::from_millis(5), 2.0, Duration::from_millis(50), 2),
        },
        reqwest::Client::new(),
        crawlers.clone(),
    ));
    let pool = ModelPool::new(
        PoolConfig {
            min_size: 1,
            max_size: 1,
            max_instances_per_gpu: 1,
            engine_name: "mock".into(),
            init_with_max_pool_size: true,
            gpu_device_ids: vec![],
        },
        Arc::new(|_device_id| Arc::new(MockAsrEngine::default()) as Arc<dyn gateway_engine::AsrEngine>),
    );
    pool.initialize().await.unwrap();
    let callbacks = CallbackDispatcher::spawn(store.clone(), reqwest::Client::new(), CallbackConfig::default());
    let processor = TaskProcessor::new(
        ProcessorConfig {
            max_concurrent_tasks: 0,
            ..ProcessorConfig::default()
        },
        store.clone(),
        staging.clone(),
        pool,
        callbacks,
    );

    let state = gateway_api::AppState {
        store,
        staging,
        crawlers,
        processor,
        default_engine_name: "mock".into(),
        ffmpeg_program: "ffmpeg-not-used-in-these-tests".into(),
    };
    gateway_api::router(state, 10_000_000)
}

fn multipart_body(boundary: &str, fields: &[(&str, &str)]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        body.extend_from_slice(format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes());
        body.extend_from_slice(value.as_bytes());
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
    body
}

#[tokio::test]
async fn create_then_get_then_delete_then_404_on_second_delete() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(dir.path()).await;

    let boundary = "X-BOUNDARY-1";
    let body = multipart_body(
        boundary,
        &[("url", "https://example.com/clip.mp4"), ("task_type", "transcribe")],
    );
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/tasks")
                .header("content-type", format!("multipart/form-data; boundary={boundary}"))
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let created: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    let id = created["id"].as_i64().unwrap();
    assert_eq!(created["status"], "queued");
    assert!(created["result_poll_url"].as_str().unwrap().ends_with(&format!("/tasks/{id}")));

    let response = app
        .clone()
        .oneshot(Request::builder().uri(format!("/tasks/{id}")).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/tasks/{id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/tasks/{id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn create_without_file_or_url_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(dir.path()).await;

    let boundary = "X-BOUNDARY-2";
    let body = multipart_body(boundary, &[("task_type", "transcribe")]);
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/tasks")
                .header("content-type", format!("multipart/form-data; boundary={boundary}"))
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn subtitle_is_conflict_before_completion() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(dir.path()).await;

    let boundary = "X-BOUNDARY-3";
    let body = multipart_body(
        boundary,
        &[("url", "https://example.com/clip.mp4"), ("task_type", "transcribe")],
    );
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/tasks")
                .header("content-type", format!("multipart/form-data; boundary={boundary}"))
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let created: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    let id = created["id"].as_i64().unwrap();

    let response = app
        .oneshot(
            Request::builder()
                .uri(format!("/tasks/{id}/subtitle?format=srt"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn unsupported_platform_video_task_is_bad_gateway() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(dir.path()).await;

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/platforms/nonexistent/video_task")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"url":"https://example.com/v/1"}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}
