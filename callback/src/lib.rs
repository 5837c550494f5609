//! The callback dispatcher: retrying outbound HTTP notifier fed
//! by completed/failed jobs, with bounded concurrency and per-host caps.

mod dispatcher;
mod error;

pub use dispatcher::CallbackConfig;
pub use dispatcher::CallbackDispatcher;
pub use error::CallbackError;

#[cfg(test)]
mod tests {
    use super::*;
    use gateway_model::DecodeOptions;
    use gateway_model::JobSource;
    use gateway_model::JobSpec;
    use gateway_model::Priority;
    use gateway_model::TaskType;
    use gateway_model::TranscriptResult;
    use gateway_state::SqliteJobStore;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use std::time::Duration;
    use wiremock::Mock;
    use wiremock::MockServer;
    use wiremock::Request;
    use wiremock::Respond;
    use wiremock::ResponseTemplate;
    use wiremock::matchers::method;
    use wiremock::matchers::path;

    struct FlakyThenOk {
        remaining_failures: std::sync::atomic::AtomicU32,
    }

    impl Respond for FlakyThenOk {
        fn respond(&self, _request: &Request) -> ResponseTemplate {
            let remaining = self.remaining_failures.fetch_update(
                std::sync::atomic::Ordering::SeqCst,
                std::sync::atomic::Ordering::SeqCst,
                |value| if value > 0 { Some(value - 1) } else { None },
            );
            match remaining {
                Ok(_) => ResponseTemplate::new(503),
                Err(_) => ResponseTemplate::new(200),
            }
        }
    }

    fn fast_backoff() -> gateway_model::Backoff {
        gateway_model::Backoff::new(Duration::from_millis(5), 2.0, Duration::from_millis(50), 5)
    }

    #[tokio::test]
    async fn retries_503s_then_records_the_eventual_200() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .respond_with(FlakyThenOk {
                remaining_failures: std::sync::atomic::AtomicU32::new(2),
            })
            .mount(&server)
            .await;

        let store: Arc<dyn gateway_state::JobStore> = Arc::new(SqliteJobStore::in_memory().await.unwrap());
        let job = store
            .create(&JobSpec {
                priority: Priority::Normal,
                engine_name: "mock".into(),
                task_type: TaskType::Transcribe,
                source: JobSource::LocalPath { path: "/tmp/a.wav".into() },
                file_url: None,
                platform: None,
                decode_options: DecodeOptions::default(),
                callback_url: Some(format!("{}/hook", server.uri())),
            })
            .await
            .unwrap();
        store.claim_next("mock").await.unwrap();
        store
            .mark_completed(
                job.id,
                &TranscriptResult {
                    text: "hi".into(),
                    segments: vec![],
                    info: serde_json::json!({}),
                },
                Some("en"),
                1.0,
            )
            .await
            .unwrap();

        let dispatcher = CallbackDispatcher::spawn(
            store.clone(),
            reqwest::Client::new(),
            CallbackConfig {
                concurrency: 1,
                host_concurrency: 1,
                queue_capacity: 8,
                backoff: fast_backoff(),
            },
        );
        dispatcher
            .enqueue(job.id, format!("{}/hook", server.uri()))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(300)).await;
        let fetched = store.get(job.id).await.unwrap().unwrap();
        assert_eq!(fetched.callback_status_code, Some(200));
    }

    #[tokio::test]
    async fn a_4xx_response_stops_retrying_immediately() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let store: Arc<dyn gateway_state::JobStore> = Arc::new(SqliteJobStore::in_memory().await.unwrap());
        let job = store
            .create(&JobSpec {
                priority: Priority::Normal,
                engine_name: "mock".into(),
                task_type: TaskType::Transcribe,
                source: JobSource::LocalPath { path: "/tmp/a.wav".into() },
                file_url: None,
                platform: None,
                decode_options: DecodeOptions::default(),
                callback_url: Some(format!("{}/hook", server.uri())),
            })
            .await
            .unwrap();
        store.claim_next("mock").await.unwrap();
        store
            .mark_failed(job.id, "boom", 1.0)
            .await
            .unwrap();

        let dispatcher = CallbackDispatcher::spawn(
            store.clone(),
            reqwest::Client::new(),
            CallbackConfig {
                concurrency: 1,
                host_concurrency: 1,
                queue_capacity: 8,
                backoff: fast_backoff(),
            },
        );
        dispatcher
            .enqueue(job.id, format!("{}/hook", server.uri()))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(150)).await;
        let fetched = store.get(job.id).await.unwrap().unwrap();
        assert_eq!(fetched.callback_status_code, Some(404));
    }

    #[tokio::test]
    async fn recover_pending_reenqueues_terminal_jobs_missing_a_callback_outcome() {
        let store: Arc<dyn gateway_state::JobStore> = Arc::new(SqliteJobStore::in_memory().await.unwrap());
        let job = store
            .create(&JobSpec {
                priority: Priority::Normal,
                engine_name: "mock".into(),
                task_type: TaskType::Transcribe,
                source: JobSource::LocalPath { path: "/tmp/a.wav".into() },
                file_url: None,
                platform: None,
                decode_options: DecodeOptions::default(),
                callback_url: Some("https://example.com/hook".into()),
            })
            .await
            .unwrap();
        store.claim_next("mock").await.unwrap();
        store.mark_failed(job.id, "boom", 1.0).await.unwrap();

        let dispatcher = CallbackDispatcher::spawn(
            store.clone(),
            reqwest::Client::new(),
            CallbackConfig {
                concurrency: 0,
                host_concurrency: 1,
                queue_capacity: 8,
                backoff: fast_backoff(),
            },
        );
        let recovered = dispatcher.recover_pending(store.as_ref()).await.unwrap();
        assert_eq!(recovered, 1);
    }
}
