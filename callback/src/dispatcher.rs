use std::collections::HashMap;
use std::sync::Arc;

use gateway_model::Backoff;
use gateway_model::JobId;
use gateway_state::JobStore;
use tokio::sync::Mutex;
use tokio::sync::Semaphore;
use tokio::sync::mpsc;
use tracing::info;
use tracing::warn;

use crate::CallbackError;

#[derive(Debug, Clone)]
pub struct CallbackConfig {
    /// Number of outbound worker tasks draining the queue concurrently.
    pub concurrency: usize,
    /// Max in-flight deliveries to any single host, independent of
    /// `concurrency`.
    pub host_concurrency: usize,
    pub queue_capacity: usize,
    pub backoff: Backoff,
}

impl Default for CallbackConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            host_concurrency: 2,
            queue_capacity: 1024,
            backoff: Backoff::callback_default(),
        }
    }
}

struct CallbackIntent {
    job_id: JobId,
    callback_url: String,
}

/// The retrying outbound callback dispatcher. Consumes a bounded
/// in-memory queue fed by the task processor; `concurrency` worker tasks
/// share the receiver behind a mutex (the multi-consumer pattern a
/// single-consumer `mpsc::Receiver` needs), each holding its own
/// `reqwest::Client` and respecting a per-host semaphore.
#[derive(Clone)]
pub struct CallbackDispatcher {
    tx: mpsc::Sender<CallbackIntent>,
}

impl CallbackDispatcher {
    /// Spawns `config.concurrency` worker tasks and returns a handle for
    /// enqueuing callback intents.
    pub fn spawn(store: Arc<dyn JobStore>, client: reqwest::Client, config: CallbackConfig) -> Self {
        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
        let rx = Arc::new(Mutex::new(rx));
        let host_semaphores: Arc<Mutex<HashMap<String, Arc<Semaphore>>>> = Arc::new(Mutex::new(HashMap::new()));

        for worker_index in 0..config.concurrency.max(1) {
            let rx = rx.clone();
            let store = store.clone();
            let client = client.clone();
            let config = config.clone();
            let host_semaphores = host_semaphores.clone();
            tokio::spawn(async move {
                worker_loop(worker_index, rx, store, client, config, host_semaphores).await;
            });
        }

        Self { tx }
    }

    /// Enqueues a completed/failed job for callback delivery. Callers must already have checked `Job::wants_callback`.
    pub async fn enqueue(&self, job_id: JobId, callback_url: String) -> Result<(), CallbackError> {
        self.tx
            .send(CallbackIntent { job_id, callback_url })
            .await
            .map_err(|_| CallbackError::Closed)
    }

    /// Re-derives the dispatcher's queue at startup by scanning terminal jobs
    /// with a callback still pending delivery.
    pub async fn recover_pending(&self, store: &dyn JobStore) -> Result<usize, CallbackError> {
        let pending = store.pending_callbacks().await?;
        let mut recovered = 0usize;
        for job in pending {
            let Some(callback_url) = job.callback_url.clone() else {
                continue;
            };
            if self.enqueue(job.id, callback_url).await.is_ok() {
                recovered += 1;
            }
        }
        info!(recovered, "recovered pending callbacks at startup");
        Ok(recovered)
    }
}

async fn host_semaphore(map: &Mutex<HashMap<String, Arc<Semaphore>>>, host: &str, permits: usize) -> Arc<Semaphore> {
    let mut guard = map.lock().await;
    guard
        .entry(host.to_owned())
        .or_insert_with(|| Arc::new(Semaphore::new(permits.max(1))))
        .clone()
}

async fn worker_loop(
    worker_index: usize,
    rx: Arc<Mutex<mpsc::Receiver<CallbackIntent>>>,
    store: Arc<dyn JobStore>,
    client: reqwest::Client,
    config: CallbackConfig,
    host_semaphores: Arc<Mutex<HashMap<String, Arc<Semaphore>>>>,
) {
    loop {
        let intent = {
            let mut rx = rx.lock().await;
            rx.recv().await
        };
        let Some(intent) = intent else {
            break;
        };
        deliver(worker_index, &intent, &store, &client, &config, &host_semaphores).await;
    }
}

async fn deliver(
    worker_index: usize,
    intent: &CallbackIntent,
    store: &Arc<dyn JobStore>,
    client: &reqwest::Client,
    config: &CallbackConfig,
    host_semaphores: &Mutex<HashMap<String, Arc<Semaphore>>>,
) {
    let job = match store.get(intent.job_id).await {
        Ok(Some(job)) => job,
        Ok(None) => {
            warn!(job_id = intent.job_id, "callback intent for a job that no longer exists");
            return;
        }
        Err(err) => {
            warn!(job_id = intent.job_id, error = %err, "could not load job for callback delivery");
            return;
        }
    };

    let host = url::Url::parse(&intent.callback_url)
        .ok()
        .and_then(|url| url.host_str().map(str::to_owned))
        .unwrap_or_else(|| intent.callback_url.clone());
    let semaphore = host_semaphore(host_semaphores, &host, config.host_concurrency).await;

    let mut attempt = 0u32;
    let outcome = loop {
        attempt += 1;
        let permit = semaphore.clone().acquire_owned().await.expect("host semaphore is never closed");
        let result = client
            .post(intent.callback_url.as_str())
            .json(&job)
            .send()
            .await;
        drop(permit);

        match result {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    break (Some(status.as_u16() as i32), "delivered".to_owned());
                }
                if status.is_client_error() {
                    break (Some(status.as_u16() as i32), format!("callback endpoint returned {status}"));
                }
                let message = format!("callback endpoint returned {status}");
                match config.backoff.delay_for_attempt(attempt) {
                    Some(delay) => {
                        warn!(worker_index, job_id = intent.job_id, attempt, %status, "retrying callback delivery");
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    None => break (Some(status.as_u16() as i32), message),
                }
            }
            Err(err) => match config.backoff.delay_for_attempt(attempt) {
                Some(delay) => {
                    warn!(worker_index, job_id = intent.job_id, attempt, error = %err, "retrying callback delivery");
                    tokio::time::sleep(delay).await;
                    continue;
                }
                // -1 marks a transport failure with no HTTP status.
                None => break (Some(-1), err.to_string()),
            },
        }
    };

    let (status_code, message) = outcome;
    if let Err(err) = store
        .record_callback(intent.job_id, status_code, &message, chrono::Utc::now())
        .await
    {
        warn!(job_id = intent.job_id, error = %err, "failed to record callback outcome");
    }
}
