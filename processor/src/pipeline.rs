use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use gateway_callback::CallbackDispatcher;
use gateway_engine::InferenceOutput;
use gateway_media::probe_duration;
use gateway_model::Job;
use gateway_model::JobId;
use gateway_model::JobPatch;
use gateway_model::JobSource;
use gateway_model::TranscriptResult;
use gateway_pool::ModelPool;
use gateway_staging::StagingService;
use gateway_state::JobStore;
use gateway_state::StoreError;
use rand::Rng;
use tokio::sync::Notify;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing::warn;

use crate::config::ProcessorConfig;
use crate::validate::validate_decode_options;

fn elapsed_secs(start: Instant) -> f64 {
    start.elapsed().as_secs_f64()
}

/// The task processor: claims queued jobs by priority and drives
/// each through the nine-step pipeline, orchestrating C2/C3/C5 along the
/// way. Construct once per process and [`TaskProcessor::spawn`] onto a
/// shared [`JoinSet`]; `Arc<Self>` is cheap to clone across claim-loop
/// tasks.
pub struct TaskProcessor {
    config: ProcessorConfig,
    store: Arc<dyn JobStore>,
    staging: Arc<StagingService>,
    pool: ModelPool,
    callbacks: CallbackDispatcher,
    new_job: Notify,
}

impl TaskProcessor {
    pub fn new(
        config: ProcessorConfig,
        store: Arc<dyn JobStore>,
        staging: Arc<StagingService>,
        pool: ModelPool,
        callbacks: CallbackDispatcher,
    ) -> Arc<Self> {
        Arc::new(Self {
            config,
            store,
            staging,
            pool,
            callbacks,
            new_job: Notify::new(),
        })
    }

    /// Wakes one idle claim loop early, raced against the poll interval.
    pub fn notify_new_job(&self) {
        self.new_job.notify_one();
    }

    /// Crash recovery: requeues `processing` rows whose
    /// `updated_at` predates the recovery threshold, i.e. rows abandoned by
    /// a crashed owner. Call once at startup before accepting traffic.
    pub async fn recover_orphans(&self) -> Result<Vec<JobId>, StoreError> {
        let reclaimed = self.store.reclaim_orphans(self.config.orphan_recovery_threshold).await?;
        if !reclaimed.is_empty() {
            info!(count = reclaimed.len(), ids = ?reclaimed, "reclaimed orphaned processing jobs at startup");
        }
        Ok(reclaimed)
    }

    /// Spawns `MAX_CONCURRENT_TASKS` independent claim loops onto `set`.
    /// Each loop runs until `shutdown` is
    /// cancelled, draining whatever pipeline it is mid-way through first.
    pub fn spawn(self: &Arc<Self>, set: &mut JoinSet<()>, shutdown: CancellationToken) {
        for slot in 0..self.config.max_concurrent_tasks.max(1) {
            let this = Arc::clone(self);
            let shutdown = shutdown.clone();
            set.spawn(async move { this.run_slot(slot, shutdown).await });
        }
    }

    async fn run_slot(&self, slot: usize, shutdown: CancellationToken) {
        loop {
            if shutdown.is_cancelled() {
                return;
            }
            match self.store.claim_next(&self.config.engine_name).await {
                Ok(Some(job)) => {
                    info!(slot, job_id = job.id, priority = job.priority.as_str(), "claimed job");
                    self.run_pipeline(job).await;
                }
                Ok(None) => self.wait_for_work(&shutdown).await,
                Err(err) => {
                    warn!(slot, error = %err, "claim_next failed, backing off");
                    self.wait_for_work(&shutdown).await;
                }
            }
        }
    }

    async fn wait_for_work(&self, shutdown: &CancellationToken) {
        let jitter_ms = self.config.poll_jitter.as_millis() as u64;
        let jitter = if jitter_ms == 0 {
            Duration::ZERO
        } else {
            Duration::from_millis(rand::thread_rng().gen_range(0..=jitter_ms))
        };
        let sleep = tokio::time::sleep(self.config.task_status_check_interval + jitter);
        tokio::select! {
            () = sleep => {}
            () = self.new_job.notified() => {}
            () = shutdown.cancelled() => {}
        }
    }

    /// Validates, stages, probes, infers, and persists a single claimed job. Never panics on a
    /// per-job failure: every error path records `failed` and still runs
    /// cleanup and callback enqueueing, so one bad job cannot wedge its
    /// slot.
    async fn run_pipeline(&self, job: Job) {
        let start = Instant::now();
        let mut staged_path: Option<String> = None;

        let outcome = self.run_pipeline_inner(&job, &mut staged_path, start).await;

        if let Some(path) = staged_path {
            self.staging.schedule_delete(path, self.config.staged_file_ttl);
        }

        if let Err(message) = outcome {
            warn!(job_id = job.id, error = %message, "job failed");
            if let Err(err) = self.store.mark_failed(job.id, &message, elapsed_secs(start)).await {
                warn!(job_id = job.id, error = %err, "failed to record job failure");
            }
        }

        if job.wants_callback() {
            if let Some(url) = job.callback_url.clone() {
                if let Err(err) = self.callbacks.enqueue(job.id, url).await {
                    warn!(job_id = job.id, error = %err, "failed to enqueue callback");
                }
            }
        }
    }

    async fn run_pipeline_inner(
        &self,
        job: &Job,
        staged_path: &mut Option<String>,
        start: Instant,
    ) -> Result<(), String> {
        validate_decode_options(&job.decode_options).map_err(|msg| format!("invalid decode options: {msg}"))?;

        let path = self.stage(job).await?;
        *staged_path = Some(path.clone());

        self.probe_and_record(job.id, &path).await?;

        let output = self.infer_with_retry(job, &path).await?;
        let result = TranscriptResult {
            text: output.text,
            segments: output.segments,
            info: output.info,
        };
        self.store
            .mark_completed(job.id, &result, Some(&output.language), elapsed_secs(start))
            .await
            .map_err(|err| err.to_string())
    }

    /// Uploads are already staged by intake (C6); a
    /// `RemoteUrl` source is staged here via C2, which resolves the
    /// platform crawler internally when `job.platform` names one.
    async fn stage(&self, job: &Job) -> Result<String, String> {
        match &job.source {
            JobSource::LocalPath { path } => Ok(path.clone()),
            JobSource::RemoteUrl { url } => self
                .staging
                .stage_url(url, job.platform.as_deref())
                .await
                .map_err(|err| err.to_string()),
        }
    }

    /// Probes duration and stamps `file_name`,
    /// `file_size_bytes`, `file_duration_seconds` onto the job.
    async fn probe_and_record(&self, job_id: JobId, path: &str) -> Result<(), String> {
        let duration = probe_duration(path, &self.config.ffprobe_program)
            .await
            .map_err(|err| err.to_string())?;
        let metadata = tokio::fs::metadata(path).await.map_err(|err| err.to_string())?;
        let file_name = Path::new(path).file_name().map(|name| name.to_string_lossy().into_owned());
        let patch = JobPatch {
            file_name,
            file_size_bytes: Some(metadata.len() as i64),
            file_duration_seconds: Some(duration),
            language: None,
        };
        self.store.update(job_id, &patch).await.map_err(|err| err.to_string())
    }

    /// Checks out a worker, runs inference under the
    /// pipeline deadline, and retries exactly once on a fresh
    /// worker for a transient device error.
    async fn infer_with_retry(&self, job: &Job, path: &str) -> Result<InferenceOutput, String> {
        let mut retried = false;
        loop {
            let guard = self.pool.checkout().await;
            let infer_fut = guard.engine().infer(Path::new(path), &job.decode_options);
            let outcome = match self.config.pipeline_deadline {
                Some(deadline) => tokio::time::timeout(deadline, infer_fut).await,
                None => Ok(infer_fut.await),
            };
            match outcome {
                Err(_) => {
                    guard.checkin().await;
                    let deadline = self.config.pipeline_deadline.expect("timeout only fires with a deadline set");
                    return Err(format!("pipeline deadline of {deadline:?} exceeded"));
                }
                Ok(Ok(output)) => {
                    guard.checkin().await;
                    return Ok(output);
                }
                Ok(Err(err)) if err.is_transient() && !retried => {
                    retried = true;
                    warn!(job_id = job.id, error = %err, "discarding worker after transient inference error, retrying once");
                    guard.discard().await;
                }
                Ok(Err(err)) => {
                    guard.checkin().await;
                    return Err(err.to_string());
                }
            }
        }
    }
}
