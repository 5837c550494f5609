mod config;

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use config::Config;
use gateway_api::AppState;
use gateway_callback::CallbackConfig;
use gateway_callback::CallbackDispatcher;
use gateway_crawler::CrawlerRegistry;
use gateway_engine::MockAsrEngine;
use gateway_model::Backoff;
use gateway_model::JobFilter;
use gateway_model::JobSource;
use gateway_model::JobStatus;
use gateway_pool::ModelPool;
use gateway_pool::PoolConfig;
use gateway_processor::ProcessorConfig;
use gateway_processor::TaskProcessor;
use gateway_staging::StagingConfig;
use gateway_staging::StagingService;
use gateway_staging::reconcile_orphans;
use gateway_state::JobStore;
use gateway_state::PostgresJobStore;
use gateway_state::SqliteJobStore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Opens the job store named by `database_url`'s scheme.
async fn connect_store(database_url: &str) -> anyhow::Result<Arc<dyn JobStore>> {
    if let Some(path) = database_url.strip_prefix("sqlite://") {
        let store = SqliteJobStore::connect(path).await.context("connecting to sqlite store")?;
        Ok(Arc::new(store))
    } else if database_url.starts_with("postgres://") || database_url.starts_with("postgresql://") {
        let store = PostgresJobStore::connect(database_url).await.context("connecting to postgres store")?;
        Ok(Arc::new(store))
    } else {
        anyhow::bail!("unsupported DATABASE_URL scheme: {database_url}");
    }
}

/// Sweeps the staging directory at startup, deleting any file not claimed by
/// a still-queued or still-processing job's local path. This is the
/// restart-safe backstop for staged files whose cleanup timer never fired
/// because the process died first.
async fn reconcile_staging_dir(
    store: &dyn JobStore,
    staging_dir: &str,
    grace_period: std::time::Duration,
) -> anyhow::Result<()> {
    let mut active_paths = std::collections::HashSet::new();
    for status in [JobStatus::Queued, JobStatus::Processing] {
        let jobs = store
            .query(&JobFilter { status: Some(status), ..Default::default() })
            .await
            .context("listing active jobs for staging reconciliation")?;
        for job in jobs {
            if let JobSource::LocalPath { path } = job.source {
                active_paths.insert(std::path::PathBuf::from(path));
            }
        }
    }
    let deleted = reconcile_orphans(std::path::Path::new(staging_dir), &active_paths, grace_period)
        .await
        .context("reconciling staging directory at startup")?;
    if !deleted.is_empty() {
        info!(count = deleted.len(), "deleted orphaned staged files at startup");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::parse();
    tokio::fs::create_dir_all(&config.staging_dir).await.context("creating staging directory")?;

    let store = connect_store(&config.database_url).await?;
    let http_client = reqwest::Client::new();
    let crawlers = CrawlerRegistry::with_defaults(http_client.clone());

    let staging = Arc::new(StagingService::new(
        StagingConfig {
            staging_dir: config.staging_dir.clone().into(),
            max_file_size_bytes: config.max_upload_bytes,
            allowed_extensions: config.allowed_extensions(),
            download_concurrency: config.pool_max_size.max(1),
            download_backoff: Backoff::new(
                std::time::Duration::from_millis(500),
                2.0,
                std::time::Duration::from_secs(30),
                5,
            ),
        },
        http_client.clone(),
        crawlers.clone(),
    ));

    // No production ASR model ships with this crate: `MockAsrEngine` stands
    // in for whatever inference backend a deployment would load here. Swap
    // this factory for a real adapter behind `gateway_engine::AsrEngine`.
    let engine_name = config.engine_name.clone();
    let pool = ModelPool::new(
        PoolConfig {
            min_size: config.pool_min_size,
            max_size: config.pool_max_size,
            max_instances_per_gpu: config.max_instances_per_gpu,
            engine_name: engine_name.clone(),
            init_with_max_pool_size: true,
            gpu_device_ids: config.gpu_device_ids(),
        },
        Arc::new(move |_device_id| Arc::new(MockAsrEngine::default()) as Arc<dyn gateway_engine::AsrEngine>),
    );
    pool.initialize().await.context("initializing model pool")?;

    let callbacks = CallbackDispatcher::spawn(
        store.clone(),
        http_client.clone(),
        CallbackConfig {
            concurrency: config.callback_concurrency,
            host_concurrency: 2,
            queue_capacity: 1024,
            backoff: Backoff::new(
                std::time::Duration::from_secs(1),
                2.0,
                std::time::Duration::from_secs(60),
                config.callback_max_attempts,
            ),
        },
    );

    let processor = TaskProcessor::new(
        ProcessorConfig {
            max_concurrent_tasks: config.max_concurrent_tasks,
            task_status_check_interval: config.task_status_check_interval(),
            engine_name,
            pipeline_deadline: None,
            orphan_recovery_threshold: config.orphan_recovery_threshold(),
            poll_jitter: std::time::Duration::from_millis(250),
            ffprobe_program: "ffprobe".to_owned(),
            staged_file_ttl: std::time::Duration::from_secs(5),
        },
        store.clone(),
        staging.clone(),
        pool,
        callbacks.clone(),
    );

    processor.recover_orphans().await.context("reclaiming orphaned jobs at startup")?;
    callbacks.recover_pending(store.as_ref()).await.context("recovering pending callbacks at startup")?;

    reconcile_staging_dir(store.as_ref(), &config.staging_dir, config.staging_reconcile_grace()).await?;

    let app_state = AppState {
        store: store.clone(),
        staging,
        crawlers,
        processor: processor.clone(),
        default_engine_name: config.engine_name.clone(),
        ffmpeg_program: "ffmpeg".to_owned(),
    };
    let router = gateway_api::router(app_state, config.max_upload_bytes as usize);

    let shutdown = CancellationToken::new();
    let mut tasks = JoinSet::new();
    processor.spawn(&mut tasks, shutdown.clone());

    let listener = tokio::net::TcpListener::bind(&config.http_bind_addr)
        .await
        .with_context(|| format!("binding {}", config.http_bind_addr))?;
    info!(addr = %config.http_bind_addr, "asr-gatewayd listening");

    let serve_shutdown = shutdown.clone();
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received, draining in-flight tasks");
            serve_shutdown.cancel();
        })
        .await
        .context("serving http")?;

    let grace = config.shutdown_grace();
    if tokio::time::timeout(grace, async { while tasks.join_next().await.is_some() {} })
        .await
        .is_err()
    {
        tracing::warn!(?grace, "shutdown grace period elapsed with tasks still in flight");
    }

    Ok(())
}
