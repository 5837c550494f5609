use std::time::Duration;

use clap::Parser;

/// Process configuration, parsed from
/// environment variables with `clap`'s `env` feature so the same struct
/// doubles as `--help` documentation.
#[derive(Debug, Parser)]
pub struct Config {
    /// `sqlite://path/to/file.db` or `postgres://...`.
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite://asr-gateway.db")]
    pub database_url: String,

    #[arg(long, env = "STAGING_DIR", default_value = "./staging")]
    pub staging_dir: String,

    #[arg(long, env = "MAX_UPLOAD_BYTES", default_value_t = 2_000_000_000)]
    pub max_upload_bytes: u64,

    /// Comma-separated, e.g. `mp3,wav,mp4,m4a`. Empty means any extension.
    #[arg(long, env = "ALLOWED_EXTENSIONS", default_value = "")]
    pub allowed_extensions: String,

    #[arg(long, env = "POOL_MIN_SIZE", default_value_t = 1)]
    pub pool_min_size: usize,

    #[arg(long, env = "POOL_MAX_SIZE", default_value_t = 1)]
    pub pool_max_size: usize,

    #[arg(long, env = "MAX_INSTANCES_PER_GPU", default_value_t = 1)]
    pub max_instances_per_gpu: usize,

    /// Comma-separated GPU device ids, e.g. `0,1`. Empty means CPU-only.
    #[arg(long, env = "GPU_DEVICE_IDS", default_value = "")]
    pub gpu_device_ids: String,

    #[arg(long, env = "ENGINE_NAME", default_value = "whisper-large")]
    pub engine_name: String,

    #[arg(long, env = "MAX_CONCURRENT_TASKS", default_value_t = 4)]
    pub max_concurrent_tasks: usize,

    #[arg(long, env = "TASK_STATUS_CHECK_INTERVAL_MS", default_value_t = 2000)]
    pub task_status_check_interval_ms: u64,

    #[arg(long, env = "CALLBACK_MAX_ATTEMPTS", default_value_t = 5)]
    pub callback_max_attempts: u32,

    #[arg(long, env = "CALLBACK_CONCURRENCY", default_value_t = 4)]
    pub callback_concurrency: usize,

    #[arg(long, env = "HTTP_BIND_ADDR", default_value = "0.0.0.0:8080")]
    pub http_bind_addr: String,

    /// Read by `tracing_subscriber::EnvFilter`, not consulted directly.
    #[arg(long, env = "RUST_LOG", default_value = "info")]
    pub rust_log: String,

    #[arg(long, env = "ORPHAN_RECOVERY_THRESHOLD_SECS", default_value_t = 300)]
    pub orphan_recovery_threshold_secs: u64,

    /// How old an unreferenced staged file must be before startup
    /// reconciliation deletes it.
    #[arg(long, env = "STAGING_RECONCILE_GRACE_SECS", default_value_t = 3600)]
    pub staging_reconcile_grace_secs: u64,

    #[arg(long, env = "SHUTDOWN_GRACE_SECS", default_value_t = 30)]
    pub shutdown_grace_secs: u64,
}

impl Config {
    pub fn allowed_extensions(&self) -> Vec<String> {
        self.allowed_extensions
            .split(',')
            .map(str::trim)
            .filter(|ext| !ext.is_empty())
            .map(str::to_ascii_lowercase)
            .collect()
    }

    pub fn gpu_device_ids(&self) -> Vec<u32> {
        self.gpu_device_ids
            .split(',')
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .filter_map(|id| id.parse().ok())
            .collect()
    }

    pub fn task_status_check_interval(&self) -> Duration {
        Duration::from_millis(self.task_status_check_interval_ms)
    }

    pub fn orphan_recovery_threshold(&self) -> Duration {
        Duration::from_secs(self.orphan_recovery_threshold_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }

    pub fn staging_reconcile_grace(&self) -> Duration {
        Duration::from_secs(self.staging_reconcile_grace_secs)
    }
}
