use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    pub max_concurrent_tasks: usize,
    pub task_status_check_interval: Duration,
    pub engine_name: String,
    /// Overall per-pipeline deadline;
    /// `None` means no deadline, the default.
    pub pipeline_deadline: Option<Duration>,
    /// How long a `processing` row may go unclaimed-looking before it is
    /// considered orphaned at startup.
    pub orphan_recovery_threshold: Duration,
    /// Upper bound on the jitter added to each empty-queue poll sleep, so
    /// many idle claim loops don't all wake in lockstep.
    pub poll_jitter: Duration,
    pub ffprobe_program: String,
    /// Delay between a job leaving `processing` and its staged file being
    /// deleted.
    pub staged_file_ttl: Duration,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_tasks: 4,
            task_status_check_interval: Duration::from_secs(2),
            engine_name: "whisper-large".to_owned(),
            pipeline_deadline: None,
            orphan_recovery_threshold: Duration::from_secs(300),
            poll_jitter: Duration::from_millis(250),
            ffprobe_program: "ffprobe".to_owned(),
            staged_file_ttl: Duration::from_secs(5),
        }
    }
}
