use std::time::SystemTime;

/// Opaque device identifier: `None` means CPU fallback.
pub type DeviceId = Option<u32>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Idle,
    Busy,
    Unhealthy,
}

/// The in-memory-only `Worker` entity: never persisted, owned
/// entirely by the model pool.
#[derive(Debug, Clone)]
pub struct Worker {
    pub worker_id: u64,
    pub device_id: DeviceId,
    pub engine_name: String,
    pub state: WorkerState,
    pub created_at: SystemTime,
}

impl Worker {
    pub fn new(worker_id: u64, device_id: DeviceId, engine_name: impl Into<String>) -> Self {
        Self {
            worker_id,
            device_id,
            engine_name: engine_name.into(),
            state: WorkerState::Idle,
            created_at: SystemTime::now(),
        }
    }
}
