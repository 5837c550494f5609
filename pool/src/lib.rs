//! The bounded async model pool: owns the scarce, expensive ASR
//! worker instances and hands them out with strict fairness and safety.
//! Mirrors the pack's semaphore + condvar + RAII-guard worker-pool pattern,
//! adapted from `std::sync::{Mutex, Condvar}` to `tokio::sync::Mutex` +
//! `tokio::sync::oneshot` so `checkout` is a suspension point rather than a
//! blocking one.

mod device;
mod error;

pub use device::DeviceAssigner;
pub use error::PoolError;

use std::collections::VecDeque;
use std::sync::Arc;

use gateway_engine::AsrEngine;
use gateway_model::DeviceId;
use gateway_model::Worker;
use gateway_model::WorkerState;
use tokio::sync::Mutex;
use tokio::sync::oneshot;
use tracing::info;
use tracing::warn;

/// Constructs a fresh engine instance bound to `device_id`. Kept generic over
/// the engine so tests can supply `MockAsrEngine` while production wiring
/// supplies a real model loader.
pub type EngineFactory = Arc<dyn Fn(DeviceId) -> Arc<dyn AsrEngine> + Send + Sync>;

#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub min_size: usize,
    pub max_size: usize,
    pub max_instances_per_gpu: usize,
    pub engine_name: String,
    pub init_with_max_pool_size: bool,
    /// Empty means no GPU present: the pool falls back to a single CPU
    /// instance regardless of `max_size`.
    pub gpu_device_ids: Vec<u32>,
}

struct PoolEntry {
    worker: Worker,
    engine: Arc<dyn AsrEngine>,
}

#[derive(Debug, Clone, Copy)]
pub struct PoolStats {
    pub busy: usize,
    pub idle: usize,
    pub total: usize,
    pub target_size: usize,
}

struct State {
    idle: VecDeque<PoolEntry>,
    busy: usize,
    total: usize,
    /// The pool's current desired size; `resize` mutates this and shrinking
    /// drains toward it as workers check in.
    target_size: usize,
    waiters: VecDeque<oneshot::Sender<PoolEntry>>,
    devices: DeviceAssigner,
    next_worker_id: u64,
}

struct Inner {
    config: PoolConfig,
    factory: EngineFactory,
    state: Mutex<State>,
}

fn spawn_worker_locked(inner: &Inner, state: &mut State) -> Option<PoolEntry> {
    let device_id = state.devices.assign()?;
    let worker_id = state.next_worker_id;
    state.next_worker_id += 1;
    let engine = (inner.factory)(device_id);
    let worker = Worker::new(worker_id, device_id, inner.config.engine_name.clone());
    state.total += 1;
    info!(worker_id, ?device_id, "model pool created worker");
    Some(PoolEntry { worker, engine })
}

/// The bounded model pool. Cheap to clone: internally an `Arc`,
/// so callers hold a `ModelPool` value directly rather than wrapping it in
/// their own `Arc`.
#[derive(Clone)]
pub struct ModelPool {
    inner: Arc<Inner>,
}

impl ModelPool {
    pub fn new(config: PoolConfig, factory: EngineFactory) -> Self {
        let devices = DeviceAssigner::new(config.gpu_device_ids.clone(), config.max_instances_per_gpu);
        let target_size = if devices.is_gpu_backed() {
            config.max_size.min(devices.capacity())
        } else {
            1
        };
        let state = State {
            idle: VecDeque::new(),
            busy: 0,
            total: 0,
            target_size,
            waiters: VecDeque::new(),
            devices,
            next_worker_id: 0,
        };
        Self {
            inner: Arc::new(Inner {
                config,
                factory,
                state: Mutex::new(state),
            }),
        }
    }

    /// Eagerly allocates workers up to `max_size` (if
    /// `init_with_max_pool_size`) or `min_size` otherwise, sequentially so
    /// device allocator state stays deterministic.
    pub async fn initialize(&self) -> Result<(), PoolError> {
        let mut state = self.inner.state.lock().await;
        let eager_count = if self.inner.config.init_with_max_pool_size {
            state.target_size
        } else {
            self.inner.config.min_size.min(state.target_size)
        };
        while state.total < eager_count {
            match spawn_worker_locked(&self.inner, &mut state) {
                Some(entry) => state.idle.push_back(entry),
                None => break,
            }
        }
        Ok(())
    }

    async fn acquire_entry(&self) -> PoolEntry {
        let mut state = self.inner.state.lock().await;
        if let Some(entry) = state.idle.pop_front() {
            state.busy += 1;
            return entry;
        }
        if state.total < state.target_size {
            if let Some(entry) = spawn_worker_locked(&self.inner, &mut state) {
                state.busy += 1;
                return entry;
            }
        }
        let (tx, rx) = oneshot::channel();
        state.waiters.push_back(tx);
        drop(state);
        rx.await.expect("model pool dropped before fulfilling a waiting checkout")
    }

    /// Blocks the caller (as a suspension point, not an OS thread block)
    /// until a healthy worker is available, running `health_check` before
    /// handing it out.
    pub async fn checkout(&self) -> PoolGuard {
        loop {
            let mut entry = self.acquire_entry().await;
            entry.worker.state = WorkerState::Busy;
            if entry.engine.health_check().await {
                return PoolGuard {
                    entry: Some(entry),
                    pool: self.clone(),
                };
            }
            warn!(worker_id = entry.worker.worker_id, "discarding unhealthy worker before handing out");
            self.discard_entry(entry).await;
        }
    }

    async fn checkin_entry(&self, mut entry: PoolEntry) {
        entry.worker.state = WorkerState::Idle;
        let mut state = self.inner.state.lock().await;
        if state.total > state.target_size {
            state.devices.release(entry.worker.device_id);
            state.total -= 1;
            state.busy -= 1;
            return;
        }
        if let Some(waiter) = state.waiters.pop_front() {
            // Ownership passes directly to the next waiter without ever
            // going idle; `busy` is unaffected.
            entry.worker.state = WorkerState::Busy;
            let _ = waiter.send(entry);
        } else {
            state.busy -= 1;
            state.idle.push_back(entry);
        }
    }

    /// Destroys `entry` and, if the pool has dropped below `min_size`,
    /// replaces it with a freshly created worker.
    async fn discard_entry(&self, entry: PoolEntry) {
        let worker_id = entry.worker.worker_id;
        let mut state = self.inner.state.lock().await;
        state.devices.release(entry.worker.device_id);
        state.total -= 1;
        state.busy -= 1;
        info!(worker_id, "model pool discarded worker");
        if state.total < self.inner.config.min_size {
            if let Some(mut replacement) = spawn_worker_locked(&self.inner, &mut state) {
                if let Some(waiter) = state.waiters.pop_front() {
                    replacement.worker.state = WorkerState::Busy;
                    state.busy += 1;
                    let _ = waiter.send(replacement);
                } else {
                    state.idle.push_back(replacement);
                }
            }
        }
    }

    /// Monotonically grows (creating workers up to device caps) or shrinks
    /// (draining idle workers first, then waiting for busy workers to check
    /// in) the pool's target size. Rejects shrinking below `min_size`.
    pub async fn resize(&self, new_max: usize) -> Result<(), PoolError> {
        if new_max < self.inner.config.min_size {
            return Err(PoolError::BelowMinSize {
                min_size: self.inner.config.min_size,
            });
        }
        let mut state = self.inner.state.lock().await;
        let capacity = if state.devices.is_gpu_backed() {
            state.devices.capacity()
        } else {
            1
        };
        let effective = new_max.min(capacity);
        state.target_size = effective;

        while state.total < effective {
            match spawn_worker_locked(&self.inner, &mut state) {
                Some(mut entry) => {
                    if let Some(waiter) = state.waiters.pop_front() {
                        entry.worker.state = WorkerState::Busy;
                        state.busy += 1;
                        let _ = waiter.send(entry);
                    } else {
                        state.idle.push_back(entry);
                    }
                }
                None => break,
            }
        }
        while state.total > effective {
            match state.idle.pop_front() {
                Some(entry) => {
                    state.devices.release(entry.worker.device_id);
                    state.total -= 1;
                }
                // Remaining excess is busy; `checkin_entry` destroys it
                // instead of re-idling once it is returned.
                None => break,
            }
        }
        Ok(())
    }

    pub async fn stats(&self) -> PoolStats {
        let state = self.inner.state.lock().await;
        PoolStats {
            busy: state.busy,
            idle: state.idle.len(),
            total: state.total,
            target_size: state.target_size,
        }
    }
}

/// A scoped loan of a [`Worker`] and its engine. On an ordinary scope exit (including panics) the loan is
/// returned to the pool via `checkin`; callers that observed the worker in a
/// bad state call [`PoolGuard::discard`] explicitly instead.
pub struct PoolGuard {
    entry: Option<PoolEntry>,
    pool: ModelPool,
}

impl PoolGuard {
    pub fn worker(&self) -> &Worker {
        &self
            .entry
            .as_ref()
            .expect("guard entry present until checkin/discard consumes it")
            .worker
    }

    pub fn engine(&self) -> &dyn AsrEngine {
        self.entry
            .as_ref()
            .expect("guard entry present until checkin/discard consumes it")
            .engine
            .as_ref()
    }

    pub async fn checkin(mut self) {
        if let Some(entry) = self.entry.take() {
            self.pool.checkin_entry(entry).await;
        }
    }

    pub async fn discard(mut self) {
        if let Some(entry) = self.entry.take() {
            self.pool.discard_entry(entry).await;
        }
    }
}

impl Drop for PoolGuard {
    fn drop(&mut self) {
        if let Some(entry) = self.entry.take() {
            let pool = self.pool.clone();
            tokio::spawn(async move { pool.checkin_entry(entry).await });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gateway_engine::MockAsrEngine;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    fn mock_factory() -> EngineFactory {
        Arc::new(|_device_id: DeviceId| Arc::new(MockAsrEngine::default()) as Arc<dyn AsrEngine>)
    }

    fn cpu_config(min_size: usize, max_size: usize) -> PoolConfig {
        PoolConfig {
            min_size,
            max_size,
            max_instances_per_gpu: 1,
            engine_name: "mock".into(),
            init_with_max_pool_size: false,
            gpu_device_ids: vec![],
        }
    }

    #[tokio::test]
    async fn cpu_fallback_caps_pool_at_one_instance_regardless_of_max_size() {
        let pool = ModelPool::new(cpu_config(1, 8), mock_factory());
        pool.initialize().await.unwrap();
        let stats = pool.stats().await;
        assert_eq!(stats.target_size, 1);
    }

    #[tokio::test]
    async fn checkout_blocks_until_checkin_frees_a_worker() {
        let pool = ModelPool::new(cpu_config(1, 1), mock_factory());
        pool.initialize().await.unwrap();

        let first = pool.checkout().await;
        let pool2 = pool.clone();
        let waiter = tokio::spawn(async move { pool2.checkout().await });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        first.checkin().await;
        let second = waiter.await.unwrap();
        assert_eq!(second.worker().worker_id, 0);
    }

    #[tokio::test]
    async fn no_worker_is_ever_issued_twice_without_an_intervening_checkin() {
        let pool = ModelPool::new(
            PoolConfig {
                gpu_device_ids: vec![0, 1],
                max_instances_per_gpu: 1,
                ..cpu_config(2, 2)
            },
            mock_factory(),
        );
        pool.initialize().await.unwrap();
        let a = pool.checkout().await;
        let b = pool.checkout().await;
        assert_ne!(a.worker().worker_id, b.worker().worker_id);
        let stats = pool.stats().await;
        assert_eq!(stats.busy, 2);
        assert_eq!(stats.idle, 0);
    }

    #[tokio::test]
    async fn discard_below_min_size_replaces_the_worker() {
        let pool = ModelPool::new(
            PoolConfig {
                gpu_device_ids: vec![0],
                max_instances_per_gpu: 1,
                ..cpu_config(1, 1)
            },
            mock_factory(),
        );
        pool.initialize().await.unwrap();
        let guard = pool.checkout().await;
        guard.discard().await;
        let stats = pool.stats().await;
        assert_eq!(stats.total, 1);
        assert_eq!(stats.idle, 1);
    }

    #[tokio::test]
    async fn resize_rejects_shrinking_below_min_size() {
        let pool = ModelPool::new(
            PoolConfig {
                gpu_device_ids: vec![0, 1, 2],
                max_instances_per_gpu: 1,
                ..cpu_config(2, 3)
            },
            mock_factory(),
        );
        pool.initialize().await.unwrap();
        let err = pool.resize(1).await.unwrap_err();
        assert!(matches!(err, PoolError::BelowMinSize { min_size: 2 }));
    }

    #[tokio::test]
    async fn resize_grows_pool_up_to_device_capacity() {
        let pool = ModelPool::new(
            PoolConfig {
                gpu_device_ids: vec![0, 1],
                max_instances_per_gpu: 1,
                ..cpu_config(1, 1)
            },
            mock_factory(),
        );
        pool.initialize().await.unwrap();
        pool.resize(2).await.unwrap();
        let stats = pool.stats().await;
        assert_eq!(stats.target_size, 2);
        assert_eq!(stats.total, 2);
    }

    #[tokio::test]
    async fn drop_without_explicit_checkin_still_returns_the_worker() {
        let pool = ModelPool::new(cpu_config(1, 1), mock_factory());
        pool.initialize().await.unwrap();
        {
            let _guard = pool.checkout().await;
        }
        // Drop spawns a best-effort checkin task; give it a tick to land.
        tokio::time::sleep(Duration::from_millis(20)).await;
        let stats = pool.stats().await;
        assert_eq!(stats.idle, 1);
        assert_eq!(stats.busy, 0);
    }
}
