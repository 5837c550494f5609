use std::collections::HashMap;

use gateway_model::DeviceId;

/// Assigns devices to new workers round-robin across the configured GPU
/// device ids, respecting `max_instances_per_gpu`. With no GPU present, every worker is assigned the
/// CPU (`None`) and the caller is expected to cap total pool size at 1.
#[derive(Debug, Clone)]
pub struct DeviceAssigner {
    gpu_device_ids: Vec<u32>,
    max_instances_per_gpu: usize,
    counts: HashMap<u32, usize>,
    cursor: usize,
}

impl DeviceAssigner {
    pub fn new(gpu_device_ids: Vec<u32>, max_instances_per_gpu: usize) -> Self {
        Self {
            counts: gpu_device_ids.iter().map(|id| (*id, 0)).collect(),
            gpu_device_ids,
            max_instances_per_gpu: max_instances_per_gpu.max(1),
            cursor: 0,
        }
    }

    pub fn is_gpu_backed(&self) -> bool {
        !self.gpu_device_ids.is_empty()
    }

    /// The maximum number of workers this device configuration can host.
    pub fn capacity(&self) -> usize {
        if self.gpu_device_ids.is_empty() {
            1
        } else {
            self.gpu_device_ids.len() * self.max_instances_per_gpu
        }
    }

    /// Hands out the next device in round-robin order among devices that
    /// have not hit `max_instances_per_gpu`. `None` if every device (or the
    /// single CPU slot) is already saturated.
    pub fn assign(&mut self) -> Option<DeviceId> {
        if self.gpu_device_ids.is_empty() {
            return if *self.counts.entry(u32::MAX).or_insert(0) == 0 {
                *self.counts.get_mut(&u32::MAX).expect("just inserted") += 1;
                Some(None)
            } else {
                None
            };
        }
        for _ in 0..self.gpu_device_ids.len() {
            let device_id = self.gpu_device_ids[self.cursor % self.gpu_device_ids.len()];
            self.cursor = (self.cursor + 1) % self.gpu_device_ids.len();
            let count = self.counts.entry(device_id).or_insert(0);
            if *count < self.max_instances_per_gpu {
                *count += 1;
                return Some(Some(device_id));
            }
        }
        None
    }

    pub fn release(&mut self, device_id: DeviceId) {
        let key = device_id.unwrap_or(u32::MAX);
        if let Some(count) = self.counts.get_mut(&key) {
            *count = count.saturating_sub(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn round_robins_across_gpus_respecting_the_per_gpu_cap() {
        let mut assigner = DeviceAssigner::new(vec![0, 1], 2);
        assert_eq!(assigner.assign(), Some(Some(0)));
        assert_eq!(assigner.assign(), Some(Some(1)));
        assert_eq!(assigner.assign(), Some(Some(0)));
        assert_eq!(assigner.assign(), Some(Some(1)));
        assert_eq!(assigner.assign(), None);
    }

    #[test]
    fn falls_back_to_a_single_cpu_slot_when_no_gpu_present() {
        let mut assigner = DeviceAssigner::new(vec![], 8);
        assert_eq!(assigner.capacity(), 1);
        assert_eq!(assigner.assign(), Some(None));
        assert_eq!(assigner.assign(), None);
    }

    #[test]
    fn release_frees_a_slot_for_reassignment() {
        let mut assigner = DeviceAssigner::new(vec![0], 1);
        assert_eq!(assigner.assign(), Some(Some(0)));
        assert_eq!(assigner.assign(), None);
        assigner.release(Some(0));
        assert_eq!(assigner.assign(), Some(Some(0)));
    }
}
