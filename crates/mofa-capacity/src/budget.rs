//! Memory budget estimation from device statistics.

use crate::error::{CapacityError, CapacityResult};
use crate::hardware::DeviceStat;

/// Share of free memory above which a fitting configuration is flagged.
pub const HIGH_WATER_MARK: f64 = 0.95;

/// Sum free memory across all devices.
///
/// Fails with [`CapacityError::DeviceStatsUnavailable`] when there are no
/// devices or any device cannot report its free memory.
pub fn total_free_memory(devices: &[DeviceStat]) -> CapacityResult<u64> {
    if devices.is_empty() {
        return Err(CapacityError::DeviceStatsUnavailable(
            "no devices to query".into(),
        ));
    }
    devices.iter().try_fold(0u64, |total, device| {
        device
            .free_memory_bytes
            .map(|free| total.saturating_add(free))
            .ok_or_else(|| {
                CapacityError::DeviceStatsUnavailable(format!(
                    "{} did not report free memory",
                    device.label()
                ))
            })
    })
}

/// Memory available to a pipeline once weights are placed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MemoryBudget {
    /// Free memory across all devices in bytes.
    free_memory_bytes: u64,
    /// Estimated weights size in bytes.
    weights_bytes: u64,
    /// Fraction of the remaining memory the cache may use.
    utilization: f64,
}

impl MemoryBudget {
    pub fn new(free_memory_bytes: u64, weights_bytes: u64, utilization: f64) -> Self {
        Self {
            free_memory_bytes,
            weights_bytes,
            utilization,
        }
    }

    pub fn free_memory_bytes(&self) -> u64 {
        self.free_memory_bytes
    }

    pub fn weights_bytes(&self) -> u64 {
        self.weights_bytes
    }

    /// Whether the weights alone exceed free memory.
    pub fn weights_exceed_free_memory(&self) -> bool {
        self.weights_bytes > self.free_memory_bytes
    }

    /// `floor(max(0, free - weights) * utilization)`
    pub fn available_cache_bytes(&self) -> u64 {
        let remaining = self.free_memory_bytes.saturating_sub(self.weights_bytes);
        (remaining as f64 * self.utilization).floor() as u64
    }

    /// Whether `weights + cache_bytes` fits in free memory.
    pub fn fits(&self, cache_bytes: u64) -> bool {
        self.weights_bytes.saturating_add(cache_bytes) <= self.free_memory_bytes
    }

    /// Whether a fitting total crosses [`HIGH_WATER_MARK`] of free memory.
    pub fn near_capacity(&self, total_bytes: u64) -> bool {
        total_bytes as f64 > HIGH_WATER_MARK * self.free_memory_bytes as f64
    }
}
