//! Device memory statistics for capacity planning
//!
//! Inventories report a snapshot of free memory per compute device. Probing
//! uses `sysinfo` for host RAM and `nvidia-smi` for NVIDIA accelerators.
//!
//! A failed probe is reported as [`CapacityError::DeviceStatsUnavailable`];
//! the resolver treats that as a reason to fall back to unchecked defaults,
//! never as a fatal error.

use crate::error::{CapacityError, CapacityResult};
use serde::{Deserialize, Serialize};
use sysinfo::{MemoryRefreshKind, RefreshKind, System};

/// Kind of compute device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceKind {
    /// Host CPU and system RAM
    Host,
    /// Discrete accelerator with its own memory
    Accelerator,
}

impl std::fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceKind::Host => write!(f, "cpu"),
            DeviceKind::Accelerator => write!(f, "gpu"),
        }
    }
}

/// Read-only snapshot of one device's free memory at resolution time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceStat {
    pub kind: DeviceKind,
    /// Index of the device within its kind
    pub id: usize,
    /// Free memory in bytes, `None` when the device could not report it
    pub free_memory_bytes: Option<u64>,
}

impl DeviceStat {
    pub fn host(free_memory_bytes: u64) -> Self {
        Self {
            kind: DeviceKind::Host,
            id: 0,
            free_memory_bytes: Some(free_memory_bytes),
        }
    }

    pub fn accelerator(id: usize, free_memory_bytes: u64) -> Self {
        Self {
            kind: DeviceKind::Accelerator,
            id,
            free_memory_bytes: Some(free_memory_bytes),
        }
    }

    /// A device that exists but whose free memory is unknown
    pub fn unknown(kind: DeviceKind, id: usize) -> Self {
        Self {
            kind,
            id,
            free_memory_bytes: None,
        }
    }

    /// Display label, e.g. `gpu[1]`
    pub fn label(&self) -> String {
        format!("{}[{}]", self.kind, self.id)
    }
}

/// Source of device memory statistics.
///
/// Implementations must be safe to query from several resolutions at once;
/// the planner never mutates what they return.
pub trait DeviceInventory: Send + Sync {
    fn device_stats(&self) -> CapacityResult<Vec<DeviceStat>>;
}

/// Host RAM as a single device, read through `sysinfo`.
#[derive(Debug, Clone, Default)]
pub struct HostMemoryInventory;

impl DeviceInventory for HostMemoryInventory {
    fn device_stats(&self) -> CapacityResult<Vec<DeviceStat>> {
        let mut sys = System::new_with_specifics(
            RefreshKind::new().with_memory(MemoryRefreshKind::everything()),
        );
        sys.refresh_memory();
        let available = sys.available_memory();

        // sysinfo returns 0 on platforms where available memory cannot be
        // determined (e.g. macOS).
        if available == 0 {
            return Err(CapacityError::DeviceStatsUnavailable(
                "host did not report available memory".into(),
            ));
        }
        Ok(vec![DeviceStat::host(available)])
    }
}

/// NVIDIA GPUs, one device per line of `nvidia-smi` output.
#[derive(Debug, Clone, Default)]
pub struct NvidiaSmiInventory;

impl DeviceInventory for NvidiaSmiInventory {
    fn device_stats(&self) -> CapacityResult<Vec<DeviceStat>> {
        let output = std::process::Command::new("nvidia-smi")
            .args(["--query-gpu=memory.free", "--format=csv,noheader,nounits"])
            .output()
            .map_err(|e| CapacityError::DeviceStatsUnavailable(format!("nvidia-smi: {e}")))?;

        if !output.status.success() {
            return Err(CapacityError::DeviceStatsUnavailable(format!(
                "nvidia-smi exited with {}",
                output.status
            )));
        }

        parse_nvidia_smi_free(&String::from_utf8_lossy(&output.stdout))
    }
}

fn mib_to_bytes(mib: u64) -> u64 {
    mib.saturating_mul(1024 * 1024)
}

/// Parse `memory.free` lines (MiB) into accelerator stats.
///
/// Lines that do not parse (e.g. `[N/A]`) become devices with unknown memory.
fn parse_nvidia_smi_free(stdout: &str) -> CapacityResult<Vec<DeviceStat>> {
    let devices: Vec<DeviceStat> = stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .enumerate()
        .map(|(id, line)| match line.parse::<u64>() {
            Ok(mib) => DeviceStat::accelerator(id, mib_to_bytes(mib)),
            Err(_) => DeviceStat::unknown(DeviceKind::Accelerator, id),
        })
        .collect();

    if devices.is_empty() {
        return Err(CapacityError::DeviceStatsUnavailable(
            "nvidia-smi listed no GPUs".into(),
        ));
    }
    Ok(devices)
}

/// A fixed set of devices, for simulation and tests.
#[derive(Debug, Clone, Default)]
pub struct FixedInventory {
    devices: Vec<DeviceStat>,
}

impl FixedInventory {
    pub fn new(devices: Vec<DeviceStat>) -> Self {
        Self { devices }
    }

    /// One accelerator per entry, free memory given in MiB.
    pub fn from_free_mib(free_mib: &[u64]) -> Self {
        Self::new(
            free_mib
                .iter()
                .enumerate()
                .map(|(id, &mib)| DeviceStat::accelerator(id, mib_to_bytes(mib)))
                .collect(),
        )
    }
}

impl DeviceInventory for FixedInventory {
    fn device_stats(&self) -> CapacityResult<Vec<DeviceStat>> {
        Ok(self.devices.clone())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_label() {
        assert_eq!(DeviceStat::host(1).label(), "cpu[0]");
        assert_eq!(DeviceStat::accelerator(2, 1).label(), "gpu[2]");
    }

    #[test]
    fn test_parse_nvidia_smi_free() {
        let devices = parse_nvidia_smi_free("24000\n 8000 \n").expect("parse");
        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0].free_memory_bytes, Some(24000 * 1024 * 1024));
        assert_eq!(devices[1].id, 1);
    }

    #[test]
    fn test_parse_nvidia_smi_unreadable_line_is_unknown() {
        let devices = parse_nvidia_smi_free("[N/A]\n").expect("parse");
        assert_eq!(devices[0].free_memory_bytes, None);
    }

    #[test]
    fn test_parse_nvidia_smi_empty_is_unavailable() {
        let result = parse_nvidia_smi_free("\n");
        assert!(matches!(result, Err(CapacityError::DeviceStatsUnavailable(_))));
    }

    #[test]
    fn test_fixed_inventory_from_mib() {
        let stats = FixedInventory::from_free_mib(&[1024, 2048])
            .device_stats()
            .expect("fixed inventory never fails");
        assert_eq!(stats[1].free_memory_bytes, Some(2048 * 1024 * 1024));
        assert_eq!(stats[1].kind, DeviceKind::Accelerator);
    }

    #[test]
    fn test_huge_mib_values_saturate() {
        let stats = FixedInventory::from_free_mib(&[u64::MAX / 1024])
            .device_stats()
            .expect("fixed inventory never fails");
        assert_eq!(stats[0].free_memory_bytes, Some(u64::MAX));

        let devices = parse_nvidia_smi_free(&format!("{}\n", u64::MAX)).expect("parse");
        assert_eq!(devices[0].free_memory_bytes, Some(u64::MAX));
    }

    #[test]
    fn test_host_inventory_reports_or_degrades() {
        match HostMemoryInventory.device_stats() {
            Ok(stats) => {
                assert_eq!(stats.len(), 1);
                assert!(stats[0].free_memory_bytes.unwrap_or(0) > 0);
            }
            Err(e) => assert!(matches!(e, CapacityError::DeviceStatsUnavailable(_))),
        }
    }

    #[test]
    fn test_device_stat_serde_roundtrip() {
        let stat = DeviceStat::unknown(DeviceKind::Host, 0);
        let json = serde_json::to_string(&stat).expect("serialize");
        let back: DeviceStat = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(stat, back);
    }
}
