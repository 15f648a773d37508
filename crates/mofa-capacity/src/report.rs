//! Memory summary and non-fatal resolution warnings

use crate::encoding::CacheStrategy;
use serde::{Deserialize, Serialize};

/// Round a byte count to whole MiB for display.
pub fn to_mib(bytes: u64) -> u64 {
    (bytes as f64 / (1024.0 * 1024.0)).round() as u64
}

pub(crate) fn mib(bytes: &u64) -> u64 {
    to_mib(*bytes)
}

/// Estimated footprint of a resolved configuration.
///
/// All sizes are bytes; [`std::fmt::Display`] renders them in MiB.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryReport {
    pub weights_bytes: u64,
    pub cache_bytes: u64,
    pub total_bytes: u64,
    pub free_memory_bytes: u64,
    pub max_length: usize,
    pub max_batch_size: usize,
    /// `true` when max length was chosen by the planner rather than pinned
    pub max_length_inferred: bool,
    /// `true` when batch size was chosen by the planner rather than pinned
    pub max_batch_size_inferred: bool,
}

impl MemoryReport {
    /// Fraction of free memory the configuration would use.
    pub fn utilization(&self) -> f64 {
        if self.free_memory_bytes == 0 {
            return 0.0;
        }
        self.total_bytes as f64 / self.free_memory_bytes as f64
    }
}

impl std::fmt::Display for MemoryReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Estimated memory consumption:")?;
        if self.weights_bytes > 0 {
            writeln!(f, "    Weights:                {} MiB", to_mib(self.weights_bytes))?;
        }
        writeln!(f, "    KVCache allocation:     {} MiB", to_mib(self.cache_bytes))?;
        write!(f, "    Total estimated:        {} MiB used", to_mib(self.total_bytes))?;
        if self.free_memory_bytes > 0 {
            write!(f, " / {} MiB free", to_mib(self.free_memory_bytes))?;
        }
        writeln!(f)?;
        if self.max_length_inferred {
            writeln!(f, "Auto-inferred max sequence length: {}", self.max_length)?;
        } else {
            writeln!(f, "Current max sequence length: {}", self.max_length)?;
        }
        if self.max_batch_size_inferred {
            write!(f, "Auto-inferred max batch size: {}", self.max_batch_size)
        } else {
            write!(f, "Current max batch size: {}", self.max_batch_size)
        }
    }
}

/// Conditions worth surfacing that do not abort resolution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CapacityWarning {
    /// Device introspection failed; defaults were applied unchecked.
    DeviceStatsUnavailable { reason: String },
    /// The defaulted max length was shrunk to fit.
    LengthTruncated { from: usize, to: usize },
    /// The configuration fits but uses at least the high-water fraction of free memory.
    HighWaterMark {
        total_bytes: u64,
        free_memory_bytes: u64,
    },
    /// The requested cache strategy is not supported for the encoding.
    CacheStrategyFallback {
        requested: CacheStrategy,
        selected: CacheStrategy,
    },
}

impl std::fmt::Display for CapacityWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DeviceStatsUnavailable { reason } => write!(
                f,
                "Unable to estimate memory footprint of model, can't query device stats: {reason}"
            ),
            Self::LengthTruncated { from, to } => write!(
                f,
                "Truncated model's default max_length from {from} to {to} to fit in memory."
            ),
            Self::HighWaterMark {
                total_bytes,
                free_memory_bytes,
            } => write!(
                f,
                "Estimated model and kv cache memory use nears available memory ({} MiB / {} MiB free). You may experience errors.",
                to_mib(*total_bytes),
                to_mib(*free_memory_bytes)
            ),
            Self::CacheStrategyFallback {
                requested,
                selected,
            } => write!(
                f,
                "cache_strategy = '{requested}' not supported, using '{selected}' cache strategy."
            ),
        }
    }
}
