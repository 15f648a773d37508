//! Pipeline configuration before and after capacity resolution

use crate::encoding::{CacheStrategy, SupportedEncoding};
use crate::error::{CapacityError, CapacityResult};
use crate::hardware::DeviceStat;
use crate::model::ModelShape;
use serde::{Deserialize, Serialize};

/// Default fraction of memory left after weights that the cache may use
pub const DEFAULT_DEVICE_MEMORY_UTILIZATION: f64 = 0.9;

fn default_utilization() -> f64 {
    DEFAULT_DEVICE_MEMORY_UTILIZATION
}

/// A request to plan a pipeline, as read from a config file or CLI flags
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineRequest {
    /// Registered architecture name, e.g. `LlamaForCausalLM`
    pub architecture: String,

    /// Weight encoding. If None, the architecture's default is used.
    #[serde(default)]
    pub encoding: Option<SupportedEncoding>,

    /// Cache strategy. If None or `model_default`, the first strategy the
    /// architecture supports for the encoding is used.
    #[serde(default)]
    pub cache_strategy: Option<CacheStrategy>,

    /// Maximum sequence length. If None, it is inferred.
    #[serde(default)]
    pub max_length: Option<usize>,

    /// Maximum batch size. If None, it is inferred.
    #[serde(default)]
    pub max_batch_size: Option<usize>,

    /// Fraction of free memory (after weights) usable for the cache, in (0, 1]
    #[serde(default = "default_utilization")]
    pub device_memory_utilization: f64,
}

impl PipelineRequest {
    pub fn new(architecture: impl Into<String>) -> Self {
        Self {
            architecture: architecture.into(),
            encoding: None,
            cache_strategy: None,
            max_length: None,
            max_batch_size: None,
            device_memory_utilization: DEFAULT_DEVICE_MEMORY_UTILIZATION,
        }
    }

    /// Reject values the resolver cannot work with.
    pub fn validate(&self) -> CapacityResult<()> {
        if self.architecture.trim().is_empty() {
            return Err(CapacityError::InvalidConfig("architecture must be set".into()));
        }
        if self.max_length == Some(0) {
            return Err(CapacityError::InvalidConfig("max_length must be > 0".into()));
        }
        if self.max_batch_size == Some(0) {
            return Err(CapacityError::InvalidConfig("max_batch_size must be > 0".into()));
        }
        if !valid_utilization(self.device_memory_utilization) {
            return Err(CapacityError::InvalidConfig(
                "device_memory_utilization must be in (0, 1]".into(),
            ));
        }
        Ok(())
    }
}

fn valid_utilization(value: f64) -> bool {
    value > 0.0 && value <= 1.0
}

/// Configuration owned by one resolution pass.
///
/// `max_length` and `max_batch_size` are `None` until inferred; after a
/// successful resolution both are set to positive values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedConfig {
    pub max_length: Option<usize>,
    pub max_batch_size: Option<usize>,
    pub encoding: SupportedEncoding,
    pub cache_strategy: CacheStrategy,
    pub device_memory_utilization: f64,
    /// Device snapshot used for budgeting; filled in by the resolver
    pub devices: Vec<DeviceStat>,
}

impl ResolvedConfig {
    pub fn new(encoding: SupportedEncoding, cache_strategy: CacheStrategy) -> Self {
        Self {
            max_length: None,
            max_batch_size: None,
            encoding,
            cache_strategy,
            device_memory_utilization: DEFAULT_DEVICE_MEMORY_UTILIZATION,
            devices: Vec::new(),
        }
    }

    /// Pin the maximum sequence length
    pub fn with_max_length(mut self, max_length: usize) -> Result<Self, &'static str> {
        if max_length == 0 {
            return Err("max_length must be > 0");
        }
        self.max_length = Some(max_length);
        Ok(self)
    }

    /// Pin the maximum batch size
    pub fn with_max_batch_size(mut self, max_batch_size: usize) -> Result<Self, &'static str> {
        if max_batch_size == 0 {
            return Err("max_batch_size must be > 0");
        }
        self.max_batch_size = Some(max_batch_size);
        Ok(self)
    }

    /// Set the usable fraction of memory left after weights
    pub fn with_device_memory_utilization(mut self, fraction: f64) -> Result<Self, &'static str> {
        if !valid_utilization(fraction) {
            return Err("device_memory_utilization must be in (0, 1]");
        }
        self.device_memory_utilization = fraction;
        Ok(self)
    }

    /// Reject pinned zeros and an out-of-range utilization.
    pub fn validate(&self) -> CapacityResult<()> {
        if self.max_length == Some(0) {
            return Err(CapacityError::InvalidConfig("max_length must be > 0".into()));
        }
        if self.max_batch_size == Some(0) {
            return Err(CapacityError::InvalidConfig("max_batch_size must be > 0".into()));
        }
        if !valid_utilization(self.device_memory_utilization) {
            return Err(CapacityError::InvalidConfig(
                "device_memory_utilization must be in (0, 1]".into(),
            ));
        }
        Ok(())
    }

    pub fn shape(&self) -> ModelShape {
        ModelShape::new(self.encoding, self.cache_strategy)
    }
}

// ============================================================================
// Tests
// ============================================================================
