//! # mofa-capacity
//!
//! Memory budgeting and capacity resolution for MoFA model pipelines.
//!
//! Given a model architecture, a weight encoding and a snapshot of device
//! memory, the planner picks the largest `max_length` and `max_batch_size`
//! whose weights plus KV cache fit, and explains what to change when they
//! don't.
//!
//! ## Flow
//!
//! 1. [`DeviceInventory`] reports free memory per device
//! 2. [`CapacityModel`] estimates weight and cache bytes for a trial configuration
//! 3. [`CapacityResolver`] infers unset values, shrinks `max_length` when it
//!    was not pinned, and fails with [`CapacityError::CapacityExceeded`] plus
//!    concrete [`Suggestion`]s otherwise
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use mofa_capacity::{builtin_registry, HostMemoryInventory, PipelineRequest};
//!
//! fn main() -> Result<(), mofa_capacity::CapacityError> {
//!     let registry = builtin_registry()?;
//!     let request = PipelineRequest::new("LlamaForCausalLM");
//!     let resolution = registry.resolve(&request, &HostMemoryInventory)?;
//!     println!(
//!         "max_length={} max_batch_size={}",
//!         resolution.max_length(),
//!         resolution.max_batch_size()
//!     );
//!     Ok(())
//! }
//! ```

pub mod architectures;
pub mod budget;
pub mod config;
pub mod diagnostics;
pub mod encoding;
pub mod error;
pub mod hardware;
pub mod loader;
pub mod model;
pub mod registry;
pub mod report;
pub mod resolver;
pub mod search;

pub use architectures::{builtin_registry, register_builtin_architectures};
pub use budget::{MemoryBudget, HIGH_WATER_MARK};
pub use config::{PipelineRequest, ResolvedConfig, DEFAULT_DEVICE_MEMORY_UTILIZATION};
pub use diagnostics::Suggestion;
pub use encoding::{CacheStrategy, SupportedEncoding, WeightsFormat};
pub use error::{CapacityError, CapacityResult};
pub use hardware::{
    DeviceInventory, DeviceKind, DeviceStat, FixedInventory, HostMemoryInventory,
    NvidiaSmiInventory,
};
pub use model::{CapacityModel, ModelShape, TransformerCostModel, Trial};
pub use registry::{ArchitectureDescriptor, ArchitectureRegistry};
pub use report::{CapacityWarning, MemoryReport};
pub use resolver::{CapacityResolver, Resolution};
