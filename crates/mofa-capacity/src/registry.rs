//! Architecture registry
//!
//! Maps architecture names to their descriptors and runs the request-level
//! resolution: encoding and cache-strategy selection followed by capacity
//! resolution against the architecture's cost model.

use crate::config::{PipelineRequest, ResolvedConfig};
use crate::encoding::{CacheStrategy, SupportedEncoding, WeightsFormat};
use crate::error::{CapacityError, CapacityResult};
use crate::hardware::DeviceInventory;
use crate::model::CapacityModel;
use crate::report::CapacityWarning;
use crate::resolver::{CapacityResolver, Resolution};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

/// A model architecture the planner can size
#[derive(Clone, Serialize)]
pub struct ArchitectureDescriptor {
    pub name: String,
    pub example_repo_ids: Vec<String>,
    pub default_encoding: SupportedEncoding,
    /// Supported encodings in preference order, each with its cache
    /// strategies in preference order
    pub supported_encodings: Vec<(SupportedEncoding, Vec<CacheStrategy>)>,
    pub default_weights_format: WeightsFormat,
    /// Formats that can be converted into `default_weights_format`
    pub weight_converters: Vec<WeightsFormat>,
    #[serde(skip)]
    pub model: Arc<dyn CapacityModel>,
}

impl std::fmt::Debug for ArchitectureDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchitectureDescriptor")
            .field("name", &self.name)
            .field("default_encoding", &self.default_encoding)
            .field("supported_encodings", &self.supported_encodings)
            .field("default_weights_format", &self.default_weights_format)
            .finish_non_exhaustive()
    }
}

impl ArchitectureDescriptor {
    /// Cache strategies for `encoding`, or `None` if it is not supported.
    pub fn cache_strategies(&self, encoding: SupportedEncoding) -> Option<&[CacheStrategy]> {
        self.supported_encodings
            .iter()
            .find(|(e, _)| *e == encoding)
            .map(|(_, strategies)| strategies.as_slice())
    }

    pub fn supports(&self, encoding: SupportedEncoding) -> bool {
        self.cache_strategies(encoding).is_some()
    }
}

/// Registered architectures, keyed by name
#[derive(Debug, Clone, Default)]
pub struct ArchitectureRegistry {
    architectures: BTreeMap<String, ArchitectureDescriptor>,
}

impl ArchitectureRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an architecture. Existing names are never overridden.
    pub fn register(&mut self, architecture: ArchitectureDescriptor) -> CapacityResult<()> {
        if self.architectures.contains_key(&architecture.name) {
            return Err(CapacityError::DuplicateArchitecture(architecture.name));
        }
        tracing::debug!(architecture = %architecture.name, "registered architecture");
        self.architectures
            .insert(architecture.name.clone(), architecture);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&ArchitectureDescriptor> {
        self.architectures.get(name)
    }

    /// All architectures ordered by name.
    pub fn list(&self) -> impl Iterator<Item = &ArchitectureDescriptor> {
        self.architectures.values()
    }

    pub fn len(&self) -> usize {
        self.architectures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.architectures.is_empty()
    }

    /// Select encoding and cache strategy for `request`, then resolve its
    /// memory plan against `inventory`.
    pub fn resolve(
        &self,
        request: &PipelineRequest,
        inventory: &dyn DeviceInventory,
    ) -> CapacityResult<Resolution> {
        request.validate()?;
        let arch = self
            .get(&request.architecture)
            .ok_or_else(|| CapacityError::UnknownArchitecture(request.architecture.clone()))?;

        let encoding = match request.encoding {
            Some(encoding) => encoding,
            None => {
                tracing::debug!(
                    encoding = %arch.default_encoding,
                    "encoding not provided, using default encoding"
                );
                arch.default_encoding
            }
        };
        let strategies = arch
            .cache_strategies(encoding)
            .ok_or_else(|| CapacityError::UnsupportedEncoding {
                architecture: arch.name.clone(),
                encoding,
            })?;

        let mut warnings = Vec::new();
        let cache_strategy = select_cache_strategy(
            request.cache_strategy.unwrap_or_default(),
            strategies,
            &mut warnings,
        );

        let config = ResolvedConfig {
            max_length: request.max_length,
            max_batch_size: request.max_batch_size,
            encoding,
            cache_strategy,
            device_memory_utilization: request.device_memory_utilization,
            devices: Vec::new(),
        };

        let mut resolution = CapacityResolver::new(arch.model.as_ref()).resolve(config, inventory)?;
        warnings.append(&mut resolution.warnings);
        resolution.warnings = warnings;
        Ok(resolution)
    }
}

fn select_cache_strategy(
    requested: CacheStrategy,
    supported: &[CacheStrategy],
    warnings: &mut Vec<CapacityWarning>,
) -> CacheStrategy {
    let Some(&first) = supported.first() else {
        return requested;
    };

    if requested == CacheStrategy::ModelDefault {
        tracing::debug!(cache_strategy = %first, "default cache_strategy enabled");
        return first;
    }

    if !supported.contains(&requested) {
        tracing::warn!(
            requested = %requested,
            selected = %first,
            "cache_strategy = '{}' not supported, using '{}' cache strategy.",
            requested,
            first
        );
        warnings.push(CapacityWarning::CacheStrategyFallback {
            requested,
            selected: first,
        });
        return first;
    }

    requested
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::FixedInventory;
    use crate::model::TransformerCostModel;

    fn descriptor(name: &str) -> ArchitectureDescriptor {
        ArchitectureDescriptor {
            name: name.to_string(),
            example_repo_ids: vec![],
            default_encoding: SupportedEncoding::Q4K,
            supported_encodings: vec![
                (SupportedEncoding::Q4K, vec![CacheStrategy::Naive]),
                (
                    SupportedEncoding::Bfloat16,
                    vec![CacheStrategy::Paged, CacheStrategy::Continuous],
                ),
            ],
            default_weights_format: WeightsFormat::Gguf,
            weight_converters: vec![],
            model: Arc::new(TransformerCostModel {
                parameter_count: 1_000_000_000,
                num_layers: 16,
                num_kv_heads: 8,
                head_dim: 64,
                max_position_embeddings: 2048,
                max_inferred_batch_size: 32,
            }),
        }
    }

    fn inventory() -> FixedInventory {
        FixedInventory::from_free_mib(&[24 * 1024])
    }

    #[test]
    fn test_register_duplicate_rejected() {
        let mut registry = ArchitectureRegistry::new();
        registry.register(descriptor("Tiny")).unwrap();
        let err = registry.register(descriptor("Tiny")).unwrap_err();
        assert!(matches!(err, CapacityError::DuplicateArchitecture(name) if name == "Tiny"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_unknown_architecture() {
        let registry = ArchitectureRegistry::new();
        let err = registry
            .resolve(&PipelineRequest::new("Missing"), &inventory())
            .unwrap_err();
        assert!(matches!(err, CapacityError::UnknownArchitecture(_)));
    }

    #[test]
    fn test_default_encoding_and_strategy() {
        let mut registry = ArchitectureRegistry::new();
        registry.register(descriptor("Tiny")).unwrap();
        let resolution = registry
            .resolve(&PipelineRequest::new("Tiny"), &inventory())
            .expect("fits");
        assert_eq!(resolution.config.encoding, SupportedEncoding::Q4K);
        assert_eq!(resolution.config.cache_strategy, CacheStrategy::Naive);
        assert!(resolution.warnings.is_empty());
    }

    #[test]
    fn test_unsupported_encoding() {
        let mut registry = ArchitectureRegistry::new();
        registry.register(descriptor("Tiny")).unwrap();
        let mut request = PipelineRequest::new("Tiny");
        request.encoding = Some(SupportedEncoding::Float32);
        let err = registry.resolve(&request, &inventory()).unwrap_err();
        assert!(matches!(err, CapacityError::UnsupportedEncoding { .. }));
    }

    #[test]
    fn test_unsupported_cache_strategy_falls_back() {
        let mut registry = ArchitectureRegistry::new();
        registry.register(descriptor("Tiny")).unwrap();
        let mut request = PipelineRequest::new("Tiny");
        request.encoding = Some(SupportedEncoding::Bfloat16);
        request.cache_strategy = Some(CacheStrategy::Naive);
        let resolution = registry.resolve(&request, &inventory()).expect("fits");
        assert_eq!(resolution.config.cache_strategy, CacheStrategy::Paged);
        assert_eq!(
            resolution.warnings[0],
            CapacityWarning::CacheStrategyFallback {
                requested: CacheStrategy::Naive,
                selected: CacheStrategy::Paged,
            }
        );
    }

    #[test]
    fn test_supported_cache_strategy_is_kept() {
        let mut registry = ArchitectureRegistry::new();
        registry.register(descriptor("Tiny")).unwrap();
        let mut request = PipelineRequest::new("Tiny");
        request.encoding = Some(SupportedEncoding::Bfloat16);
        request.cache_strategy = Some(CacheStrategy::Continuous);
        let resolution = registry.resolve(&request, &inventory()).expect("fits");
        assert_eq!(resolution.config.cache_strategy, CacheStrategy::Continuous);
    }

    #[test]
    fn test_invalid_request_rejected_before_lookup() {
        let registry = ArchitectureRegistry::new();
        let mut request = PipelineRequest::new("Tiny");
        request.max_batch_size = Some(0);
        assert!(matches!(
            registry.resolve(&request, &inventory()),
            Err(CapacityError::InvalidConfig(_))
        ));
    }
}
