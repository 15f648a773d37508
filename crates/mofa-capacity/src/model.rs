//! Per-architecture memory cost models
//!
//! The planner never computes memory costs itself. Each architecture supplies
//! a [`CapacityModel`]; the resolver and the feasibility searches only compare
//! the numbers it returns against the device budget.

use crate::encoding::{CacheStrategy, SupportedEncoding};
use serde::{Deserialize, Serialize};

/// Parameters a cost model needs that do not change across search trials
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelShape {
    pub encoding: SupportedEncoding,
    pub cache_strategy: CacheStrategy,
}

impl ModelShape {
    pub fn new(encoding: SupportedEncoding, cache_strategy: CacheStrategy) -> Self {
        Self {
            encoding,
            cache_strategy,
        }
    }
}

/// One candidate `(max_length, max_batch_size)` point evaluated by the planner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Trial {
    pub shape: ModelShape,
    pub max_length: usize,
    pub max_batch_size: usize,
}

/// Memory cost functions for one architecture.
///
/// Every method must be pure and deterministic. `estimate_cache_size` must be
/// non-decreasing in both `max_length` and `max_batch_size`; the binary
/// searches rely on it and behaviour with a non-monotonic model is undefined.
pub trait CapacityModel: Send + Sync {
    /// Bytes occupied by the model weights.
    fn estimate_weights_size(&self, shape: &ModelShape) -> u64;

    /// Bytes the cache needs for `trial`, given the budget it may use.
    fn estimate_cache_size(&self, trial: &Trial, available_cache_bytes: u64) -> u64;

    /// Longest sequence the architecture supports, ignoring memory.
    fn max_sequence_len_ceiling(&self, shape: &ModelShape) -> usize;

    /// Largest useful batch size for sequences of `max_length` within the budget.
    fn infer_optimal_batch_size(
        &self,
        shape: &ModelShape,
        max_length: usize,
        available_cache_bytes: u64,
    ) -> usize;
}

/// Tokens per cache page for the paged strategy
pub const PAGE_SIZE: usize = 128;

/// Decoder-only transformer with a key/value cache per layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformerCostModel {
    pub parameter_count: u64,
    pub num_layers: u64,
    pub num_kv_heads: u64,
    pub head_dim: u64,
    pub max_position_embeddings: usize,
    /// Upper bound on the batch size the planner infers on its own
    pub max_inferred_batch_size: usize,
}

impl TransformerCostModel {
    /// Cache bytes for one token of one sequence (keys and values, all layers).
    pub fn cache_bytes_per_token(&self, shape: &ModelShape) -> u64 {
        2 * self.num_layers * self.num_kv_heads * self.head_dim * shape.encoding.cache_dtype_bytes()
    }

    fn cached_tokens(&self, shape: &ModelShape, max_length: usize) -> u64 {
        match shape.cache_strategy {
            CacheStrategy::Paged => {
                (max_length.div_ceil(PAGE_SIZE) as u64).saturating_mul(PAGE_SIZE as u64)
            }
            _ => max_length as u64,
        }
    }

    fn bytes_per_sequence(&self, shape: &ModelShape, max_length: usize) -> u64 {
        self.cached_tokens(shape, max_length)
            .saturating_mul(self.cache_bytes_per_token(shape))
    }
}

impl CapacityModel for TransformerCostModel {
    fn estimate_weights_size(&self, shape: &ModelShape) -> u64 {
        (self.parameter_count as f64 * shape.encoding.bits_per_weight() / 8.0).ceil() as u64
    }

    fn estimate_cache_size(&self, trial: &Trial, _available_cache_bytes: u64) -> u64 {
        self.bytes_per_sequence(&trial.shape, trial.max_length)
            .saturating_mul(trial.max_batch_size as u64)
    }

    fn max_sequence_len_ceiling(&self, _shape: &ModelShape) -> usize {
        self.max_position_embeddings
    }

    fn infer_optimal_batch_size(
        &self,
        shape: &ModelShape,
        max_length: usize,
        available_cache_bytes: u64,
    ) -> usize {
        let per_sequence = self.bytes_per_sequence(shape, max_length);
        if per_sequence == 0 {
            return self.max_inferred_batch_size.max(1);
        }
        let fits = (available_cache_bytes / per_sequence) as usize;
        fits.clamp(1, self.max_inferred_batch_size.max(1))
    }
}

// ============================================================================
// Tests
// ============================================================================
