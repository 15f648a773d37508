//! Feasibility searches over max length and batch size
//!
//! Both searches are max-feasible-value binary searches over `[1, upper]`
//! driven by [`CapacityModel::estimate_cache_size`]. Each probe builds a fresh
//! [`Trial`]; nothing is written back to the caller's configuration, so a
//! search can be run on its own and the caller commits only what it adopts.
//!
//! The cost model may be expensive, so the searches are shaped to minimise
//! the number of evaluations: `O(log upper)` calls each.

use crate::model::{CapacityModel, ModelShape, Trial};
use serde::{Deserialize, Serialize};

/// How the batch size is chosen while the length search probes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchPolicy {
    /// Batch size is pinned by the caller and held fixed.
    Pinned(usize),
    /// Batch size is re-inferred by the cost model for each probed length.
    Inferred,
}

/// Result of one feasibility search
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchOutcome {
    /// Whether `value` fits the cache budget.
    pub found: bool,
    /// The searched parameter at the last probe.
    pub value: usize,
    /// The other parameter at that probe: the batch size for a length
    /// search, the held length for a batch search.
    pub companion: usize,
}

impl SearchOutcome {
    /// Outcome of a search that was not run.
    pub fn skipped() -> Self {
        Self {
            found: false,
            value: 0,
            companion: 0,
        }
    }
}

/// Largest max length in `[1, upper]` whose cache fits `available_cache_bytes`.
///
/// When the interval narrows to two candidates the lower one is probed, so the
/// result can be one below the true maximum.
pub fn find_valid_max_length(
    model: &dyn CapacityModel,
    shape: ModelShape,
    upper: usize,
    batch: BatchPolicy,
    available_cache_bytes: u64,
) -> SearchOutcome {
    bisect(upper, available_cache_bytes, |length| {
        let max_batch_size = match batch {
            BatchPolicy::Pinned(size) => size,
            BatchPolicy::Inferred => {
                model.infer_optimal_batch_size(&shape, length, available_cache_bytes)
            }
        };
        let trial = Trial {
            shape,
            max_length: length,
            max_batch_size,
        };
        let cache_bytes = model.estimate_cache_size(&trial, available_cache_bytes);
        tracing::debug!(length, max_batch_size, cache_bytes, "max length probe");
        (cache_bytes, max_batch_size)
    })
}

/// Largest batch size in `[1, upper]` whose cache fits at `max_length`.
///
/// Only meaningful for a pinned batch size: an inferred one is already
/// re-derived inside [`find_valid_max_length`].
pub fn find_valid_batch_size(
    model: &dyn CapacityModel,
    shape: ModelShape,
    max_length: usize,
    upper: usize,
    available_cache_bytes: u64,
) -> SearchOutcome {
    bisect(upper, available_cache_bytes, |max_batch_size| {
        let trial = Trial {
            shape,
            max_length,
            max_batch_size,
        };
        let cache_bytes = model.estimate_cache_size(&trial, available_cache_bytes);
        tracing::debug!(max_length, max_batch_size, cache_bytes, "batch size probe");
        (cache_bytes, max_length)
    })
}

/// Shared search loop. `probe` returns the cache size at a candidate value
/// and the companion value used for it.
fn bisect(
    upper: usize,
    available_cache_bytes: u64,
    mut probe: impl FnMut(usize) -> (u64, usize),
) -> SearchOutcome {
    let mut lower = 1;
    let mut upper = upper;
    let mut last = SearchOutcome::skipped();

    while lower <= upper {
        let mid = lower + (upper - lower) / 2;
        let (cache_bytes, companion) = probe(mid);
        let fits = cache_bytes <= available_cache_bytes;
        last = SearchOutcome {
            found: false,
            value: mid,
            companion,
        };

        if upper - lower <= 1 {
            last.found = fits;
            return last;
        }

        if fits {
            lower = mid;
        } else {
            upper = mid - 1;
        }
    }

    last
}

// ============================================================================
// Tests
// ============================================================================
