//! Configuration resolver
//!
//! Turns a [`ResolvedConfig`] with optional max length / batch size into a
//! concrete, memory-checked plan:
//!
//! 1. Weights alone larger than free memory fail with `WeightsTooLarge`.
//! 2. Unknown device stats skip budgeting: batch size 1 and the model's
//!    length ceiling are applied unchecked, with a warning.
//! 3. Unpinned values are inferred from the cost model.
//! 4. A defaulted max length that overflows is shrunk once by search. Batch
//!    size is never shrunk automatically.
//! 5. Anything still over budget fails with `CapacityExceeded` and a
//!    remediation; anything above the high-water mark is accepted with a
//!    warning.
//!
//! Pinned values are never changed on success. Pinned zeros and a
//! utilization outside `(0, 1]` are rejected up front as `InvalidConfig`.

use crate::budget::{MemoryBudget, total_free_memory};
use crate::config::ResolvedConfig;
use crate::diagnostics::{self, Pinned};
use crate::error::{CapacityError, CapacityResult};
use crate::hardware::DeviceInventory;
use crate::model::{CapacityModel, ModelShape, Trial};
use crate::report::{CapacityWarning, MemoryReport, to_mib};
use crate::search::{self, BatchPolicy, SearchOutcome};
use serde::Serialize;

/// Outcome of a successful (possibly degraded) resolution
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resolution {
    /// Configuration with `max_length` and `max_batch_size` set
    pub config: ResolvedConfig,
    /// Memory estimate; `None` when device stats were unavailable
    pub report: Option<MemoryReport>,
    pub warnings: Vec<CapacityWarning>,
}

impl Resolution {
    pub fn max_length(&self) -> usize {
        self.config.max_length.unwrap_or(1)
    }

    pub fn max_batch_size(&self) -> usize {
        self.config.max_batch_size.unwrap_or(1)
    }

    /// Whether budgeting was skipped because device stats were unavailable.
    pub fn is_unchecked(&self) -> bool {
        self.report.is_none()
    }
}

/// Resolves configurations against one architecture's cost model.
pub struct CapacityResolver<'a> {
    model: &'a dyn CapacityModel,
}

impl<'a> CapacityResolver<'a> {
    pub fn new(model: &'a dyn CapacityModel) -> Self {
        Self { model }
    }

    /// Resolve `config` against the devices reported by `inventory`.
    pub fn resolve(
        &self,
        mut config: ResolvedConfig,
        inventory: &dyn DeviceInventory,
    ) -> CapacityResult<Resolution> {
        config.validate()?;
        let shape = config.shape();
        let pinned = Pinned {
            max_length: config.max_length.is_some(),
            max_batch_size: config.max_batch_size.is_some(),
        };

        let snapshot = inventory.device_stats().and_then(|devices| {
            let free = total_free_memory(&devices)?;
            Ok((devices, free))
        });
        let (devices, free_memory) = match snapshot {
            Ok(snapshot) => snapshot,
            Err(e) => return Ok(self.resolve_unchecked(config, e)),
        };
        config.devices = devices;

        let weights = self.model.estimate_weights_size(&shape);
        let budget = MemoryBudget::new(free_memory, weights, config.device_memory_utilization);
        if budget.weights_exceed_free_memory() {
            return Err(CapacityError::WeightsTooLarge {
                weights_bytes: weights,
                free_memory_bytes: free_memory,
            });
        }
        let available = budget.available_cache_bytes();

        let mut max_length = config
            .max_length
            .unwrap_or_else(|| self.model.max_sequence_len_ceiling(&shape))
            .max(1);
        let mut max_batch_size = config
            .max_batch_size
            .unwrap_or_else(|| self.model.infer_optimal_batch_size(&shape, max_length, available))
            .max(1);
        let batch_policy = if pinned.max_batch_size {
            BatchPolicy::Pinned(max_batch_size)
        } else {
            BatchPolicy::Inferred
        };

        let mut cache = self.cache_size(shape, max_length, max_batch_size, available);
        let mut warnings = Vec::new();

        // Only a defaulted max length is trimmed automatically.
        let mut length_search = None;
        if !budget.fits(cache) && !pinned.max_length {
            let outcome =
                search::find_valid_max_length(self.model, shape, max_length, batch_policy, available);
            if outcome.found {
                tracing::warn!(
                    from = max_length,
                    to = outcome.value,
                    "Truncated model's default max_length from {} to {} to fit in memory.",
                    max_length,
                    outcome.value
                );
                warnings.push(CapacityWarning::LengthTruncated {
                    from: max_length,
                    to: outcome.value,
                });
                max_length = outcome.value;
                if !pinned.max_batch_size {
                    max_batch_size = outcome.companion;
                }
                cache = self.cache_size(shape, max_length, max_batch_size, available);
            } else {
                length_search = Some(outcome);
            }
        }

        let total = weights.saturating_add(cache);
        let report = MemoryReport {
            weights_bytes: weights,
            cache_bytes: cache,
            total_bytes: total,
            free_memory_bytes: free_memory,
            max_length,
            max_batch_size,
            max_length_inferred: !pinned.max_length,
            max_batch_size_inferred: !pinned.max_batch_size,
        };
        tracing::info!(
            weights_mib = to_mib(weights),
            cache_mib = to_mib(cache),
            total_mib = to_mib(total),
            free_mib = to_mib(free_memory),
            max_length,
            max_batch_size,
            max_length_inferred = !pinned.max_length,
            max_batch_size_inferred = !pinned.max_batch_size,
            "\n{report}"
        );

        if !budget.fits(cache) {
            return Err(self.out_of_memory(
                shape,
                pinned,
                &report,
                batch_policy,
                available,
                length_search,
            ));
        }

        if budget.near_capacity(total) {
            tracing::warn!(
                total_mib = to_mib(total),
                free_mib = to_mib(free_memory),
                "Estimated model and kv cache memory use nears available memory. You may experience errors."
            );
            warnings.push(CapacityWarning::HighWaterMark {
                total_bytes: total,
                free_memory_bytes: free_memory,
            });
        }

        config.max_length = Some(max_length);
        config.max_batch_size = Some(max_batch_size);
        Ok(Resolution {
            config,
            report: Some(report),
            warnings,
        })
    }

    /// Best-effort defaults when device memory cannot be queried.
    fn resolve_unchecked(&self, mut config: ResolvedConfig, cause: CapacityError) -> Resolution {
        let reason = match cause {
            CapacityError::DeviceStatsUnavailable(reason) => reason,
            other => other.to_string(),
        };
        tracing::warn!(
            reason = %reason,
            "Unable to estimate memory footprint of model, can't query device stats"
        );

        let shape = config.shape();
        if config.max_batch_size.is_none() {
            config.max_batch_size = Some(1);
        }
        if config.max_length.is_none() {
            config.max_length = Some(self.model.max_sequence_len_ceiling(&shape).max(1));
        }
        config.devices.clear();

        Resolution {
            config,
            report: None,
            warnings: vec![CapacityWarning::DeviceStatsUnavailable { reason }],
        }
    }

    /// Search for feasible alternatives and build the remediation error.
    fn out_of_memory(
        &self,
        shape: ModelShape,
        pinned: Pinned,
        report: &MemoryReport,
        batch_policy: BatchPolicy,
        available: u64,
        length_search: Option<SearchOutcome>,
    ) -> CapacityError {
        let length = length_search.unwrap_or_else(|| {
            search::find_valid_max_length(
                self.model,
                shape,
                report.max_length,
                batch_policy,
                available,
            )
        });
        let batch = if pinned.max_batch_size {
            search::find_valid_batch_size(
                self.model,
                shape,
                report.max_length,
                report.max_batch_size,
                available,
            )
        } else {
            SearchOutcome::skipped()
        };

        let (message, suggestions) = diagnostics::compose(
            pinned,
            &length,
            &batch,
            report.max_length,
            report.total_bytes,
            report.free_memory_bytes,
        );
        CapacityError::CapacityExceeded {
            message,
            suggestions,
            weights_bytes: report.weights_bytes,
            cache_bytes: report.cache_bytes,
            total_bytes: report.total_bytes,
            free_memory_bytes: report.free_memory_bytes,
        }
    }

    fn cache_size(
        &self,
        shape: ModelShape,
        max_length: usize,
        max_batch_size: usize,
        available: u64,
    ) -> u64 {
        self.model.estimate_cache_size(
            &Trial {
                shape,
                max_length,
                max_batch_size,
            },
            available,
        )
    }
}

// ============================================================================
// Tests
// ============================================================================
