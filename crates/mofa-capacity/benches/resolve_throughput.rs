//! Resolution throughput benchmarks
//!
//! Times full request resolution (including the length and batch searches
//! on overflow) for each built-in architecture across a few device sizes.
//! Run with: `cargo bench -p mofa-capacity`

use mofa_capacity::{
    CacheStrategy, CapacityModel, CapacityResolver, FixedInventory, ModelShape, PipelineRequest,
    ResolvedConfig, SupportedEncoding, Trial, builtin_registry,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

const ITERATIONS: usize = 1_000;

/// Wraps a cost model and counts cache estimates.
struct Counting<'a> {
    inner: &'a dyn CapacityModel,
    cache_calls: AtomicUsize,
}

impl CapacityModel for Counting<'_> {
    fn estimate_weights_size(&self, shape: &ModelShape) -> u64 {
        self.inner.estimate_weights_size(shape)
    }

    fn estimate_cache_size(&self, trial: &Trial, available: u64) -> u64 {
        self.cache_calls.fetch_add(1, Ordering::Relaxed);
        self.inner.estimate_cache_size(trial, available)
    }

    fn max_sequence_len_ceiling(&self, shape: &ModelShape) -> usize {
        self.inner.max_sequence_len_ceiling(shape)
    }

    fn infer_optimal_batch_size(&self, shape: &ModelShape, max_length: usize, available: u64) -> usize {
        self.inner.infer_optimal_batch_size(shape, max_length, available)
    }
}

fn bench_registry(free_mib: u64) {
    let registry = match builtin_registry() {
        Ok(r) => r,
        Err(e) => {
            eprintln!("skip: {e}");
            return;
        }
    };
    let inventory = FixedInventory::from_free_mib(&[free_mib]);

    for arch in registry.list() {
        let request = PipelineRequest::new(arch.name.clone());
        let mut ok = 0usize;
        let start = Instant::now();
        for _ in 0..ITERATIONS {
            if registry.resolve(&request, &inventory).is_ok() {
                ok += 1;
            }
        }
        let elapsed = start.elapsed();
        println!(
            "{:<20} | free={:>6} MiB ok={:>4}/{} elapsed={:.2}ms per_resolve={:.2}us",
            arch.name,
            free_mib,
            ok,
            ITERATIONS,
            elapsed.as_secs_f64() * 1000.0,
            elapsed.as_secs_f64() * 1e6 / ITERATIONS as f64,
        );
    }
}

/// Pinned length and batch that overflow, so both searches run.
fn bench_search_probes() {
    let Ok(registry) = builtin_registry() else {
        return;
    };
    let Some(arch) = registry.get("LlamaForCausalLM") else {
        return;
    };
    let counting = Counting {
        inner: arch.model.as_ref(),
        cache_calls: AtomicUsize::new(0),
    };
    let config = match ResolvedConfig::new(SupportedEncoding::Bfloat16, CacheStrategy::Paged)
        .with_max_length(131_072)
        .and_then(|c| c.with_max_batch_size(64))
    {
        Ok(c) => c,
        Err(e) => {
            eprintln!("skip: {e}");
            return;
        }
    };
    let inventory = FixedInventory::from_free_mib(&[24 * 1024]);

    let start = Instant::now();
    let result = CapacityResolver::new(&counting).resolve(config, &inventory);
    let elapsed = start.elapsed();
    println!(
        "overflow search     | rejected={} cache_estimates={} elapsed={:.2}us",
        result.is_err(),
        counting.cache_calls.load(Ordering::Relaxed),
        elapsed.as_secs_f64() * 1e6,
    );
}

fn main() {
    println!("=== mofa-capacity resolution benchmark ===");
    for free_mib in [8 * 1024, 24 * 1024, 80 * 1024] {
        bench_registry(free_mib);
        println!();
    }
    bench_search_probes();
}
