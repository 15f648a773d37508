//! CLI command definitions using clap

use clap::{Args, Parser, Subcommand, ValueEnum};
use mofa_capacity::{CacheStrategy, SupportedEncoding};
use std::path::PathBuf;

/// MoFA capacity planner - fit model pipelines into device memory
#[derive(Parser)]
#[command(name = "mofa-capacity")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// List registered architectures
    List {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Resolve max length and batch size for a pipeline
    Resolve(ResolveArgs),
}

/// Which devices to query for free memory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum DeviceTarget {
    /// Host RAM
    #[default]
    Host,
    /// NVIDIA GPUs via nvidia-smi
    Gpu,
}

#[derive(Debug, Args)]
pub struct ResolveArgs {
    /// Request file (yaml, toml, json, json5, ini, ron)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Architecture name, e.g. LlamaForCausalLM
    #[arg(short, long)]
    pub architecture: Option<String>,

    /// Weight encoding (float32, bfloat16, q4_k, q4_0, q6_k, gptq)
    #[arg(short, long)]
    pub encoding: Option<SupportedEncoding>,

    /// KV cache strategy (model_default, naive, continuous, paged)
    #[arg(long)]
    pub cache_strategy: Option<CacheStrategy>,

    /// Pin the maximum sequence length
    #[arg(long)]
    pub max_length: Option<usize>,

    /// Pin the maximum batch size
    #[arg(long)]
    pub max_batch_size: Option<usize>,

    /// Fraction of memory left after weights usable for the cache
    #[arg(long)]
    pub device_memory_utilization: Option<f64>,

    /// Devices to query when free memory is not given
    #[arg(long, value_enum, default_value_t = DeviceTarget::Host)]
    pub devices: DeviceTarget,

    /// Simulate a device with this much free memory (MiB); repeat for more devices
    #[arg(long = "free-memory-mib", value_name = "MIB")]
    pub free_memory_mib: Vec<u64>,

    /// Print JSON instead of text
    #[arg(long)]
    pub json: bool,
}
