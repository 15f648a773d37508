//! `mofa-capacity resolve` command implementation

use crate::CliError;
use crate::cli::{DeviceTarget, ResolveArgs};
use crate::output;
use colored::Colorize;
use mofa_capacity::loader::load_request;
use mofa_capacity::{
    CapacityError, DeviceInventory, FixedInventory, HostMemoryInventory, NvidiaSmiInventory,
    PipelineRequest, Resolution, builtin_registry,
};
use serde_json::json;

/// Execute the `mofa-capacity resolve` command
pub fn run(args: &ResolveArgs) -> anyhow::Result<()> {
    let request = build_request(args)?;
    let inventory = inventory(args);
    let registry = builtin_registry()?;

    tracing::debug!(?request, "resolving");
    match registry.resolve(&request, inventory.as_ref()) {
        Ok(resolution) => {
            if args.json {
                output::print_json(&resolution)?;
            } else {
                print_resolution(&request, &resolution);
            }
            Ok(())
        }
        Err(e) => {
            if args.json {
                output::print_json(&error_json(&e))?;
            }
            Err(CliError::Capacity(e).into())
        }
    }
}

/// Start from the request file if given, then apply flag overrides.
fn build_request(args: &ResolveArgs) -> Result<PipelineRequest, CliError> {
    let mut request = match (&args.config, &args.architecture) {
        (Some(path), _) => load_request(path)?,
        (None, Some(architecture)) => PipelineRequest::new(architecture.clone()),
        (None, None) => {
            return Err(CliError::ConfigError(
                "either --config or --architecture is required".into(),
            ));
        }
    };

    if let Some(architecture) = &args.architecture {
        request.architecture = architecture.clone();
    }
    if args.encoding.is_some() {
        request.encoding = args.encoding;
    }
    if args.cache_strategy.is_some() {
        request.cache_strategy = args.cache_strategy;
    }
    if args.max_length.is_some() {
        request.max_length = args.max_length;
    }
    if args.max_batch_size.is_some() {
        request.max_batch_size = args.max_batch_size;
    }
    if let Some(fraction) = args.device_memory_utilization {
        request.device_memory_utilization = fraction;
    }
    Ok(request)
}

fn inventory(args: &ResolveArgs) -> Box<dyn DeviceInventory> {
    if !args.free_memory_mib.is_empty() {
        return Box::new(FixedInventory::from_free_mib(&args.free_memory_mib));
    }
    match args.devices {
        DeviceTarget::Host => Box::new(HostMemoryInventory),
        DeviceTarget::Gpu => Box::new(NvidiaSmiInventory),
    }
}

fn print_resolution(request: &PipelineRequest, resolution: &Resolution) {
    let config = &resolution.config;
    println!(
        "{} {} ({}, {} cache)",
        "→".green(),
        request.architecture.bold(),
        config.encoding,
        config.cache_strategy
    );
    println!();

    match &resolution.report {
        Some(report) => println!("{report}"),
        None => println!("  Memory check skipped: device stats unavailable"),
    }

    if !resolution.warnings.is_empty() {
        println!();
        for warning in &resolution.warnings {
            println!("{} {}", "warning:".yellow().bold(), warning);
        }
    }

    println!();
    println!(
        "{} max_length={} max_batch_size={}",
        "✓".green(),
        resolution.max_length(),
        resolution.max_batch_size()
    );
}

fn error_json(error: &CapacityError) -> serde_json::Value {
    match error {
        CapacityError::CapacityExceeded {
            message,
            suggestions,
            weights_bytes,
            cache_bytes,
            total_bytes,
            free_memory_bytes,
        } => json!({
            "success": false,
            "error": message,
            "suggestions": suggestions,
            "weights_bytes": weights_bytes,
            "cache_bytes": cache_bytes,
            "total_bytes": total_bytes,
            "free_memory_bytes": free_memory_bytes,
        }),
        CapacityError::WeightsTooLarge {
            weights_bytes,
            free_memory_bytes,
        } => json!({
            "success": false,
            "error": error.to_string(),
            "weights_bytes": weights_bytes,
            "free_memory_bytes": free_memory_bytes,
        }),
        other => json!({
            "success": false,
            "error": other.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mofa_capacity::{SupportedEncoding, Suggestion};

    fn args() -> ResolveArgs {
        ResolveArgs {
            config: None,
            architecture: None,
            encoding: None,
            cache_strategy: None,
            max_length: None,
            max_batch_size: None,
            device_memory_utilization: None,
            devices: DeviceTarget::Host,
            free_memory_mib: vec![],
            json: false,
        }
    }

    #[test]
    fn test_request_requires_architecture_or_config() {
        assert!(matches!(build_request(&args()), Err(CliError::ConfigError(_))));
    }

    #[test]
    fn test_flags_populate_request() {
        let mut a = args();
        a.architecture = Some("Qwen2ForCausalLM".into());
        a.encoding = Some(SupportedEncoding::Q4K);
        a.max_length = Some(2048);
        a.device_memory_utilization = Some(0.5);
        let request = build_request(&a).unwrap();
        assert_eq!(request.architecture, "Qwen2ForCausalLM");
        assert_eq!(request.encoding, Some(SupportedEncoding::Q4K));
        assert_eq!(request.max_length, Some(2048));
        assert_eq!(request.max_batch_size, None);
        assert_eq!(request.device_memory_utilization, 0.5);
    }

    #[test]
    fn test_error_json_carries_suggestions() {
        let err = CapacityError::CapacityExceeded {
            message: "too big".into(),
            suggestions: vec![Suggestion::ReduceBatch { max_batch_size: 4 }],
            weights_bytes: 1,
            cache_bytes: 2,
            total_bytes: 3,
            free_memory_bytes: 2,
        };
        let value = error_json(&err);
        assert_eq!(value["success"], false);
        assert_eq!(value["suggestions"][0]["kind"], "reduce_batch");
        assert_eq!(value["suggestions"][0]["max_batch_size"], 4);
        assert_eq!(value["total_bytes"], 3);
    }
}
