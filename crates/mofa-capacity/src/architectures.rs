//! Built-in reference architectures

use crate::encoding::{CacheStrategy, SupportedEncoding, WeightsFormat};
use crate::error::CapacityResult;
use crate::model::TransformerCostModel;
use crate::registry::{ArchitectureDescriptor, ArchitectureRegistry};
use std::sync::Arc;

const MAX_INFERRED_BATCH_SIZE: usize = 256;

fn gguf_encodings() -> Vec<(SupportedEncoding, Vec<CacheStrategy>)> {
    vec![
        (SupportedEncoding::Float32, vec![CacheStrategy::Paged, CacheStrategy::Continuous, CacheStrategy::Naive]),
        (SupportedEncoding::Bfloat16, vec![CacheStrategy::Paged, CacheStrategy::Continuous, CacheStrategy::Naive]),
        (SupportedEncoding::Q4K, vec![CacheStrategy::Paged, CacheStrategy::Continuous, CacheStrategy::Naive]),
        (SupportedEncoding::Q4_0, vec![CacheStrategy::Naive]),
        (SupportedEncoding::Q6K, vec![CacheStrategy::Paged, CacheStrategy::Continuous, CacheStrategy::Naive]),
        (SupportedEncoding::Gptq, vec![CacheStrategy::Paged]),
    ]
}

fn transformer(
    parameter_count: u64,
    num_layers: u64,
    num_kv_heads: u64,
    head_dim: u64,
    max_position_embeddings: usize,
) -> Arc<TransformerCostModel> {
    Arc::new(TransformerCostModel {
        parameter_count,
        num_layers,
        num_kv_heads,
        head_dim,
        max_position_embeddings,
        max_inferred_batch_size: MAX_INFERRED_BATCH_SIZE,
    })
}

pub fn llama() -> ArchitectureDescriptor {
    ArchitectureDescriptor {
        name: "LlamaForCausalLM".into(),
        example_repo_ids: vec![
            "meta-llama/Llama-3.1-8B-Instruct".into(),
            "meta-llama/Llama-3.2-1B".into(),
        ],
        default_encoding: SupportedEncoding::Q4K,
        supported_encodings: gguf_encodings(),
        default_weights_format: WeightsFormat::Gguf,
        weight_converters: vec![WeightsFormat::Safetensors],
        model: transformer(8_030_000_000, 32, 8, 128, 131_072),
    }
}

pub fn mistral() -> ArchitectureDescriptor {
    ArchitectureDescriptor {
        name: "MistralForCausalLM".into(),
        example_repo_ids: vec!["mistralai/Mistral-Nemo-Instruct-2407".into()],
        default_encoding: SupportedEncoding::Bfloat16,
        supported_encodings: vec![(
            SupportedEncoding::Bfloat16,
            vec![CacheStrategy::Paged, CacheStrategy::Continuous],
        )],
        default_weights_format: WeightsFormat::Safetensors,
        weight_converters: vec![],
        model: transformer(12_200_000_000, 40, 8, 128, 1_024_000),
    }
}

pub fn qwen2() -> ArchitectureDescriptor {
    ArchitectureDescriptor {
        name: "Qwen2ForCausalLM".into(),
        example_repo_ids: vec!["Qwen/Qwen2.5-7B-Instruct".into()],
        default_encoding: SupportedEncoding::Bfloat16,
        supported_encodings: vec![
            (SupportedEncoding::Float32, vec![CacheStrategy::Paged, CacheStrategy::Continuous]),
            (SupportedEncoding::Bfloat16, vec![CacheStrategy::Paged, CacheStrategy::Continuous]),
            (SupportedEncoding::Q4K, vec![CacheStrategy::Paged, CacheStrategy::Continuous]),
        ],
        default_weights_format: WeightsFormat::Safetensors,
        weight_converters: vec![WeightsFormat::Gguf],
        model: transformer(7_620_000_000, 28, 4, 128, 32_768),
    }
}

pub fn replit() -> ArchitectureDescriptor {
    ArchitectureDescriptor {
        name: "MPTForCausalLM".into(),
        example_repo_ids: vec!["replit/replit-code-v1_5-3b".into()],
        default_encoding: SupportedEncoding::Float32,
        supported_encodings: vec![
            (SupportedEncoding::Float32, vec![CacheStrategy::Continuous]),
            (SupportedEncoding::Bfloat16, vec![CacheStrategy::Continuous]),
        ],
        default_weights_format: WeightsFormat::Gguf,
        weight_converters: vec![WeightsFormat::Pytorch],
        // multi-head attention: one kv head per query head
        model: transformer(3_300_000_000, 32, 24, 128, 4096),
    }
}

/// Register every built-in architecture.
pub fn register_builtin_architectures(registry: &mut ArchitectureRegistry) -> CapacityResult<()> {
    for arch in [llama(), mistral(), qwen2(), replit()] {
        registry.register(arch)?;
    }
    Ok(())
}

/// A registry with the built-in architectures already registered.
pub fn builtin_registry() -> CapacityResult<ArchitectureRegistry> {
    let mut registry = ArchitectureRegistry::new();
    register_builtin_architectures(&mut registry)?;
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CapacityError;

    #[test]
    fn test_builtin_registry_contents() {
        let registry = builtin_registry().expect("no duplicates");
        let names: Vec<&str> = registry.list().map(|a| a.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["LlamaForCausalLM", "MPTForCausalLM", "MistralForCausalLM", "Qwen2ForCausalLM"]
        );
    }

    #[test]
    fn test_default_encodings_are_supported() {
        let registry = builtin_registry().unwrap();
        for arch in registry.list() {
            assert!(arch.supports(arch.default_encoding), "{}", arch.name);
            for (_, strategies) in &arch.supported_encodings {
                assert!(!strategies.is_empty());
                assert!(!strategies.contains(&CacheStrategy::ModelDefault));
            }
        }
    }

    #[test]
    fn test_registering_builtins_twice_fails() {
        let mut registry = builtin_registry().unwrap();
        let err = register_builtin_architectures(&mut registry).unwrap_err();
        assert!(matches!(err, CapacityError::DuplicateArchitecture(_)));
    }
}
