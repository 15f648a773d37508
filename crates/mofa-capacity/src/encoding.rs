//! Encodings, cache strategies and weight formats
//!
//! These are resolved identifiers: the planner only forwards them to the
//! architecture's cost model and never interprets checkpoint data itself.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Weight encoding / precision of a checkpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[allow(non_camel_case_types)]
#[non_exhaustive]
pub enum SupportedEncoding {
    Float32,
    Bfloat16,
    Q4K,
    Q4_0,
    Q6K,
    Gptq,
}

impl SupportedEncoding {
    pub const ALL: [SupportedEncoding; 6] = [
        Self::Float32,
        Self::Bfloat16,
        Self::Q4K,
        Self::Q4_0,
        Self::Q6K,
        Self::Gptq,
    ];

    /// Average storage cost of one weight, including block scales.
    pub fn bits_per_weight(&self) -> f64 {
        match self {
            Self::Float32 => 32.0,
            Self::Bfloat16 => 16.0,
            Self::Q4K => 4.5,
            Self::Q4_0 => 4.5,
            Self::Q6K => 6.5625,
            Self::Gptq => 4.25,
        }
    }

    /// Element size of the KV cache when serving this encoding.
    pub fn cache_dtype_bytes(&self) -> u64 {
        match self {
            Self::Float32 => 4,
            _ => 2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Float32 => "float32",
            Self::Bfloat16 => "bfloat16",
            Self::Q4K => "q4_k",
            Self::Q4_0 => "q4_0",
            Self::Q6K => "q6_k",
            Self::Gptq => "gptq",
        }
    }
}

impl std::fmt::Display for SupportedEncoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SupportedEncoding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|e| e.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown encoding '{s}'"))
    }
}

/// Memory-management policy for per-request cache state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum CacheStrategy {
    /// Use the first strategy the architecture lists for the encoding
    #[default]
    ModelDefault,
    Naive,
    Continuous,
    Paged,
}

impl CacheStrategy {
    pub const ALL: [CacheStrategy; 4] = [
        Self::ModelDefault,
        Self::Naive,
        Self::Continuous,
        Self::Paged,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ModelDefault => "model_default",
            Self::Naive => "naive",
            Self::Continuous => "continuous",
            Self::Paged => "paged",
        }
    }
}

impl std::fmt::Display for CacheStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CacheStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown cache strategy '{s}'"))
    }
}

/// On-disk checkpoint format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightsFormat {
    Gguf,
    Safetensors,
    Pytorch,
}

impl std::fmt::Display for WeightsFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WeightsFormat::Gguf => write!(f, "gguf"),
            WeightsFormat::Safetensors => write!(f, "safetensors"),
            WeightsFormat::Pytorch => write!(f, "pytorch"),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoding_parse_and_display() {
        for encoding in SupportedEncoding::ALL {
            let parsed: SupportedEncoding = encoding.to_string().parse().expect("parse");
            assert_eq!(parsed, encoding);
        }
        assert_eq!("Q4_K".parse::<SupportedEncoding>(), Ok(SupportedEncoding::Q4K));
        assert!("int3".parse::<SupportedEncoding>().is_err());
    }

    #[test]
    fn test_encoding_serde_uses_identifiers() {
        let json = serde_json::to_string(&SupportedEncoding::Bfloat16).expect("serialize");
        assert_eq!(json, "\"bfloat16\"");
        let back: SupportedEncoding = serde_json::from_str("\"q4_k\"").expect("deserialize");
        assert_eq!(back, SupportedEncoding::Q4K);
    }

    #[test]
    fn test_quantized_encodings_are_smaller() {
        assert!(SupportedEncoding::Q4K.bits_per_weight() < SupportedEncoding::Bfloat16.bits_per_weight());
        assert!(SupportedEncoding::Bfloat16.bits_per_weight() < SupportedEncoding::Float32.bits_per_weight());
        assert_eq!(SupportedEncoding::Float32.cache_dtype_bytes(), 4);
        assert_eq!(SupportedEncoding::Q6K.cache_dtype_bytes(), 2);
    }

    #[test]
    fn test_cache_strategy_default_and_parse() {
        assert_eq!(CacheStrategy::default(), CacheStrategy::ModelDefault);
        assert_eq!("paged".parse::<CacheStrategy>(), Ok(CacheStrategy::Paged));
        assert!("lru".parse::<CacheStrategy>().is_err());
        assert_eq!(WeightsFormat::Safetensors.to_string(), "safetensors");
    }
}
