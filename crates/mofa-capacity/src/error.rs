//! Error types for capacity resolution

use crate::diagnostics::Suggestion;
use crate::encoding::SupportedEncoding;

/// Errors raised while resolving a pipeline's memory plan.
///
/// `WeightsTooLarge` and `CapacityExceeded` are terminal: no partial
/// configuration is returned alongside them.
#[derive(Debug, Clone, thiserror::Error)]
#[non_exhaustive]
pub enum CapacityError {
    #[error(
        "Weights size exceeds available memory ({weights_mib} MiB / {free_mib} MiB free). Try running a smaller model, using a smaller precision, or using a device with more memory.",
        weights_mib = crate::report::mib(.weights_bytes),
        free_mib = crate::report::mib(.free_memory_bytes)
    )]
    WeightsTooLarge {
        weights_bytes: u64,
        free_memory_bytes: u64,
    },

    #[error("{message}")]
    CapacityExceeded {
        /// Human-readable remediation.
        message: String,
        /// Structured form of the suggestions contained in `message`.
        suggestions: Vec<Suggestion>,
        weights_bytes: u64,
        cache_bytes: u64,
        total_bytes: u64,
        free_memory_bytes: u64,
    },

    #[error("Device stats unavailable: {0}")]
    DeviceStatsUnavailable(String),

    #[error("Refusing to override existing architecture for '{0}'")]
    DuplicateArchitecture(String),

    #[error("Architecture '{0}' is not registered")]
    UnknownArchitecture(String),

    #[error("quantization_encoding of '{encoding}' not supported by architecture '{architecture}'")]
    UnsupportedEncoding {
        architecture: String,
        encoding: SupportedEncoding,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Config error: {0}")]
    Config(String),
}

impl CapacityError {
    /// Whether this error means the requested deployment cannot fit in memory.
    pub fn is_out_of_memory(&self) -> bool {
        matches!(
            self,
            Self::WeightsTooLarge { .. } | Self::CapacityExceeded { .. }
        )
    }
}

/// Result type for capacity operations
pub type CapacityResult<T> = Result<T, CapacityError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weights_too_large_message_in_mib() {
        let err = CapacityError::WeightsTooLarge {
            weights_bytes: 20 * 1024 * 1024 * 1024,
            free_memory_bytes: 16 * 1024 * 1024 * 1024,
        };
        let msg = err.to_string();
        assert!(msg.starts_with("Weights size exceeds available memory (20480 MiB / 16384 MiB free)"));
        assert!(err.is_out_of_memory());
    }

    #[test]
    fn test_registry_errors_are_not_oom() {
        assert!(!CapacityError::UnknownArchitecture("x".into()).is_out_of_memory());
        assert!(!CapacityError::DeviceStatsUnavailable("x".into()).is_out_of_memory());
    }
}
