use mofa_capacity::CapacityError;

#[derive(thiserror::Error, Debug)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error(transparent)]
    Capacity(#[from] CapacityError),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}
