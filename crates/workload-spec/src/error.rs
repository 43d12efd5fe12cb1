//! Workload specification errors

use thiserror::Error;

/// Errors raised while loading or validating static collector configuration
#[derive(Debug, Error)]
pub enum SpecError {
    /// The collector configuration file could not be read
    #[error("Failed to read collector configuration {path}: {source}")]
    ConfigRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The collector configuration file is not valid YAML for the expected schema
    #[error("Failed to parse collector configuration: {0}")]
    ConfigParse(#[from] serde_yaml::Error),

    /// A collector definition is present but unusable
    #[error("Invalid collector definition for source type {source_type}: {reason}")]
    InvalidDefinition { source_type: String, reason: String },
}
