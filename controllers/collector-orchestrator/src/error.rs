//! Controller-specific error types.
//!
//! This module defines error types specific to the collector orchestrator
//! that are not covered by upstream library errors.

use kube::Error as KubeError;
use sources_client::SourcesError;
use thiserror::Error;
use workload_spec::SpecError;

/// Errors that can occur in the collector orchestrator.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Kubernetes API error
    #[error("Kubernetes error: {0}")]
    Kube(#[from] KubeError),

    /// Source or inventory registry error
    #[error("Registry error: {0}")]
    Sources(#[from] SourcesError),

    /// Collector definition error
    #[error("Collector configuration error: {0}")]
    Spec(#[from] SpecError),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Cluster operation failed without an API error (e.g., object without a name)
    #[error("Cluster operation failed: {0}")]
    Cluster(String),

    /// Grouping object required by a grouped workload is missing
    #[error("Grouping object not found: {0}")]
    MissingGrouping(String),

    /// Metrics registry error
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    /// Metrics server error
    #[error("Metrics server error: {0}")]
    Server(#[from] std::io::Error),
}
