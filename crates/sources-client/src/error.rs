//! Registry client errors

use thiserror::Error;

/// Errors that can occur when talking to the source or inventory registry
#[derive(Debug, Error)]
pub enum SourcesError {
    /// HTTP request/response error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Registry returned a non-success status
    #[error("Registry API error: {0}")]
    Api(String),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// A configured registry URL is not usable
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Pagination links did not terminate
    #[error("Pagination error: {0}")]
    Pagination(String),
}
