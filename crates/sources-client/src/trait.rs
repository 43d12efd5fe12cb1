//! SourcesApi trait for mocking
//!
//! This trait abstracts the registry client to enable mocking in unit tests.
//! The concrete `SourcesClient` implements this trait, and tests can use mock implementations.

use crate::error::SourcesError;
use crate::models::*;

/// Read-only registry operations used to build the desired workload set
///
/// All async methods must be `Send` to work with Tokio's work-stealing runtime.
#[async_trait::async_trait]
pub trait SourcesApi: Send + Sync {
    /// All tenants known to the inventory registry (every page)
    async fn list_tenants(&self) -> Result<Vec<Tenant>, SourcesError>;

    /// All source types (every page)
    async fn list_source_types(&self) -> Result<Vec<SourceType>, SourcesError>;

    /// All sources registered by a tenant (every page)
    async fn list_sources(&self, tenant: &str) -> Result<Vec<RegisteredSource>, SourcesError>;

    /// Endpoints of a source (first page only, callers take the first result)
    async fn list_endpoints(&self, tenant: &str, source_id: &str) -> Result<Vec<Endpoint>, SourcesError>;

    /// Authentications of an endpoint (first page only, callers take the first result)
    async fn list_authentications(
        &self,
        tenant: &str,
        endpoint_id: &str,
    ) -> Result<Vec<Authentication>, SourcesError>;
}
