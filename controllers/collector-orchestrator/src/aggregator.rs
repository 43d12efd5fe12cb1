//! Source aggregator
//!
//! Walks the registries and builds the desired workload set: one
//! `WorkloadSpec` per registered source whose type has a collector definition
//! and which has an endpoint, an authentication and a resolvable password.
//! Any registry error aborts the whole walk so a partial snapshot never
//! reaches the reconcilers.

use crate::error::ControllerError;
use futures::future::try_join_all;
use sources_client::{CredentialResolver, RegisteredSource, SourcesApi};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, info};
use workload_spec::{CollectorDefinitions, EndpointSpec, Identity, WorkloadSpec};

/// A desired workload together with the source type it was derived from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesiredWorkload {
    pub source_type: String,
    pub spec: WorkloadSpec,
}

/// Desired workloads keyed by identity
pub type DesiredSet = BTreeMap<Identity, DesiredWorkload>;

/// Builds the desired set from the registries
pub struct SourceAggregator {
    sources: Arc<dyn SourcesApi>,
    credentials: Arc<dyn CredentialResolver>,
    definitions: Arc<CollectorDefinitions>,
}

impl SourceAggregator {
    pub fn new(
        sources: Arc<dyn SourcesApi>,
        credentials: Arc<dyn CredentialResolver>,
        definitions: Arc<CollectorDefinitions>,
    ) -> Self {
        Self {
            sources,
            credentials,
            definitions,
        }
    }

    /// Collect the desired set for this tick
    pub async fn collect(&self) -> Result<DesiredSet, ControllerError> {
        let type_names: HashMap<String, String> = self
            .sources
            .list_source_types()
            .await?
            .into_iter()
            .map(|t| (t.id, t.name))
            .collect();

        let mut desired = DesiredSet::new();
        let tenants = self.sources.list_tenants().await?;

        // Tenants are independent; the first failure still aborts the walk
        let per_tenant = try_join_all(
            tenants
                .iter()
                .map(|tenant| self.sources.list_sources(&tenant.external_tenant)),
        )
        .await?;
        let seen: usize = per_tenant.iter().map(Vec::len).sum();

        for sources in &per_tenant {
            for source in sources {
                let Some(source_type) = type_names.get(&source.source_type_id) else {
                    debug!(
                        "Source {} has unknown source type {}, skipping",
                        source.id, source.source_type_id
                    );
                    continue;
                };

                if let Some(spec) = self.build_spec(source, source_type).await? {
                    desired.insert(
                        spec.identity(),
                        DesiredWorkload {
                            source_type: source_type.clone(),
                            spec,
                        },
                    );
                }
            }
        }

        info!(
            "Collected {} desired workloads from {} sources across {} tenants",
            desired.len(),
            seen,
            tenants.len()
        );
        Ok(desired)
    }

    /// Build the spec of one source, or `None` if it is not eligible
    async fn build_spec(
        &self,
        source: &RegisteredSource,
        source_type: &str,
    ) -> Result<Option<WorkloadSpec>, ControllerError> {
        // Unsupported types are expected; skip without noise
        let Some(definition) = self.definitions.get(source_type) else {
            return Ok(None);
        };
        let tenant = source.tenant.as_str();

        let endpoints = self.sources.list_endpoints(tenant, &source.id).await?;
        let Some(endpoint) = endpoints.into_iter().next() else {
            debug!("Source {} has no endpoint, skipping", source.id);
            return Ok(None);
        };
        let Some(host) = endpoint.host.filter(|h| !h.is_empty()) else {
            debug!("Endpoint {} of source {} has no host, skipping", endpoint.id, source.id);
            return Ok(None);
        };

        let authentications = self.sources.list_authentications(tenant, &endpoint.id).await?;
        let Some(authentication) = authentications.into_iter().next() else {
            debug!("Endpoint {} of source {} has no authentication, skipping", endpoint.id, source.id);
            return Ok(None);
        };

        let Some(credential) = self
            .credentials
            .resolve_credential(&authentication.id, tenant)
            .await?
        else {
            debug!(
                "Authentication {} of source {} has no password, skipping",
                authentication.id, source.id
            );
            return Ok(None);
        };

        Ok(Some(WorkloadSpec {
            endpoint: EndpointSpec {
                host,
                path: endpoint.path,
                port: endpoint.port,
                scheme: endpoint.scheme,
            },
            image: definition.image.clone(),
            image_namespace: definition.image_namespace.clone(),
            source_id: source.id.clone(),
            source_uid: source.uid.clone(),
            credential,
        }))
    }
}
