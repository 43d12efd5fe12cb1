//! Test utilities for unit testing the reconcilers
//!
//! This module provides helpers for creating test data and setting up test scenarios.

use crate::metrics::Metrics;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use sources_client::{Authentication, Endpoint, MockSourcesClient};
use std::collections::BTreeMap;
use std::sync::Arc;
use workload_spec::{CollectorDefinition, CollectorDefinitions, Credential, EndpointSpec, WorkloadSpec};

/// Spec for source `id` running `image` in the "collectors" namespace
pub fn test_spec(id: &str, image: &str) -> WorkloadSpec {
    WorkloadSpec {
        endpoint: EndpointSpec {
            host: format!("host-{}.example.com", id),
            path: Some("/api".to_string()),
            port: Some(443),
            scheme: Some("https".to_string()),
        },
        image: image.to_string(),
        image_namespace: "collectors".to_string(),
        source_id: id.to_string(),
        source_uid: format!("uid-{}", id),
        credential: Credential::new(format!("user-{}", id), format!("pw-{}", id)),
    }
}

/// Deployment carrying only a name and labels
pub fn labelled_deployment(name: &str, labels: BTreeMap<String, String>) -> Deployment {
    Deployment {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            labels: Some(labels),
            ..Default::default()
        },
        ..Default::default()
    }
}

/// Collector definition
pub fn definition(image: &str, sources_per_collector: Option<usize>) -> CollectorDefinition {
    CollectorDefinition {
        image: image.to_string(),
        image_namespace: "collectors".to_string(),
        sources_per_collector,
    }
}

/// Definition table from `(source type, definition)` pairs
pub fn definitions(entries: Vec<(&str, CollectorDefinition)>) -> Arc<CollectorDefinitions> {
    Arc::new(CollectorDefinitions::from_definitions(
        entries
            .into_iter()
            .map(|(name, definition)| (name.to_string(), definition)),
    ))
}

/// Metrics on a private registry
pub fn test_metrics() -> Arc<Metrics> {
    Arc::new(Metrics::new().unwrap())
}

/// Register a fully eligible source (endpoint, authentication and password)
///
/// Endpoint and authentication ids are derived from the source id.
pub fn register_source(
    registry: &MockSourcesClient,
    tenant: &str,
    source_id: &str,
    source_type_id: &str,
) {
    registry.add_source(tenant, source_id, &format!("uid-{}", source_id), source_type_id);
    add_endpoint(registry, source_id);
    add_authentication(registry, source_id, &format!("pw-{}", source_id));
}

/// Attach endpoint `e<source_id>` to a source
pub fn add_endpoint(registry: &MockSourcesClient, source_id: &str) {
    registry.add_endpoint(
        source_id,
        Endpoint {
            id: format!("e{}", source_id),
            host: Some(format!("host-{}.example.com", source_id)),
            path: Some("/api".to_string()),
            port: Some(443),
            scheme: Some("https".to_string()),
            default: Some(true),
        },
    );
}

/// Attach authentication `a<source_id>` with a password to endpoint `e<source_id>`
pub fn add_authentication(registry: &MockSourcesClient, source_id: &str, password: &str) {
    let authentication_id = format!("a{}", source_id);
    registry.add_authentication(
        &format!("e{}", source_id),
        Authentication {
            id: authentication_id.clone(),
            authtype: Some("basic".to_string()),
            username: Some(format!("user-{}", source_id)),
        },
    );
    registry.set_credential(&authentication_id, &format!("user-{}", source_id), password);
}
