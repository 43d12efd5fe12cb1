//! Cluster state reader
//!
//! Lists the per-source objects carrying the marker labels and keys them by
//! the identity label. Objects without a valid identity label are ignored.

use crate::cluster::ClusterApi;
use crate::error::ControllerError;
use kube::Resource;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::warn;
use workload_spec::Identity;
use workload_spec::labels::{IDENTITY_LABEL, source_selector};

/// Observed identities mapped to the name of the object carrying them
pub type ObservedSet = BTreeMap<Identity, String>;

/// Reads the observed per-source state from the cluster
#[derive(Clone)]
pub struct ClusterStateReader {
    cluster: Arc<dyn ClusterApi>,
}

fn identity_of<K: Resource>(object: &K) -> Option<Identity> {
    object
        .meta()
        .labels
        .as_ref()?
        .get(IDENTITY_LABEL)
        .and_then(|value| Identity::from_label(value))
}

fn index<K: Resource>(objects: Vec<K>, kind: &str) -> ObservedSet {
    let mut observed = ObservedSet::new();
    for object in objects {
        let name = object.meta().name.clone().unwrap_or_default();
        let Some(identity) = identity_of(&object) else {
            warn!("{} {} has no valid identity label, ignoring", kind, name);
            continue;
        };
        if let Some(previous) = observed.insert(identity.clone(), name.clone()) {
            warn!(
                "{} {} and {} share identity {}",
                kind,
                previous,
                name,
                identity.short()
            );
        }
    }
    observed
}

impl ClusterStateReader {
    pub fn new(cluster: Arc<dyn ClusterApi>) -> Self {
        Self { cluster }
    }

    /// Identities of the running per-source workloads
    pub async fn list_observed(&self) -> Result<ObservedSet, ControllerError> {
        let deployments = self.cluster.list_deployments(&source_selector()).await?;
        Ok(index(deployments, "Deployment"))
    }

    /// Identities of the per-source credentials objects
    pub async fn list_credentials(&self) -> Result<ObservedSet, ControllerError> {
        let secrets = self.cluster.list_secrets(&source_selector()).await?;
        Ok(index(secrets, "Secret"))
    }
}
