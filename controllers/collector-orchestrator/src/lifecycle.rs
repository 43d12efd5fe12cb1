//! Resource lifecycle manager
//!
//! Owns the create and delete protocol for the objects paired with one
//! identity. The credentials object is written before its workload and
//! removed after it; every step is idempotent so an interrupted sequence is
//! completed by the next tick.

use crate::cluster::ClusterApi;
use crate::error::ControllerError;
use crate::workload::{
    CONTAINER_NAME, group_config_map, group_deployment, group_secret, source_deployment,
    source_secret,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};
use workload_spec::labels::{
    credentials_name, group_config_name, group_labels, identity_selector, source_labels,
    workload_name,
};
use workload_spec::{Credential, Identity, WorkloadSpec};

/// Names and labels of the three objects belonging to one grouping
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupObjects {
    pub group_id: String,
    pub source_type: String,
    pub workload_name: String,
    pub labels: BTreeMap<String, String>,
}

impl GroupObjects {
    pub fn new(group_id: &str, source_type: &str) -> Self {
        Self {
            group_id: group_id.to_string(),
            source_type: source_type.to_string(),
            workload_name: workload_spec::labels::group_workload_name(source_type, group_id),
            labels: group_labels(group_id, source_type),
        }
    }

    pub fn config_name(&self) -> String {
        group_config_name(&self.workload_name)
    }

    pub fn credentials_name(&self) -> String {
        credentials_name(&self.workload_name)
    }
}

/// Creates, updates and deletes the managed objects
pub struct LifecycleManager {
    cluster: Arc<dyn ClusterApi>,
    namespace: String,
}

impl LifecycleManager {
    pub fn new(cluster: Arc<dyn ClusterApi>, namespace: impl Into<String>) -> Self {
        Self {
            cluster,
            namespace: namespace.into(),
        }
    }

    /// Create the credentials object and then the workload for one source
    ///
    /// Returns `false` when the workload already existed.
    pub async fn create(&self, identity: &Identity, spec: &WorkloadSpec) -> Result<bool, ControllerError> {
        let name = workload_name(&spec.source_id, identity);
        let secret_name = credentials_name(&name);
        let labels = source_labels(identity, &spec.source_id);

        let secret = source_secret(&self.namespace, &secret_name, &labels, &spec.credential);
        self.cluster.upsert_secret(&secret).await?;

        let deployment = source_deployment(&self.namespace, &name, &labels, identity, spec);
        let created = self.cluster.create_deployment(&deployment).await?;
        if created {
            info!(
                "Created workload {} for source {} (identity {})",
                name,
                spec.source_id,
                identity.short()
            );
        } else {
            debug!("Workload {} already exists", name);
        }
        Ok(created)
    }

    /// Rewrite the credentials object of a workload that is already running
    pub async fn restore_credentials(&self, identity: &Identity, spec: &WorkloadSpec) -> Result<(), ControllerError> {
        let secret_name = credentials_name(&workload_name(&spec.source_id, identity));
        let labels = source_labels(identity, &spec.source_id);
        let secret = source_secret(&self.namespace, &secret_name, &labels, &spec.credential);
        self.cluster.upsert_secret(&secret).await?;
        info!("Restored credentials {} (identity {})", secret_name, identity.short());
        Ok(())
    }

    /// Delete the workload carrying `identity` and then its credentials object
    ///
    /// Returns `false` when no workload carried the identity.
    pub async fn delete(&self, identity: &Identity) -> Result<bool, ControllerError> {
        let deployments = self
            .cluster
            .list_deployments(&identity_selector(identity))
            .await?;
        if deployments.is_empty() {
            debug!("No workload carries identity {}", identity.short());
            return Ok(false);
        }

        for deployment in deployments {
            let Some(name) = deployment.metadata.name else {
                continue;
            };
            self.cluster.delete_deployment(&name).await?;
            self.cluster.delete_secret(&credentials_name(&name)).await?;
            info!("Deleted workload {} (identity {})", name, identity.short());
        }
        Ok(true)
    }

    /// Delete a credentials object by name
    pub async fn delete_credentials(&self, name: &str) -> Result<bool, ControllerError> {
        self.cluster.delete_secret(name).await
    }

    /// Patch the collector image of an existing workload in place
    pub async fn update_image(&self, name: &str, image: &str) -> Result<bool, ControllerError> {
        let patched = self
            .cluster
            .patch_deployment_image(name, CONTAINER_NAME, image)
            .await?;
        if patched {
            info!("Updated image of workload {} to {}", name, image);
        }
        Ok(patched)
    }

    /// Write a grouping's credentials object and then its member list
    pub async fn write_group<'a>(
        &self,
        group: &GroupObjects,
        created_at: &str,
        members_json: String,
        credentials: impl IntoIterator<Item = (&'a Identity, &'a Credential)>,
    ) -> Result<(), ControllerError> {
        let secret = group_secret(
            &self.namespace,
            &group.credentials_name(),
            &group.labels,
            credentials,
        );
        self.cluster.upsert_secret(&secret).await?;

        let config_map = group_config_map(
            &self.namespace,
            &group.config_name(),
            &group.labels,
            created_at,
            members_json,
        );
        self.cluster.upsert_config_map(&config_map).await
    }

    /// Create the workload of a grouping whose objects are already written
    ///
    /// Fails with `MissingGrouping` if the grouping ConfigMap is gone.
    pub async fn create_group_workload(
        &self,
        group: &GroupObjects,
        image: &str,
    ) -> Result<bool, ControllerError> {
        let config_name = group.config_name();
        if self.cluster.get_config_map(&config_name).await?.is_none() {
            return Err(ControllerError::MissingGrouping(config_name));
        }

        let deployment = group_deployment(
            &self.namespace,
            &group.workload_name,
            &group.labels,
            &group.group_id,
            &group.source_type,
            image,
        );
        let created = self.cluster.create_deployment(&deployment).await?;
        if created {
            info!(
                "Created grouped workload {} for source type {}",
                group.workload_name, group.source_type
            );
        }
        Ok(created)
    }

    /// Delete a grouping: workload, then credentials object, then ConfigMap
    pub async fn delete_group(&self, workload_name: &str) -> Result<(), ControllerError> {
        self.cluster.delete_deployment(workload_name).await?;
        self.cluster
            .delete_secret(&credentials_name(workload_name))
            .await?;
        self.cluster
            .delete_config_map(&group_config_name(workload_name))
            .await?;
        info!("Deleted grouping {}", workload_name);
        Ok(())
    }

    /// Delete a grouped workload that lost its grouping, and its credentials
    pub async fn delete_orphan_workload(&self, workload_name: &str) -> Result<(), ControllerError> {
        self.cluster.delete_deployment(workload_name).await?;
        self.cluster
            .delete_secret(&credentials_name(workload_name))
            .await?;
        info!("Deleted orphaned grouped workload {}", workload_name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::mock::{Call, MockCluster, Verb};
    use crate::test_utils::test_spec;

    fn manager(cluster: &MockCluster) -> LifecycleManager {
        LifecycleManager::new(Arc::new(cluster.clone()), "collectors")
    }

    #[tokio::test]
    async fn test_create_writes_credentials_before_workload() {
        let cluster = MockCluster::new();
        let spec = test_spec("7", "collector-a");
        let identity = spec.identity();
        let name = workload_name("7", &identity);

        assert!(manager(&cluster).create(&identity, &spec).await.unwrap());
        assert_eq!(
            cluster.calls(),
            vec![
                Call::UpsertSecret(credentials_name(&name)),
                Call::CreateDeployment(name.clone()),
            ]
        );
        let secret = cluster.secret(&credentials_name(&name)).unwrap();
        assert_eq!(secret.metadata.namespace.as_deref(), Some("collectors"));
    }

    #[tokio::test]
    async fn test_create_is_idempotent_on_retry() {
        let cluster = MockCluster::new();
        let spec = test_spec("7", "collector-a");
        let identity = spec.identity();
        let lifecycle = manager(&cluster);

        assert!(lifecycle.create(&identity, &spec).await.unwrap());
        assert!(!lifecycle.create(&identity, &spec).await.unwrap());
        assert_eq!(cluster.deployment_names().len(), 1);
        assert_eq!(cluster.secret_names().len(), 1);
    }

    #[tokio::test]
    async fn test_create_stops_when_credentials_fail() {
        let cluster = MockCluster::new();
        let spec = test_spec("7", "collector-a");
        let identity = spec.identity();
        cluster.fail(Verb::UpsertSecret, "");

        assert!(manager(&cluster).create(&identity, &spec).await.is_err());
        assert!(cluster.deployment_names().is_empty());
    }

    #[tokio::test]
    async fn test_delete_removes_workload_then_credentials() {
        let cluster = MockCluster::new();
        let spec = test_spec("7", "collector-a");
        let identity = spec.identity();
        let name = workload_name("7", &identity);
        let lifecycle = manager(&cluster);
        lifecycle.create(&identity, &spec).await.unwrap();
        cluster.reset_calls();

        assert!(lifecycle.delete(&identity).await.unwrap());
        assert_eq!(
            cluster.calls(),
            vec![
                Call::DeleteDeployment(name.clone()),
                Call::DeleteSecret(credentials_name(&name)),
            ]
        );
        assert!(cluster.secret_names().is_empty());
    }

    #[tokio::test]
    async fn test_delete_of_absent_identity_is_noop() {
        let cluster = MockCluster::new();
        let identity = test_spec("7", "collector-a").identity();

        assert!(!manager(&cluster).delete(&identity).await.unwrap());
        assert!(cluster.calls().is_empty());
    }

    #[tokio::test]
    async fn test_delete_tolerates_missing_credentials() {
        let cluster = MockCluster::new();
        let spec = test_spec("7", "collector-a");
        let identity = spec.identity();
        let name = workload_name("7", &identity);
        let lifecycle = manager(&cluster);
        lifecycle.create(&identity, &spec).await.unwrap();
        lifecycle.delete_credentials(&credentials_name(&name)).await.unwrap();

        assert!(lifecycle.delete(&identity).await.unwrap());
        assert!(cluster.deployment_names().is_empty());
    }

    #[tokio::test]
    async fn test_update_image_patches_in_place() {
        let cluster = MockCluster::new();
        let spec = test_spec("7", "collector-a");
        let identity = spec.identity();
        let name = workload_name("7", &identity);
        let lifecycle = manager(&cluster);
        lifecycle.create(&identity, &spec).await.unwrap();

        assert!(lifecycle.update_image(&name, "collectors/collector-a:v2").await.unwrap());
        let deployment = cluster.deployment(&name).unwrap();
        assert_eq!(
            crate::workload::container_image(&deployment),
            Some("collectors/collector-a:v2")
        );
        assert!(!lifecycle.update_image("missing", "x").await.unwrap());
    }

    #[tokio::test]
    async fn test_group_workload_requires_config_map() {
        let cluster = MockCluster::new();
        let group = GroupObjects::new("9f1c2d3e-0000-4000-8000-000000000000", "openshift");

        let result = manager(&cluster).create_group_workload(&group, "img").await;
        assert!(matches!(result, Err(ControllerError::MissingGrouping(_))));
        assert!(cluster.deployment_names().is_empty());
    }

    #[tokio::test]
    async fn test_delete_group_order() {
        let cluster = MockCluster::new();
        let group = GroupObjects::new("9f1c2d3e-0000-4000-8000-000000000000", "openshift");
        let lifecycle = manager(&cluster);
        lifecycle
            .write_group(&group, "2026-01-01T00:00:00Z", "[]".to_string(), [])
            .await
            .unwrap();
        lifecycle.create_group_workload(&group, "img").await.unwrap();
        cluster.reset_calls();

        lifecycle.delete_group(&group.workload_name).await.unwrap();
        assert_eq!(
            cluster.calls(),
            vec![
                Call::DeleteDeployment(group.workload_name.clone()),
                Call::DeleteSecret(group.credentials_name()),
                Call::DeleteConfigMap(group.config_name()),
            ]
        );
    }
}
