//! Cluster API seam
//!
//! `ClusterApi` covers the three object kinds the orchestrator manages
//! (Deployment, Secret, ConfigMap) in a single namespace. `KubeCluster`
//! implements it with `kube::Api` handles built once from one `kube::Client`;
//! tests use the in-memory `MockCluster`.

#[cfg(test)]
pub mod mock;

use crate::error::ControllerError;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{ConfigMap, Secret};
use kube::api::{Api, DeleteParams, ListParams, Patch, PatchParams, PostParams};
use kube::{Client, Resource};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt::Debug;
use tracing::debug;

/// Operations on the managed cluster objects
///
/// Delete operations return whether the object existed; deleting a missing
/// object is not an error.
#[async_trait::async_trait]
pub trait ClusterApi: Send + Sync {
    /// List deployments matching a label selector
    async fn list_deployments(&self, selector: &str) -> Result<Vec<Deployment>, ControllerError>;

    /// List secrets matching a label selector
    async fn list_secrets(&self, selector: &str) -> Result<Vec<Secret>, ControllerError>;

    /// List config maps matching a label selector
    async fn list_config_maps(&self, selector: &str) -> Result<Vec<ConfigMap>, ControllerError>;

    /// Fetch a config map by name
    async fn get_config_map(&self, name: &str) -> Result<Option<ConfigMap>, ControllerError>;

    /// Create a deployment; returns `false` if one with the same name already exists
    async fn create_deployment(&self, deployment: &Deployment) -> Result<bool, ControllerError>;

    /// Create a secret, replacing an existing one of the same name
    async fn upsert_secret(&self, secret: &Secret) -> Result<(), ControllerError>;

    /// Create a config map, replacing an existing one of the same name
    async fn upsert_config_map(&self, config_map: &ConfigMap) -> Result<(), ControllerError>;

    /// Patch the image of one container; returns `false` if the deployment is gone
    async fn patch_deployment_image(
        &self,
        name: &str,
        container: &str,
        image: &str,
    ) -> Result<bool, ControllerError>;

    /// Delete a deployment
    async fn delete_deployment(&self, name: &str) -> Result<bool, ControllerError>;

    /// Delete a secret
    async fn delete_secret(&self, name: &str) -> Result<bool, ControllerError>;

    /// Delete a config map
    async fn delete_config_map(&self, name: &str) -> Result<bool, ControllerError>;
}

/// `ClusterApi` backed by the Kubernetes API server
#[derive(Clone)]
pub struct KubeCluster {
    deployments: Api<Deployment>,
    secrets: Api<Secret>,
    config_maps: Api<ConfigMap>,
}

impl KubeCluster {
    /// Build namespaced API handles from one client
    pub fn new(client: Client, namespace: &str) -> Self {
        Self {
            deployments: Api::namespaced(client.clone(), namespace),
            secrets: Api::namespaced(client.clone(), namespace),
            config_maps: Api::namespaced(client, namespace),
        }
    }
}

async fn list<K>(api: &Api<K>, selector: &str) -> Result<Vec<K>, ControllerError>
where
    K: Clone + DeserializeOwned + Debug,
{
    let params = ListParams::default().labels(selector);
    Ok(api.list(&params).await?.items)
}

async fn delete<K>(api: &Api<K>, name: &str) -> Result<bool, ControllerError>
where
    K: Clone + DeserializeOwned + Debug,
{
    match api.delete(name, &DeleteParams::background()).await {
        Ok(_) => Ok(true),
        Err(kube::Error::Api(ae)) if ae.code == 404 => {
            debug!("{} already deleted", name);
            Ok(false)
        }
        Err(e) => Err(e.into()),
    }
}

fn object_name<K: Resource>(object: &K) -> Result<String, ControllerError> {
    object
        .meta()
        .name
        .clone()
        .ok_or_else(|| ControllerError::Cluster("object has no name".to_string()))
}

async fn upsert<K>(api: &Api<K>, object: &K) -> Result<(), ControllerError>
where
    K: Resource + Clone + DeserializeOwned + Serialize + Debug,
{
    let name = object_name(object)?;
    match api.create(&PostParams::default(), object).await {
        Ok(_) => Ok(()),
        Err(kube::Error::Api(ae)) if ae.code == 409 => {
            debug!("{} already exists, replacing", name);
            api.replace(&name, &PostParams::default(), object).await?;
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

#[async_trait::async_trait]
impl ClusterApi for KubeCluster {
    async fn list_deployments(&self, selector: &str) -> Result<Vec<Deployment>, ControllerError> {
        list(&self.deployments, selector).await
    }

    async fn list_secrets(&self, selector: &str) -> Result<Vec<Secret>, ControllerError> {
        list(&self.secrets, selector).await
    }

    async fn list_config_maps(&self, selector: &str) -> Result<Vec<ConfigMap>, ControllerError> {
        list(&self.config_maps, selector).await
    }

    async fn get_config_map(&self, name: &str) -> Result<Option<ConfigMap>, ControllerError> {
        Ok(self.config_maps.get_opt(name).await?)
    }

    async fn create_deployment(&self, deployment: &Deployment) -> Result<bool, ControllerError> {
        let name = object_name(deployment)?;
        match self.deployments.create(&PostParams::default(), deployment).await {
            Ok(_) => Ok(true),
            Err(kube::Error::Api(ae)) if ae.code == 409 => {
                debug!("Deployment {} already exists", name);
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn upsert_secret(&self, secret: &Secret) -> Result<(), ControllerError> {
        upsert(&self.secrets, secret).await
    }

    async fn upsert_config_map(&self, config_map: &ConfigMap) -> Result<(), ControllerError> {
        upsert(&self.config_maps, config_map).await
    }

    async fn patch_deployment_image(
        &self,
        name: &str,
        container: &str,
        image: &str,
    ) -> Result<bool, ControllerError> {
        let patch = serde_json::json!({
            "spec": {
                "template": {
                    "spec": {
                        "containers": [{"name": container, "image": image}]
                    }
                }
            }
        });
        match self
            .deployments
            .patch(name, &PatchParams::default(), &Patch::Strategic(&patch))
            .await
        {
            Ok(_) => Ok(true),
            Err(kube::Error::Api(ae)) if ae.code == 404 => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete_deployment(&self, name: &str) -> Result<bool, ControllerError> {
        delete(&self.deployments, name).await
    }

    async fn delete_secret(&self, name: &str) -> Result<bool, ControllerError> {
        delete(&self.secrets, name).await
    }

    async fn delete_config_map(&self, name: &str) -> Result<bool, ControllerError> {
        delete(&self.config_maps, name).await
    }
}
