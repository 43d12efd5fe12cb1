//! In-memory `ClusterApi` for unit tests
//!
//! Objects live in per-kind maps keyed by name. Every mutating call is
//! recorded so tests can assert on the exact operations issued, and any
//! call can be made to fail for a given object name.

use super::ClusterApi;
use crate::error::ControllerError;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{ConfigMap, Secret};
use kube::Resource;
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};

/// A call made against the mock cluster
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Call {
    CreateDeployment(String),
    UpsertSecret(String),
    UpsertConfigMap(String),
    PatchImage(String, String),
    DeleteDeployment(String),
    DeleteSecret(String),
    DeleteConfigMap(String),
}

/// Call kinds that can be made to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    List,
    CreateDeployment,
    UpsertSecret,
    UpsertConfigMap,
    PatchImage,
    DeleteDeployment,
    DeleteSecret,
    DeleteConfigMap,
}

#[derive(Default)]
struct State {
    deployments: BTreeMap<String, Deployment>,
    secrets: BTreeMap<String, Secret>,
    config_maps: BTreeMap<String, ConfigMap>,
    calls: Vec<Call>,
    // (verb, object name); an empty name fails every object
    failures: HashSet<(Verb, String)>,
}

impl State {
    fn check(&self, verb: Verb, name: &str) -> Result<(), ControllerError> {
        if self.failures.contains(&(verb, name.to_string()))
            || self.failures.contains(&(verb, String::new()))
        {
            return Err(ControllerError::Cluster(format!(
                "injected {:?} failure for {}",
                verb, name
            )));
        }
        Ok(())
    }
}

/// Mock cluster sharing state across clones
#[derive(Clone, Default)]
pub struct MockCluster {
    state: Arc<Mutex<State>>,
}

/// True if every `key=value` term of the selector matches the labels
pub fn selector_matches(selector: &str, labels: Option<&BTreeMap<String, String>>) -> bool {
    selector
        .split(',')
        .filter(|term| !term.is_empty())
        .all(|term| match term.split_once('=') {
            Some((key, value)) => labels
                .and_then(|l| l.get(key))
                .is_some_and(|v| v == value),
            None => false,
        })
}

fn name_of<K: Resource>(object: &K) -> String {
    object.meta().name.clone().unwrap_or_default()
}

fn matching<K: Resource + Clone>(objects: &BTreeMap<String, K>, selector: &str) -> Vec<K> {
    objects
        .values()
        .filter(|o| selector_matches(selector, o.meta().labels.as_ref()))
        .cloned()
        .collect()
}

impl MockCluster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a deployment without recording a call
    pub fn insert_deployment(&self, deployment: Deployment) {
        let mut state = self.state.lock().unwrap();
        state.deployments.insert(name_of(&deployment), deployment);
    }

    /// Seed a secret without recording a call
    pub fn insert_secret(&self, secret: Secret) {
        let mut state = self.state.lock().unwrap();
        state.secrets.insert(name_of(&secret), secret);
    }

    /// Seed a config map without recording a call
    pub fn insert_config_map(&self, config_map: ConfigMap) {
        let mut state = self.state.lock().unwrap();
        state.config_maps.insert(name_of(&config_map), config_map);
    }

    /// Make `verb` fail for `name` (empty name: for every object)
    pub fn fail(&self, verb: Verb, name: &str) {
        self.state
            .lock()
            .unwrap()
            .failures
            .insert((verb, name.to_string()));
    }

    pub fn clear_failures(&self) {
        self.state.lock().unwrap().failures.clear();
    }

    /// Calls recorded so far
    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Forget recorded calls
    pub fn reset_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }

    pub fn deployment(&self, name: &str) -> Option<Deployment> {
        self.state.lock().unwrap().deployments.get(name).cloned()
    }

    pub fn secret(&self, name: &str) -> Option<Secret> {
        self.state.lock().unwrap().secrets.get(name).cloned()
    }

    pub fn config_map(&self, name: &str) -> Option<ConfigMap> {
        self.state.lock().unwrap().config_maps.get(name).cloned()
    }

    pub fn deployment_names(&self) -> Vec<String> {
        self.state.lock().unwrap().deployments.keys().cloned().collect()
    }

    pub fn secret_names(&self) -> Vec<String> {
        self.state.lock().unwrap().secrets.keys().cloned().collect()
    }

    pub fn config_map_names(&self) -> Vec<String> {
        self.state.lock().unwrap().config_maps.keys().cloned().collect()
    }

    /// Remove a deployment out of band (no call recorded)
    pub fn remove_deployment(&self, name: &str) {
        self.state.lock().unwrap().deployments.remove(name);
    }

    /// Remove a secret out of band (no call recorded)
    pub fn remove_secret(&self, name: &str) {
        self.state.lock().unwrap().secrets.remove(name);
    }

    /// Remove a config map out of band (no call recorded)
    pub fn remove_config_map(&self, name: &str) {
        self.state.lock().unwrap().config_maps.remove(name);
    }
}

#[async_trait::async_trait]
impl ClusterApi for MockCluster {
    async fn list_deployments(&self, selector: &str) -> Result<Vec<Deployment>, ControllerError> {
        let state = self.state.lock().unwrap();
        state.check(Verb::List, "deployments")?;
        Ok(matching(&state.deployments, selector))
    }

    async fn list_secrets(&self, selector: &str) -> Result<Vec<Secret>, ControllerError> {
        let state = self.state.lock().unwrap();
        state.check(Verb::List, "secrets")?;
        Ok(matching(&state.secrets, selector))
    }

    async fn list_config_maps(&self, selector: &str) -> Result<Vec<ConfigMap>, ControllerError> {
        let state = self.state.lock().unwrap();
        state.check(Verb::List, "configmaps")?;
        Ok(matching(&state.config_maps, selector))
    }

    async fn get_config_map(&self, name: &str) -> Result<Option<ConfigMap>, ControllerError> {
        Ok(self.state.lock().unwrap().config_maps.get(name).cloned())
    }

    async fn create_deployment(&self, deployment: &Deployment) -> Result<bool, ControllerError> {
        let name = name_of(deployment);
        let mut state = self.state.lock().unwrap();
        state.check(Verb::CreateDeployment, &name)?;
        state.calls.push(Call::CreateDeployment(name.clone()));
        if state.deployments.contains_key(&name) {
            return Ok(false);
        }
        state.deployments.insert(name, deployment.clone());
        Ok(true)
    }

    async fn upsert_secret(&self, secret: &Secret) -> Result<(), ControllerError> {
        let name = name_of(secret);
        let mut state = self.state.lock().unwrap();
        state.check(Verb::UpsertSecret, &name)?;
        state.calls.push(Call::UpsertSecret(name.clone()));
        state.secrets.insert(name, secret.clone());
        Ok(())
    }

    async fn upsert_config_map(&self, config_map: &ConfigMap) -> Result<(), ControllerError> {
        let name = name_of(config_map);
        let mut state = self.state.lock().unwrap();
        state.check(Verb::UpsertConfigMap, &name)?;
        state.calls.push(Call::UpsertConfigMap(name.clone()));
        state.config_maps.insert(name, config_map.clone());
        Ok(())
    }

    async fn patch_deployment_image(
        &self,
        name: &str,
        container: &str,
        image: &str,
    ) -> Result<bool, ControllerError> {
        let mut state = self.state.lock().unwrap();
        state.check(Verb::PatchImage, name)?;
        state
            .calls
            .push(Call::PatchImage(name.to_string(), image.to_string()));
        let Some(deployment) = state.deployments.get_mut(name) else {
            return Ok(false);
        };
        let containers = deployment
            .spec
            .as_mut()
            .and_then(|s| s.template.spec.as_mut())
            .map(|p| &mut p.containers);
        if let Some(containers) = containers {
            for c in containers.iter_mut().filter(|c| c.name == container) {
                c.image = Some(image.to_string());
            }
        }
        Ok(true)
    }

    async fn delete_deployment(&self, name: &str) -> Result<bool, ControllerError> {
        let mut state = self.state.lock().unwrap();
        state.check(Verb::DeleteDeployment, name)?;
        state.calls.push(Call::DeleteDeployment(name.to_string()));
        Ok(state.deployments.remove(name).is_some())
    }

    async fn delete_secret(&self, name: &str) -> Result<bool, ControllerError> {
        let mut state = self.state.lock().unwrap();
        state.check(Verb::DeleteSecret, name)?;
        state.calls.push(Call::DeleteSecret(name.to_string()));
        Ok(state.secrets.remove(name).is_some())
    }

    async fn delete_config_map(&self, name: &str) -> Result<bool, ControllerError> {
        let mut state = self.state.lock().unwrap();
        state.check(Verb::DeleteConfigMap, name)?;
        state.calls.push(Call::DeleteConfigMap(name.to_string()));
        Ok(state.config_maps.remove(name).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selector_matches() {
        let labels = BTreeMap::from([
            ("a".to_string(), "1".to_string()),
            ("b".to_string(), "2".to_string()),
        ]);
        assert!(selector_matches("a=1", Some(&labels)));
        assert!(selector_matches("a=1,b=2", Some(&labels)));
        assert!(!selector_matches("a=1,b=3", Some(&labels)));
        assert!(!selector_matches("c=1", Some(&labels)));
        assert!(!selector_matches("a=1", None));
        assert!(selector_matches("", None));
    }
}
