//! Grouped pairing
//!
//! Source types configured with `sources_per_collector` share workloads: each
//! grouping is a ConfigMap holding up to that many members, paired with one
//! Secret (member credentials keyed by identity) and one Deployment. The
//! grouping's id is generated once and never changes with its membership.
//!
//! Membership follows the same diff as the per-source reconciler. Removed
//! members leave their grouping, new members fill spare capacity in grouping
//! name order before new groupings are created, and an emptied grouping is
//! deleted (workload, credentials, ConfigMap). Grouped workloads and
//! credentials without a grouping are removed.

use crate::aggregator::DesiredSet;
use crate::cluster::ClusterApi;
use crate::error::ControllerError;
use crate::lifecycle::{GroupObjects, LifecycleManager};
use crate::metrics::Metrics;
use crate::reconciler::ReconcileSummary;
use crate::workload::{CREATED_AT_ANNOTATION, MEMBERS_KEY, container_image};
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::ConfigMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use workload_spec::labels::{
    GROUP_LABEL, SOURCE_TYPE_LABEL, credentials_name, group_selector, group_type_selector,
    source_type_label,
};
use workload_spec::{CollectorDefinition, CollectorDefinitions, Identity, WorkloadSpec};

/// One member of a grouping, as stored in the grouping ConfigMap
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupMember {
    pub identity: String,
    pub source_id: String,
    pub source_uid: String,
    pub host: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheme: Option<String>,
}

impl GroupMember {
    fn new(identity: &Identity, spec: &WorkloadSpec) -> Self {
        Self {
            identity: identity.to_string(),
            source_id: spec.source_id.clone(),
            source_uid: spec.source_uid.clone(),
            host: spec.endpoint.host.clone(),
            path: spec.endpoint.path.clone(),
            port: spec.endpoint.port,
            scheme: spec.endpoint.scheme.clone(),
        }
    }
}

#[derive(Debug)]
struct Grouping {
    objects: GroupObjects,
    created_at: String,
    members: BTreeMap<Identity, GroupMember>,
    added: usize,
    removed: usize,
    // Stored objects must be rewritten from `members`
    dirty: bool,
}

impl Grouping {
    fn create(source_type: &str) -> Self {
        Self {
            objects: GroupObjects::new(&uuid::Uuid::new_v4().to_string(), source_type),
            created_at: chrono::Utc::now().to_rfc3339(),
            members: BTreeMap::new(),
            added: 0,
            removed: 0,
            dirty: true,
        }
    }

    fn from_config_map(source_type: &str, config_map: &ConfigMap) -> Option<Self> {
        let name = config_map.metadata.name.as_deref().unwrap_or_default();
        let Some(group_id) = config_map
            .metadata
            .labels
            .as_ref()
            .and_then(|l| l.get(GROUP_LABEL))
        else {
            warn!("Grouping {} has no group label, ignoring", name);
            return None;
        };

        let created_at = config_map
            .metadata
            .annotations
            .as_ref()
            .and_then(|a| a.get(CREATED_AT_ANNOTATION))
            .cloned()
            .unwrap_or_else(|| chrono::Utc::now().to_rfc3339());

        let stored = config_map
            .data
            .as_ref()
            .and_then(|d| d.get(MEMBERS_KEY))
            .map(String::as_str)
            .unwrap_or("[]");
        let (listed, mut dirty) = match serde_json::from_str::<Vec<GroupMember>>(stored) {
            Ok(listed) => (listed, false),
            Err(e) => {
                warn!("Grouping {} has an unreadable member list: {}", name, e);
                (Vec::new(), true)
            }
        };

        let mut members = BTreeMap::new();
        for member in listed {
            match Identity::from_label(&member.identity) {
                Some(identity) => {
                    members.insert(identity, member);
                }
                None => {
                    warn!("Grouping {} lists malformed identity {}", name, member.identity);
                    dirty = true;
                }
            }
        }

        Some(Self {
            objects: GroupObjects::new(group_id, source_type),
            created_at,
            members,
            added: 0,
            removed: 0,
            dirty,
        })
    }

    fn add(&mut self, identity: &Identity, spec: &WorkloadSpec) {
        self.members
            .insert(identity.clone(), GroupMember::new(identity, spec));
        self.added += 1;
        self.dirty = true;
    }

    fn members_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.members.values().collect::<Vec<_>>())
    }
}

/// Reconciles grouped workloads
pub struct GroupReconciler {
    cluster: Arc<dyn ClusterApi>,
    lifecycle: Arc<LifecycleManager>,
    definitions: Arc<CollectorDefinitions>,
    metrics: Arc<Metrics>,
}

impl GroupReconciler {
    pub fn new(
        cluster: Arc<dyn ClusterApi>,
        lifecycle: Arc<LifecycleManager>,
        definitions: Arc<CollectorDefinitions>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            cluster,
            lifecycle,
            definitions,
            metrics,
        }
    }

    /// Converge every grouped source type toward its desired members
    ///
    /// `desired` maps source type names to their desired workloads. Groupings
    /// of types that are no longer grouped are emptied and deleted.
    pub async fn reconcile(
        &self,
        desired: &BTreeMap<String, DesiredSet>,
    ) -> Result<ReconcileSummary, ControllerError> {
        let empty = DesiredSet::new();
        let mut summary = ReconcileSummary::default();
        let mut grouped_labels = BTreeSet::new();

        for (source_type, definition) in self.definitions.grouped() {
            grouped_labels.insert(source_type_label(source_type));
            let members = desired.get(source_type).unwrap_or(&empty);
            summary += self
                .reconcile_type(source_type, Some(definition), members)
                .await?;
        }

        for label in self.stale_type_labels(&grouped_labels).await? {
            info!("Source type {} is no longer grouped, removing its groupings", label);
            summary += self.reconcile_type(&label, None, &empty).await?;
        }

        Ok(summary)
    }

    /// Source-type labels of grouped objects whose type is not grouped anymore
    async fn stale_type_labels(
        &self,
        grouped_labels: &BTreeSet<String>,
    ) -> Result<BTreeSet<String>, ControllerError> {
        let selector = group_selector();
        let config_maps = self.cluster.list_config_maps(&selector).await?;
        let deployments = self.cluster.list_deployments(&selector).await?;
        let secrets = self.cluster.list_secrets(&selector).await?;

        let labels = config_maps
            .iter()
            .map(|c| &c.metadata)
            .chain(deployments.iter().map(|d| &d.metadata))
            .chain(secrets.iter().map(|s| &s.metadata))
            .filter_map(|meta| meta.labels.as_ref()?.get(SOURCE_TYPE_LABEL).cloned())
            .filter(|label| !grouped_labels.contains(label))
            .collect();
        Ok(labels)
    }

    /// Converge the groupings of one source type
    async fn reconcile_type(
        &self,
        source_type: &str,
        definition: Option<&CollectorDefinition>,
        desired: &DesiredSet,
    ) -> Result<ReconcileSummary, ControllerError> {
        let selector = group_type_selector(source_type);
        let config_maps = self.cluster.list_config_maps(&selector).await?;
        let deployments: BTreeMap<String, Deployment> = self
            .cluster
            .list_deployments(&selector)
            .await?
            .into_iter()
            .filter_map(|d| Some((d.metadata.name.clone()?, d)))
            .collect();
        let secret_names: Vec<String> = self
            .cluster
            .list_secrets(&selector)
            .await?
            .into_iter()
            .filter_map(|s| s.metadata.name)
            .collect();

        let mut groups: BTreeMap<String, Grouping> = config_maps
            .iter()
            .filter_map(|c| Grouping::from_config_map(source_type, c))
            .map(|g| (g.objects.workload_name.clone(), g))
            .collect();

        let mut summary = ReconcileSummary {
            observed: groups.values().map(|g| g.members.len()).sum(),
            ..Default::default()
        };

        // Members that are no longer desired leave their grouping
        for group in groups.values_mut() {
            let before = group.members.len();
            group.members.retain(|identity, _| desired.contains_key(identity));
            group.removed = before - group.members.len();
            if group.removed > 0 {
                group.dirty = true;
            }
        }

        let placed: BTreeSet<&Identity> = groups.values().flat_map(|g| g.members.keys()).collect();
        let mut pending: VecDeque<&Identity> = desired
            .keys()
            .filter(|identity| !placed.contains(identity))
            .collect();
        drop(placed);

        if let Some(size) = definition
            .and_then(|d| d.sources_per_collector)
            .filter(|size| *size > 0)
        {
            // Spare capacity first, in grouping name order
            for group in groups.values_mut() {
                while group.members.len() < size {
                    let Some(identity) = pending.pop_front() else {
                        break;
                    };
                    group.add(identity, &desired[identity].spec);
                }
            }

            while !pending.is_empty() {
                let mut group = Grouping::create(source_type);
                while group.members.len() < size {
                    let Some(identity) = pending.pop_front() else {
                        break;
                    };
                    group.add(identity, &desired[identity].spec);
                }
                debug!(
                    "New grouping {} for {} members of {}",
                    group.objects.workload_name,
                    group.members.len(),
                    source_type
                );
                groups.insert(group.objects.workload_name.clone(), group);
            }
        }

        // A grouping whose credentials object was removed is written again
        for (name, group) in groups.iter_mut() {
            if !group.dirty && !group.members.is_empty() && !secret_names.contains(&credentials_name(name)) {
                warn!("Grouping {} has no credentials object", name);
                group.dirty = true;
            }
        }

        let image = definition.map(CollectorDefinition::image_reference);
        for (name, group) in &groups {
            summary += self
                .apply_group(group, desired, deployments.get(name), image.as_deref())
                .await;
        }

        let mut covered: BTreeSet<String> = groups.keys().map(|name| credentials_name(name)).collect();
        for name in deployments.keys().filter(|name| !groups.contains_key(*name)) {
            covered.insert(credentials_name(name));
            match self.lifecycle.delete_orphan_workload(name).await {
                Ok(()) => {
                    self.metrics.record_operation("delete", true);
                    summary.deleted += 1;
                }
                Err(e) => {
                    self.metrics.record_operation("delete", false);
                    summary.failed += 1;
                    error!("Failed to delete orphaned grouped workload {}: {}", name, e);
                }
            }
        }

        // Credentials left behind by a grouping whose ConfigMap was never written
        for name in secret_names.iter().filter(|name| !covered.contains(*name)) {
            match self.lifecycle.delete_credentials(name).await {
                Ok(existed) => {
                    self.metrics.record_operation("sweep_credentials", true);
                    if existed {
                        info!("Deleted orphaned grouped credentials {}", name);
                        summary.deleted += 1;
                    }
                }
                Err(e) => {
                    self.metrics.record_operation("sweep_credentials", false);
                    summary.failed += 1;
                    error!("Failed to delete orphaned grouped credentials {}: {}", name, e);
                }
            }
        }

        Ok(summary)
    }

    /// Bring one grouping's objects in line with its membership
    async fn apply_group(
        &self,
        group: &Grouping,
        desired: &DesiredSet,
        deployment: Option<&Deployment>,
        image: Option<&str>,
    ) -> ReconcileSummary {
        let mut summary = ReconcileSummary::default();
        let name = &group.objects.workload_name;

        if group.members.is_empty() {
            match self.lifecycle.delete_group(name).await {
                Ok(()) => {
                    self.metrics.record_operation("group_delete", true);
                    summary.deleted += group.removed;
                }
                Err(e) => {
                    self.metrics.record_operation("group_delete", false);
                    summary.failed += 1;
                    error!("Failed to delete grouping {}: {}", name, e);
                }
            }
            return summary;
        }

        if group.dirty {
            let credentials = group
                .members
                .keys()
                .filter_map(|identity| desired.get(identity).map(|w| (identity, &w.spec.credential)));
            let written = match group.members_json() {
                Ok(members_json) => {
                    self.lifecycle
                        .write_group(&group.objects, &group.created_at, members_json, credentials)
                        .await
                }
                Err(e) => Err(e.into()),
            };
            match written {
                Ok(()) => {
                    self.metrics.record_operation("group_write", true);
                    summary.created += group.added;
                    summary.deleted += group.removed;
                    if group.added + group.removed == 0 {
                        summary.updated += 1;
                    }
                    info!(
                        "Grouping {} now has {} members (+{} -{})",
                        name,
                        group.members.len(),
                        group.added,
                        group.removed
                    );
                }
                Err(e) => {
                    self.metrics.record_operation("group_write", false);
                    summary.failed += 1;
                    error!("Failed to write grouping {}: {}", name, e);
                    return summary;
                }
            }
        }

        let Some(image) = image else {
            return summary;
        };

        match deployment {
            None => match self.lifecycle.create_group_workload(&group.objects, image).await {
                Ok(_) => self.metrics.record_operation("create", true),
                Err(ControllerError::MissingGrouping(config)) => {
                    warn!("Grouping {} is missing, not creating workload {}", config, name);
                }
                Err(e) => {
                    self.metrics.record_operation("create", false);
                    summary.failed += 1;
                    error!("Failed to create grouped workload {}: {}", name, e);
                }
            },
            Some(existing) if container_image(existing) != Some(image) => {
                match self.lifecycle.update_image(name, image).await {
                    Ok(_) => {
                        self.metrics.record_operation("update_image", true);
                        summary.updated += 1;
                    }
                    Err(e) => {
                        self.metrics.record_operation("update_image", false);
                        summary.failed += 1;
                        error!("Failed to update image of {}: {}", name, e);
                    }
                }
            }
            Some(_) => {}
        }

        summary
    }
}
