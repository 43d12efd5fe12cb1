//! Per-source reconciler
//!
//! Diffs the desired identities against the observed ones and drives the
//! lifecycle manager: `desired - observed` is created, `observed - desired` is
//! deleted and the intersection is left alone. Identity covers every spec
//! field, so there is no update path. Failures of single operations are
//! counted and retried on the next tick.

use crate::aggregator::DesiredSet;
use crate::error::ControllerError;
use crate::lifecycle::LifecycleManager;
use crate::metrics::Metrics;
use crate::observed::ClusterStateReader;
use std::collections::BTreeSet;
use std::ops::AddAssign;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use workload_spec::Identity;

/// Identities to create and delete
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Plan {
    pub to_create: Vec<Identity>,
    pub to_delete: Vec<Identity>,
}

impl Plan {
    pub fn is_empty(&self) -> bool {
        self.to_create.is_empty() && self.to_delete.is_empty()
    }
}

/// Compute `desired - observed` and `observed - desired`
pub fn plan<'a>(
    desired: impl IntoIterator<Item = &'a Identity>,
    observed: impl IntoIterator<Item = &'a Identity>,
) -> Plan {
    let desired: BTreeSet<&Identity> = desired.into_iter().collect();
    let observed: BTreeSet<&Identity> = observed.into_iter().collect();

    Plan {
        to_create: desired.difference(&observed).map(|i| (*i).clone()).collect(),
        to_delete: observed.difference(&desired).map(|i| (*i).clone()).collect(),
    }
}

/// Outcome of one reconciliation pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    /// Workloads derived from the registries
    pub desired: usize,
    /// Workloads (or group members) found before acting
    pub observed: usize,
    pub created: usize,
    pub deleted: usize,
    pub updated: usize,
    pub failed: usize,
}

impl AddAssign for ReconcileSummary {
    fn add_assign(&mut self, other: Self) {
        self.desired += other.desired;
        self.observed += other.observed;
        self.created += other.created;
        self.deleted += other.deleted;
        self.updated += other.updated;
        self.failed += other.failed;
    }
}

/// Reconciles per-source workloads
pub struct Reconciler {
    reader: ClusterStateReader,
    lifecycle: Arc<LifecycleManager>,
    metrics: Arc<Metrics>,
}

impl Reconciler {
    pub fn new(
        reader: ClusterStateReader,
        lifecycle: Arc<LifecycleManager>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            reader,
            lifecycle,
            metrics,
        }
    }

    /// Converge the per-source workloads toward `desired`
    ///
    /// Listing errors abort the pass; operation errors are counted.
    pub async fn reconcile(&self, desired: &DesiredSet) -> Result<ReconcileSummary, ControllerError> {
        let observed = self.reader.list_observed().await?;
        let plan = plan(desired.keys(), observed.keys());
        let mut summary = ReconcileSummary {
            observed: observed.len(),
            ..Default::default()
        };
        if plan.is_empty() {
            debug!("{} per-source workloads already converged", observed.len());
        }

        for identity in &plan.to_delete {
            match self.lifecycle.delete(identity).await {
                Ok(existed) => {
                    self.metrics.record_operation("delete", true);
                    if existed {
                        summary.deleted += 1;
                    }
                }
                Err(e) => {
                    self.metrics.record_operation("delete", false);
                    summary.failed += 1;
                    error!("Failed to delete workload {}: {}", identity.short(), e);
                }
            }
        }

        for identity in &plan.to_create {
            let Some(workload) = desired.get(identity) else {
                continue;
            };
            match self.lifecycle.create(identity, &workload.spec).await {
                Ok(created) => {
                    self.metrics.record_operation("create", true);
                    if created {
                        summary.created += 1;
                    }
                }
                Err(e) => {
                    self.metrics.record_operation("create", false);
                    summary.failed += 1;
                    error!(
                        "Failed to create workload for source {} ({}): {}",
                        workload.spec.source_id,
                        identity.short(),
                        e
                    );
                }
            }
        }

        self.sweep_credentials(desired, &mut summary).await?;
        Ok(summary)
    }

    /// Pair every credentials object with a workload again
    ///
    /// Running desired workloads whose object was removed get it rewritten;
    /// objects that no workload or desired identity backs are deleted.
    async fn sweep_credentials(
        &self,
        desired: &DesiredSet,
        summary: &mut ReconcileSummary,
    ) -> Result<(), ControllerError> {
        let live = self.reader.list_observed().await?;
        let credentials = self.reader.list_credentials().await?;

        for (identity, workload) in desired {
            if !live.contains_key(identity) || credentials.contains_key(identity) {
                continue;
            }
            warn!(
                "Workload for source {} ({}) has no credentials object",
                workload.spec.source_id,
                identity.short()
            );
            match self.lifecycle.restore_credentials(identity, &workload.spec).await {
                Ok(()) => {
                    self.metrics.record_operation("restore_credentials", true);
                    summary.updated += 1;
                }
                Err(e) => {
                    self.metrics.record_operation("restore_credentials", false);
                    summary.failed += 1;
                    error!(
                        "Failed to restore credentials for source {} ({}): {}",
                        workload.spec.source_id,
                        identity.short(),
                        e
                    );
                }
            }
        }

        for (identity, name) in credentials {
            if desired.contains_key(&identity) || live.contains_key(&identity) {
                continue;
            }
            match self.lifecycle.delete_credentials(&name).await {
                Ok(existed) => {
                    self.metrics.record_operation("sweep_credentials", true);
                    if existed {
                        info!("Deleted orphaned credentials {}", name);
                        summary.deleted += 1;
                    }
                }
                Err(e) => {
                    self.metrics.record_operation("sweep_credentials", false);
                    error!("Failed to delete orphaned credentials {}: {}", name, e);
                }
            }
        }
        Ok(())
    }
}
