//! Main controller implementation.
//!
//! This module contains the `Controller` struct that drives the poll loop:
//! collect the desired set, reconcile per-source and grouped workloads, wait
//! for the next interval. Shutdown is only observed between ticks.

use crate::aggregator::{DesiredSet, SourceAggregator};
use crate::cluster::ClusterApi;
use crate::error::ControllerError;
use crate::grouping::GroupReconciler;
use crate::lifecycle::LifecycleManager;
use crate::metrics::Metrics;
use crate::observed::ClusterStateReader;
use crate::reconciler::{ReconcileSummary, Reconciler};
use sources_client::{CredentialResolver, SourcesApi};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{error, info};
use workload_spec::CollectorDefinitions;

/// Poll-loop controller
pub struct Controller {
    aggregator: SourceAggregator,
    reconciler: Reconciler,
    groups: GroupReconciler,
    definitions: Arc<CollectorDefinitions>,
    metrics: Arc<Metrics>,
    interval: Duration,
}

/// Split the desired set into per-source workloads and grouped workloads by type
pub fn partition(
    desired: DesiredSet,
    definitions: &CollectorDefinitions,
) -> (DesiredSet, BTreeMap<String, DesiredSet>) {
    let mut single = DesiredSet::new();
    let mut grouped: BTreeMap<String, DesiredSet> = BTreeMap::new();

    for (identity, workload) in desired {
        let is_grouped = definitions
            .get(&workload.source_type)
            .is_some_and(|d| d.is_grouped());
        if is_grouped {
            grouped
                .entry(workload.source_type.clone())
                .or_default()
                .insert(identity, workload);
        } else {
            single.insert(identity, workload);
        }
    }
    (single, grouped)
}

impl Controller {
    /// Creates a new controller instance.
    pub fn new(
        sources: Arc<dyn SourcesApi>,
        credentials: Arc<dyn CredentialResolver>,
        cluster: Arc<dyn ClusterApi>,
        namespace: &str,
        definitions: Arc<CollectorDefinitions>,
        metrics: Arc<Metrics>,
        interval: Duration,
    ) -> Self {
        let lifecycle = Arc::new(LifecycleManager::new(cluster.clone(), namespace));
        let reader = ClusterStateReader::new(cluster.clone());

        Self {
            aggregator: SourceAggregator::new(sources, credentials, definitions.clone()),
            reconciler: Reconciler::new(reader, lifecycle.clone(), metrics.clone()),
            groups: GroupReconciler::new(cluster, lifecycle, definitions.clone(), metrics.clone()),
            definitions,
            metrics,
            interval,
        }
    }

    /// Run one full reconciliation tick
    pub async fn tick(&self) -> Result<ReconcileSummary, ControllerError> {
        let desired = self.aggregator.collect().await?;
        let desired_count = desired.len();
        self.metrics.set_desired(desired_count);

        let (single, grouped) = partition(desired, &self.definitions);
        let mut summary = self.reconciler.reconcile(&single).await?;
        summary += self.groups.reconcile(&grouped).await?;
        summary.desired = desired_count;

        self.metrics.set_observed(summary.observed);
        Ok(summary)
    }

    /// Tick every interval until `shutdown` flips to `true`
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!("Starting reconciliation loop (interval {:?})", self.interval);

        loop {
            if *shutdown.borrow() {
                break;
            }

            let started = Instant::now();
            let result = self.tick().await;
            let elapsed = started.elapsed();
            self.metrics.record_tick(result.is_ok(), elapsed);

            match result {
                Ok(summary) => info!(
                    "Tick complete in {:?}: desired={} observed={} created={} deleted={} updated={} failed={}",
                    elapsed,
                    summary.desired,
                    summary.observed,
                    summary.created,
                    summary.deleted,
                    summary.updated,
                    summary.failed
                ),
                Err(e) => error!("Tick failed, retrying next interval: {}", e),
            }

            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                () = tokio::time::sleep(self.interval) => {}
            }
        }

        info!("Reconciliation loop stopped");
    }
}
