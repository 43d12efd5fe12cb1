//! Collector Orchestrator
//!
//! Poll-based controller that keeps collector workloads in a Kubernetes
//! namespace in sync with the data sources registered in the source and
//! inventory registries:
//! - Per-source pairing: one Deployment and one credentials Secret per source
//! - Grouped pairing: sources of one type share a Deployment, tracked by a
//!   grouping ConfigMap
//!
//! Every tick rebuilds the desired set from the registries and converges the
//! cluster toward it. Prometheus metrics are served on `/metrics`.

mod aggregator;
mod cli;
mod cluster;
mod controller;
mod error;
mod grouping;
mod lifecycle;
mod metrics;
mod observed;
mod reconciler;
mod workload;

#[cfg(test)]
mod test_utils;

use crate::cli::Cli;
use crate::cluster::KubeCluster;
use crate::controller::Controller;
use crate::error::ControllerError;
use crate::metrics::Metrics;
use clap::Parser;
use sources_client::SourcesClient;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::{oneshot, watch};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), ControllerError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if rustls::crypto::ring::default_provider().install_default().is_err() {
        warn!("A rustls crypto provider was already installed");
    }

    info!("Starting Collector Orchestrator");

    let cli = Cli::parse();
    let interval = cli.poll_interval()?;

    info!("Configuration:");
    info!("  Sources URL: {}", cli.sources_url);
    info!("  Inventory URL: {}", cli.inventory_url);
    info!("  Namespace: {}", cli.namespace);
    info!("  Poll interval: {:?}", interval);
    let definitions = Arc::new(cli.load_definitions()?);

    let sources = SourcesClient::new(cli.sources_config())?;
    let credentials = sources.credential_resolver(&cli.sources_internal_path_prefix);

    let client = kube::Client::try_default().await?;
    let cluster = KubeCluster::new(client, &cli.namespace);

    let metrics = Arc::new(Metrics::new()?);
    let listener = TcpListener::bind(SocketAddr::from(([0, 0, 0, 0], cli.metrics_port))).await?;
    let (stop_metrics, metrics_stopped) = oneshot::channel::<()>();
    let server = tokio::spawn(metrics::serve(listener, metrics.clone(), async {
        let _ = metrics_stopped.await;
    }));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Shutdown requested, finishing the current tick");
        let _ = shutdown_tx.send(true);
    });

    let controller = Controller::new(
        Arc::new(sources),
        Arc::new(credentials),
        Arc::new(cluster),
        &cli.namespace,
        definitions,
        metrics,
        interval,
    );
    controller.run(shutdown_rx).await;

    let _ = stop_metrics.send(());
    match server.await {
        Ok(result) => result?,
        Err(e) => warn!("Metrics endpoint task failed: {}", e),
    }

    info!("Collector Orchestrator stopped");
    Ok(())
}

/// Resolves on Ctrl-C or, on Unix, SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
