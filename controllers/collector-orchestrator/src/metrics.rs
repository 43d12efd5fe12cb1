//! Prometheus metrics and the HTTP endpoint exposing them
//!
//! `GET /metrics` renders the registry in the text exposition format and
//! `GET /healthz` answers liveness probes.

use crate::error::ControllerError;
use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

const NAMESPACE: &str = "collector_orchestrator";

/// Metrics for the reconciliation loop
pub struct Metrics {
    registry: Registry,

    /// Completed ticks by outcome
    ticks_total: IntCounterVec,

    /// Cluster operations by kind and outcome
    operations_total: IntCounterVec,

    /// Size of the last desired set
    desired_workloads: IntGauge,

    /// Size of the last observed set
    observed_workloads: IntGauge,

    /// Tick duration
    tick_duration_seconds: Histogram,
}

impl Metrics {
    /// Create the metrics on a fresh registry
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let ticks_total = IntCounterVec::new(
            Opts::new("ticks_total", "Reconciliation ticks").namespace(NAMESPACE),
            &["outcome"],
        )?;
        registry.register(Box::new(ticks_total.clone()))?;

        let operations_total = IntCounterVec::new(
            Opts::new("operations_total", "Cluster operations issued").namespace(NAMESPACE),
            &["operation", "outcome"],
        )?;
        registry.register(Box::new(operations_total.clone()))?;

        let desired_workloads = IntGauge::with_opts(
            Opts::new("desired_workloads", "Workloads derived from the registries")
                .namespace(NAMESPACE),
        )?;
        registry.register(Box::new(desired_workloads.clone()))?;

        let observed_workloads = IntGauge::with_opts(
            Opts::new("observed_workloads", "Workloads found in the cluster").namespace(NAMESPACE),
        )?;
        registry.register(Box::new(observed_workloads.clone()))?;

        let tick_duration_seconds = Histogram::with_opts(
            HistogramOpts::new("tick_duration_seconds", "Reconciliation tick duration")
                .namespace(NAMESPACE)
                .buckets(vec![0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0]),
        )?;
        registry.register(Box::new(tick_duration_seconds.clone()))?;

        Ok(Self {
            registry,
            ticks_total,
            operations_total,
            desired_workloads,
            observed_workloads,
            tick_duration_seconds,
        })
    }

    pub fn record_tick(&self, success: bool, duration: Duration) {
        self.ticks_total
            .with_label_values(&[outcome(success)])
            .inc();
        self.tick_duration_seconds.observe(duration.as_secs_f64());
    }

    pub fn record_operation(&self, operation: &str, success: bool) {
        self.operations_total
            .with_label_values(&[operation, outcome(success)])
            .inc();
    }

    pub fn set_desired(&self, count: usize) {
        self.desired_workloads.set(gauge_value(count));
    }

    pub fn set_observed(&self, count: usize) {
        self.observed_workloads.set(gauge_value(count));
    }

    /// Render every metric in the text exposition format
    pub fn render(&self) -> Result<String, ControllerError> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer)
            .map_err(|e| prometheus::Error::Msg(format!("metrics are not UTF-8: {}", e)).into())
    }
}

fn outcome(success: bool) -> &'static str {
    if success { "success" } else { "failure" }
}

fn gauge_value(count: usize) -> i64 {
    i64::try_from(count).unwrap_or(i64::MAX)
}

async fn metrics_handler(State(metrics): State<Arc<Metrics>>) -> Response {
    match metrics.render() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => {
            error!("Failed to render metrics: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn healthz() -> &'static str {
    "ok"
}

/// Router serving `/metrics` and `/healthz`
pub fn router(metrics: Arc<Metrics>) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/healthz", get(healthz))
        .layer(TraceLayer::new_for_http())
        .with_state(metrics)
}

/// Serve the metrics router until `shutdown` resolves
pub async fn serve(
    listener: TcpListener,
    metrics: Arc<Metrics>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), ControllerError> {
    if let Ok(addr) = listener.local_addr() {
        info!("Metrics endpoint listening on {}", addr);
    }
    axum::serve(listener, router(metrics))
        .with_graceful_shutdown(shutdown)
        .await?;
    info!("Metrics endpoint stopped");
    Ok(())
}
