//! Prometheus metrics and health probes.
//!
//! Serves `/healthz`, `/readyz` and `/metrics` from a small axum router.

use crate::error::ControllerError;
use axum::Router;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::get;
use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Metrics collected by the switch controllers
#[derive(Clone)]
pub struct Metrics {
    /// Reconciliations by controller and outcome
    pub reconcile_total: IntCounterVec,
    /// Reconciliation duration by controller
    pub reconcile_duration_seconds: HistogramVec,
    /// Address-pool resources created or reclaimed
    pub address_resources_total: IntCounterVec,
    registry: Registry,
    ready: Arc<AtomicBool>,
}

impl Metrics {
    /// Create and register all metrics
    pub fn new() -> Result<Self, ControllerError> {
        let registry = Registry::new();

        let reconcile_total = IntCounterVec::new(
            Opts::new("switch_reconcile_total", "Switch reconciliations by outcome"),
            &["controller", "outcome"],
        )?;
        let reconcile_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "switch_reconcile_duration_seconds",
                "Switch reconciliation latency in seconds",
            ),
            &["controller"],
        )?;
        let address_resources_total = IntCounterVec::new(
            Opts::new(
                "switch_address_resources_total",
                "Address-pool resources created or reclaimed",
            ),
            &["kind", "action"],
        )?;

        registry.register(Box::new(reconcile_total.clone()))?;
        registry.register(Box::new(reconcile_duration_seconds.clone()))?;
        registry.register(Box::new(address_resources_total.clone()))?;

        Ok(Self {
            reconcile_total,
            reconcile_duration_seconds,
            address_resources_total,
            registry,
            ready: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Record one finished reconciliation
    pub fn record_reconcile(&self, controller: &str, outcome: &str, elapsed: Duration) {
        self.reconcile_total
            .with_label_values(&[controller, outcome])
            .inc();
        self.reconcile_duration_seconds
            .with_label_values(&[controller])
            .observe(elapsed.as_secs_f64());
    }

    /// Record a created or reclaimed address-pool resource
    pub fn record_address_resource(&self, kind: &str, action: &str) {
        self.address_resources_total
            .with_label_values(&[kind, action])
            .inc();
    }

    /// Mark the controllers as started
    pub fn set_ready(&self) {
        self.ready.store(true, Ordering::SeqCst);
    }

    /// Whether the controllers have started
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    /// Gather all metrics in Prometheus text format
    pub fn gather(&self) -> Result<String, ControllerError> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| ControllerError::Metrics(e.to_string()))
    }
}

async fn healthz() -> &'static str {
    "ok"
}

async fn readyz(State(metrics): State<Arc<Metrics>>) -> impl IntoResponse {
    if metrics.is_ready() {
        (StatusCode::OK, "ready")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "starting")
    }
}

async fn metrics_handler(State(metrics): State<Arc<Metrics>>) -> impl IntoResponse {
    match metrics.gather() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

/// Probes and metrics router
pub fn router(metrics: Arc<Metrics>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(metrics)
}

/// Serve probes and metrics until the listener fails
pub async fn serve(addr: SocketAddr, metrics: Arc<Metrics>) -> Result<(), ControllerError> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Metrics and probes listening on {}", addr);
    axum::serve(listener, router(metrics)).await?;
    Ok(())
}
