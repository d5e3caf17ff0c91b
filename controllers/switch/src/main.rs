//! Switch Controller
//!
//! Reconciles `Switch` CRDs of a bare-metal leaf/spine fabric:
//! - derives interfaces, neighbors, layer, role and port directions from the
//!   switch's inventory and its LLDP neighbors
//! - applies port parameters and breakout
//! - requests loopback IPs and south subnets from the address pools, then
//!   computes ASN and per-port addresses from the reservations
//!
//! Status is written only when something meaningful changed.

mod addressing;
mod backoff;
mod config;
mod controller;
mod error;
mod events;
mod metrics;
mod reconcile_helpers;
mod reconciler;
mod watcher;

#[cfg(test)]
mod test_utils;

use crate::config::ControllerConfig;
use crate::error::ControllerError;
use controller::Controller;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), ControllerError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if rustls::crypto::ring::default_provider().install_default().is_err() {
        debug!("rustls crypto provider already installed");
    }

    info!("Starting Switch Controller");

    let config = ControllerConfig::from_env()?;

    info!("Configuration:");
    info!("  Namespace: {}", config.namespace);
    info!("  ASN base: {}", config.asn_base);
    info!("  Per-port subnets: {}", config.enable_port_subnets);
    info!("  Concurrency: {}", config.reconcile_concurrency);
    info!("  Metrics: {}", config.metrics_addr);

    // Initialize and run controller
    let controller = Controller::new(config).await?;
    controller.run().await?;

    Ok(())
}
