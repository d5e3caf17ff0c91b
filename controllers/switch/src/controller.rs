//! Main controller implementation.
//!
//! Builds the shared reconciler and runs the state watcher, the address
//! watcher and the probes/metrics server as background tasks.

use crate::config::ControllerConfig;
use crate::error::ControllerError;
use crate::events::KubeEventPublisher;
use crate::metrics::{self, Metrics};
use crate::reconciler::Reconciler;
use crate::watcher::Watcher;
use crds::labels;
use crds::{IP, Inventory, Subnet, Switch, SwitchConfig};
use fabric_client::FabricClient;
use kube::{Api, Client};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::info;

/// Main controller for switch fabric resources.
pub struct Controller {
    state_watcher: JoinHandle<Result<(), ControllerError>>,
    address_watcher: JoinHandle<Result<(), ControllerError>>,
    metrics_server: JoinHandle<Result<(), ControllerError>>,
}

impl Controller {
    /// Creates a new controller instance and starts its tasks.
    pub async fn new(config: ControllerConfig) -> Result<Self, ControllerError> {
        info!("Initializing Switch Controller");

        let kube_client = Client::try_default().await?;
        let ns = config.namespace.clone();

        let switch_api: Api<Switch> = Api::namespaced(kube_client.clone(), &ns);
        let inventory_api: Api<Inventory> = Api::namespaced(kube_client.clone(), &ns);
        let switch_config_api: Api<SwitchConfig> = Api::namespaced(kube_client.clone(), &ns);
        let subnet_api: Api<Subnet> = Api::namespaced(kube_client.clone(), &ns);
        let ip_api: Api<IP> = Api::namespaced(kube_client.clone(), &ns);

        let metrics = Arc::new(Metrics::new()?);
        let events = Arc::new(KubeEventPublisher::new(kube_client.clone(), labels::MANAGER));
        let metrics_addr = config.metrics_addr;

        let reconciler = Arc::new(Reconciler::new(
            FabricClient::new(kube_client),
            events,
            config,
            metrics.clone(),
        ));

        let watcher_instance = Arc::new(Watcher::new(
            reconciler,
            switch_api,
            inventory_api,
            switch_config_api,
            subnet_api,
            ip_api,
        ));

        let state_watcher = {
            let watcher = watcher_instance.clone();
            tokio::spawn(async move { watcher.watch_switch_state().await })
        };

        let address_watcher = {
            let watcher = watcher_instance;
            tokio::spawn(async move { watcher.watch_switch_addresses().await })
        };

        let metrics_server = {
            let metrics = metrics.clone();
            tokio::spawn(async move { metrics::serve(metrics_addr, metrics).await })
        };

        metrics.set_ready();

        Ok(Self {
            state_watcher,
            address_watcher,
            metrics_server,
        })
    }

    /// Runs the controller until shutdown.
    pub async fn run(mut self) -> Result<(), ControllerError> {
        info!("Switch Controller running");

        // Watchers and the server run forever; any exit ends the process
        tokio::select! {
            result = &mut self.state_watcher => {
                result.map_err(|e| ControllerError::Watch(format!("Switch state watcher panicked: {}", e)))?
                    .map_err(|e| ControllerError::Watch(format!("Switch state watcher error: {}", e)))?;
            }
            result = &mut self.address_watcher => {
                result.map_err(|e| ControllerError::Watch(format!("Switch address watcher panicked: {}", e)))?
                    .map_err(|e| ControllerError::Watch(format!("Switch address watcher error: {}", e)))?;
            }
            result = &mut self.metrics_server => {
                result.map_err(|e| ControllerError::Watch(format!("Metrics server panicked: {}", e)))??;
            }
        }

        Ok(())
    }
}
