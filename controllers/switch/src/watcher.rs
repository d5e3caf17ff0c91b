//! Kubernetes resource watchers.
//!
//! Two `kube_runtime::Controller`s run over Switch resources:
//! - the state controller, triggered by the switch itself, by linked switches,
//!   by the switch's inventory and by any SwitchConfig
//! - the address controller, triggered by the switch, by SwitchConfigs and by
//!   the Subnet/IP resources labelled with the switch as owner
//!
//! Both share the reconciler, so backoff bookkeeping is per switch.

use crate::config::ControllerConfig;
use crate::error::ControllerError;
use crate::reconcile_helpers::{linked_switches, resource_key, switch_changed};
use crate::reconciler::Reconciler;
use crds::labels;
use crds::{IP, Inventory, Subnet, Switch, SwitchConfig};
use futures::StreamExt;
use kube::{Api, Resource, ResourceExt};
use kube_runtime::controller::{Action, Config as RuntimeConfig};
use kube_runtime::reflector::{ObjectRef, Store};
use kube_runtime::{Controller, watcher};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info};

/// Last observed version of every switch, to drop no-op updates
///
/// Entries are pruned once their switch leaves the reflector store or is
/// being deleted.
#[derive(Debug, Default)]
pub struct SeenSwitches {
    seen: Mutex<HashMap<String, Switch>>,
}

fn switch_key(switch: &Switch) -> String {
    resource_key(&switch.namespace().unwrap_or_default(), &switch.name_any())
}

impl SeenSwitches {
    /// Switches to enqueue because `changed` was updated
    ///
    /// Empty when the update is not meaningful for the fabric.
    pub fn linked_requests<'a>(
        &self,
        changed: &Switch,
        all: impl IntoIterator<Item = &'a Switch>,
    ) -> Vec<ObjectRef<Switch>> {
        let all: Vec<&Switch> = all.into_iter().collect();
        let namespace = changed.namespace().unwrap_or_default();
        let key = switch_key(changed);
        let deleting = changed.metadata.deletion_timestamp.is_some();

        if let Ok(mut seen) = self.seen.lock() {
            let live: HashSet<String> = all.iter().map(|s| switch_key(s)).collect();
            seen.retain(|k, _| *k == key || live.contains(k));

            if deleting {
                seen.remove(&key);
            } else {
                if seen.get(&key).is_some_and(|prev| !switch_changed(prev, changed)) {
                    return Vec::new();
                }
                seen.insert(key, changed.clone());
            }
        }

        linked_switches(changed, all)
            .into_iter()
            .map(|name| ObjectRef::new(&name).within(&namespace))
            .collect()
    }

    #[cfg(test)]
    /// Number of switches currently remembered
    pub fn remembered(&self) -> usize {
        self.seen.lock().map(|seen| seen.len()).unwrap_or(0)
    }
}

/// Switches whose inventoryRef names `inventory`
pub fn inventory_requests<'a>(
    inventory: &Inventory,
    all: impl IntoIterator<Item = &'a Switch>,
) -> Vec<ObjectRef<Switch>> {
    let namespace = inventory.namespace();
    let name = inventory.name_any();
    all.into_iter()
        .filter(|s| s.namespace() == namespace)
        .filter(|s| s.spec.inventory_ref.as_ref().is_some_and(|r| r.name == name))
        .map(ObjectRef::from_obj)
        .collect()
}

/// The switch named in an address resource's owner label
pub fn owner_request<K: Resource>(resource: &K) -> Option<ObjectRef<Switch>> {
    let owner = resource.labels().get(labels::OWNER)?;
    let namespace = resource.namespace()?;
    Some(ObjectRef::new(owner).within(&namespace))
}

/// Every known switch; a config change may affect any of them
fn all_requests(store: &Store<Switch>) -> Vec<ObjectRef<Switch>> {
    store.state().iter().map(|s| ObjectRef::from_obj(s.as_ref())).collect()
}

fn runtime_config(config: &ControllerConfig) -> RuntimeConfig {
    RuntimeConfig::default()
        .debounce(config.reconcile_debounce)
        .concurrency(config.reconcile_concurrency)
}

fn error_policy(switch: Arc<Switch>, error: &ControllerError, ctx: Arc<Reconciler>) -> Action {
    error!("Reconciliation error for switch {}: {}", switch.name_any(), error);
    ctx.error_action(&switch, error)
}

/// Watches Kubernetes resources for changes.
pub struct Watcher {
    reconciler: Arc<Reconciler>,
    switch_api: Api<Switch>,
    inventory_api: Api<Inventory>,
    switch_config_api: Api<SwitchConfig>,
    subnet_api: Api<Subnet>,
    ip_api: Api<IP>,
}

impl Watcher {
    /// Creates a new watcher instance.
    pub fn new(
        reconciler: Arc<Reconciler>,
        switch_api: Api<Switch>,
        inventory_api: Api<Inventory>,
        switch_config_api: Api<SwitchConfig>,
        subnet_api: Api<Subnet>,
        ip_api: Api<IP>,
    ) -> Self {
        Self {
            reconciler,
            switch_api,
            inventory_api,
            switch_config_api,
            subnet_api,
            ip_api,
        }
    }

    /// Runs the state controller until its stream ends.
    pub async fn watch_switch_state(&self) -> Result<(), ControllerError> {
        info!("Starting Switch state watcher");

        let controller = Controller::new(self.switch_api.clone(), watcher::Config::default());
        let links_store = controller.store();
        let inventory_store = controller.store();
        let config_store = controller.store();
        let seen = Arc::new(SeenSwitches::default());

        controller
            .watches(self.switch_api.clone(), watcher::Config::default(), move |changed: Switch| {
                let all = links_store.state();
                seen.linked_requests(&changed, all.iter().map(|s| &**s))
            })
            .watches(self.inventory_api.clone(), watcher::Config::default(), move |inventory: Inventory| {
                let all = inventory_store.state();
                inventory_requests(&inventory, all.iter().map(|s| &**s))
            })
            .watches(self.switch_config_api.clone(), watcher::Config::default(), move |config: SwitchConfig| {
                debug!("SwitchConfig {} changed, requeueing all switches", config.name_any());
                all_requests(&config_store)
            })
            .with_config(runtime_config(&self.reconciler.config))
            .run(
                |switch: Arc<Switch>, ctx: Arc<Reconciler>| async move { ctx.reconcile_switch(&switch).await },
                error_policy,
                self.reconciler.clone(),
            )
            .for_each(|res| async move {
                match res {
                    Ok((obj, _)) => debug!("Reconciled switch state {}", obj.name),
                    Err(e) => error!("Switch state controller error: {}", e),
                }
            })
            .await;

        Ok(())
    }

    /// Runs the address controller until its stream ends.
    pub async fn watch_switch_addresses(&self) -> Result<(), ControllerError> {
        info!("Starting Switch address watcher");

        let controller = Controller::new(self.switch_api.clone(), watcher::Config::default());
        let config_store = controller.store();

        controller
            .watches(self.subnet_api.clone(), watcher::Config::default(), |subnet: Subnet| {
                owner_request(&subnet)
            })
            .watches(self.ip_api.clone(), watcher::Config::default(), |ip: IP| owner_request(&ip))
            .watches(self.switch_config_api.clone(), watcher::Config::default(), move |_: SwitchConfig| {
                all_requests(&config_store)
            })
            .with_config(runtime_config(&self.reconciler.config))
            .run(
                |switch: Arc<Switch>, ctx: Arc<Reconciler>| async move {
                    ctx.reconcile_switch_addresses(&switch).await
                },
                error_policy,
                self.reconciler.clone(),
            )
            .for_each(|res| async move {
                match res {
                    Ok((obj, _)) => debug!("Reconciled switch addresses {}", obj.name),
                    Err(e) => error!("Switch address controller error: {}", e),
                }
            })
            .await;

        Ok(())
    }
}
