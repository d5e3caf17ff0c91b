//! Reconciliation logic for switches.
//!
//! Two reconcilers share this type:
//! - the state reconciler runs the switch state pipeline and writes status
//! - the address reconciler runs the address orchestrator, creating and
//!   reclaiming address-pool resources
//!
//! Both fetch the switch fresh from the store on every pass and never act on the
//! copy handed over by the watch stream.

pub mod environment;
pub mod ipam;
pub mod pipeline;
pub mod state_funcs;

#[cfg(test)]
mod reconciler_test;

use crate::backoff::BackoffState;
use crate::config::ControllerConfig;
use crate::error::ControllerError;
use crate::events::{EventPublisher, actions, reasons};
use crate::metrics::Metrics;
use crate::reconcile_helpers::{resource_key, switch_changed};
use chrono::Utc;
use crds::{ConditionType, Switch, SwitchState};
use environment::{SwitchEnvironment, resolve};
use fabric_client::{FabricClientTrait, FabricError};
use ipam::AddressReport;
use kube::runtime::events::EventType;
use kube::{Resource, ResourceExt};
use kube_runtime::controller::Action;
use pipeline::{PipelineOutcome, StatePipeline};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Requeue after a write conflict
pub const CONFLICT_REQUEUE: Duration = Duration::from_secs(5);
/// Requeue after a halted pipeline or an unsettled address pass
pub const WAITING_REQUEUE: Duration = Duration::from_secs(30);

/// Controller names used for metrics labels and event reporting
pub const STATE_CONTROLLER: &str = "switch-state";
pub const ADDRESS_CONTROLLER: &str = "switch-address";

pub type SwitchOutcome = PipelineOutcome<ConditionType, SwitchState>;

/// Reconciles Switch resources.
pub struct Reconciler {
    pub(crate) client: Box<dyn FabricClientTrait + Send + Sync>,
    pub(crate) events: Arc<dyn EventPublisher>,
    pub(crate) config: ControllerConfig,
    pub(crate) metrics: Arc<Metrics>,
    pipeline: StatePipeline<Switch, SwitchEnvironment>,
    /// Error count tracking per switch (namespace/name -> BackoffState)
    backoff_states: Arc<Mutex<HashMap<String, BackoffState>>>,
}

impl Reconciler {
    /// Creates a new reconciler instance.
    pub fn new(
        client: impl FabricClientTrait + Send + Sync + 'static,
        events: Arc<dyn EventPublisher>,
        config: ControllerConfig,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            client: Box::new(client),
            events,
            config,
            metrics,
            pipeline: state_funcs::switch_pipeline(),
            backoff_states: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn namespace_of(&self, switch: &Switch) -> String {
        switch.namespace().unwrap_or_else(|| self.config.namespace.clone())
    }

    /// Fetch the current version of a switch; `None` once it is gone
    async fn fetch(&self, namespace: &str, name: &str) -> Result<Option<Switch>, ControllerError> {
        match self.client.get_switch(namespace, name).await {
            Ok(switch) => Ok(Some(switch)),
            Err(FabricError::NotFound(_)) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// One state pass for a switch
    pub async fn reconcile_switch(&self, switch: &Switch) -> Result<Action, ControllerError> {
        let started = Instant::now();
        let namespace = self.namespace_of(switch);
        let name = switch.name_any();
        let key = resource_key(&namespace, &name);

        let result = self.run_state_pass(&namespace, &name).await;
        let outcome = match &result {
            Ok((_, label)) => *label,
            Err(e) if e.is_conflict() => "conflict",
            Err(_) => "error",
        };
        self.metrics.record_reconcile(STATE_CONTROLLER, outcome, started.elapsed());

        let (action, _) = result?;
        self.reset_error(&key);
        Ok(action)
    }

    async fn run_state_pass(&self, namespace: &str, name: &str) -> Result<(Action, &'static str), ControllerError> {
        let Some(current) = self.fetch(namespace, name).await? else {
            debug!("Switch {}/{} is gone, nothing to reconcile", namespace, name);
            return Ok((Action::await_change(), "deleted"));
        };

        let env = resolve(self.client.as_ref(), &current, &self.config).await;
        let mut updated = current.clone();
        let outcome = self.pipeline.run(&mut updated, &env, Utc::now());

        if switch_changed(&current, &updated) {
            if let Some(status) = updated.status.as_ref() {
                match self.client.patch_switch_status(namespace, name, status).await {
                    Ok(_) => debug!("Updated status of switch {}/{}", namespace, name),
                    Err(FabricError::Conflict(msg)) => {
                        info!("Status write for switch {}/{} conflicted, retrying: {}", namespace, name, msg);
                        return Ok((Action::requeue(CONFLICT_REQUEUE), "conflict"));
                    }
                    Err(e) => return Err(e.into()),
                }
                self.publish_outcome(&updated, &outcome).await;
            }
        } else {
            debug!("Switch {}/{} unchanged", namespace, name);
        }

        match outcome {
            PipelineOutcome::Completed => Ok((Action::await_change(), "completed")),
            PipelineOutcome::Halted { step, error, .. } => {
                debug!("Switch {}/{} halted at {}: {}", namespace, name, step, error);
                Ok((Action::requeue(WAITING_REQUEUE), "halted"))
            }
        }
    }

    /// Warning for the halting step, or Ready once the pipeline completes
    async fn publish_outcome(&self, switch: &Switch, outcome: &SwitchOutcome) {
        let object = switch.object_ref(&());
        match outcome {
            PipelineOutcome::Completed => {
                info!("Switch {} is ready", switch.name_any());
                self.events
                    .publish(
                        &object,
                        EventType::Normal,
                        reasons::READY,
                        actions::RECONCILE,
                        Some("all state steps completed".to_string()),
                    )
                    .await;
            }
            PipelineOutcome::Halted { step, error, .. } => {
                warn!("Switch {} halted at step {}: {}", switch.name_any(), step, error);
                self.events
                    .publish(
                        &object,
                        EventType::Warning,
                        &error.reason,
                        actions::RECONCILE,
                        Some(error.message.clone()),
                    )
                    .await;
            }
        }
    }

    /// One address pass for a switch
    pub async fn reconcile_switch_addresses(&self, switch: &Switch) -> Result<Action, ControllerError> {
        let started = Instant::now();
        let namespace = self.namespace_of(switch);
        let name = switch.name_any();
        let key = resource_key(&namespace, &name);

        let result = self.run_address_pass(&namespace, &name).await;
        let outcome = match &result {
            Ok(Some(report)) if report.is_settled() => "settled",
            Ok(Some(_)) => "waiting",
            Ok(None) => "deleted",
            Err(_) => "error",
        };
        self.metrics.record_reconcile(ADDRESS_CONTROLLER, outcome, started.elapsed());

        let report = result?;
        self.reset_error(&key);
        Ok(match report {
            Some(report) if !report.is_settled() => {
                debug!("Switch {}/{} waiting on {:?}", namespace, name, report.waiting_on);
                Action::requeue(WAITING_REQUEUE)
            }
            _ => Action::await_change(),
        })
    }

    async fn run_address_pass(&self, namespace: &str, name: &str) -> Result<Option<AddressReport>, ControllerError> {
        let Some(current) = self.fetch(namespace, name).await? else {
            return Ok(None);
        };
        let report = ipam::orchestrate(self.client.as_ref(), &current, &self.config).await?;

        let object = current.object_ref(&());
        for resource in &report.reclaimed {
            self.metrics.record_address_resource(resource.kind, actions::RECLAIM);
            self.events
                .publish(
                    &object,
                    EventType::Warning,
                    resource.reason,
                    actions::RECLAIM,
                    Some(format!("Deleted failed {} {}", resource.kind, resource.name)),
                )
                .await;
        }
        for resource in &report.requested {
            self.metrics.record_address_resource(resource.kind, actions::ALLOCATE);
            self.events
                .publish(
                    &object,
                    EventType::Normal,
                    resource.reason,
                    actions::ALLOCATE,
                    Some(format!("Created {} {}", resource.kind, resource.name)),
                )
                .await;
        }
        Ok(Some(report))
    }

    /// Requeue action for a failed pass
    ///
    /// Write conflicts retry quickly; everything else backs off per switch.
    pub fn error_action(&self, switch: &Switch, error: &ControllerError) -> Action {
        if error.is_conflict() {
            return Action::requeue(CONFLICT_REQUEUE);
        }
        let key = resource_key(&self.namespace_of(switch), &switch.name_any());
        match self.backoff_states.lock() {
            Ok(mut states) => {
                let state = states.entry(key.clone()).or_default();
                let delay = state.record_error();
                warn!(
                    "Reconciliation of {} failed ({} consecutive), retrying in {}s: {}",
                    key,
                    state.error_count,
                    delay.as_secs(),
                    error
                );
                Action::requeue(delay)
            }
            Err(e) => {
                warn!("Failed to lock backoff_states: {}, using default backoff", e);
                Action::requeue(Duration::from_secs(60))
            }
        }
    }

    /// Consecutive failures recorded for a switch
    pub fn error_count(&self, key: &str) -> u32 {
        self.backoff_states
            .lock()
            .ok()
            .and_then(|states| states.get(key).map(|s| s.error_count))
            .unwrap_or(0)
    }

    /// Reset error count for a switch (on successful reconciliation)
    pub fn reset_error(&self, key: &str) {
        if let Ok(mut states) = self.backoff_states.lock() {
            if let Some(state) = states.get_mut(key) {
                state.reset();
            }
        }
    }
}
