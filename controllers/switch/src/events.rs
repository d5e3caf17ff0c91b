//! Kubernetes Event recording.
//!
//! Events are fire-and-forget: failures are logged and never propagated, so a
//! failed event never breaks reconciliation.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::ObjectReference;
use kube::Client;
use kube::runtime::events::{Event, EventType, Recorder, Reporter};
use tracing::warn;

/// Publishes Kubernetes Events about switches
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish an event on the referenced object
    async fn publish(
        &self,
        resource_ref: &ObjectReference,
        type_: EventType,
        reason: &str,
        action: &str,
        note: Option<String>,
    );
}

/// Publisher backed by `kube::runtime::events::Recorder`
pub struct KubeEventPublisher {
    recorder: Recorder,
}

impl KubeEventPublisher {
    /// Create a publisher reporting as `controller_name`
    pub fn new(client: Client, controller_name: &str) -> Self {
        let reporter = Reporter {
            controller: controller_name.to_string(),
            instance: std::env::var("POD_NAME").ok(),
        };
        Self {
            recorder: Recorder::new(client, reporter),
        }
    }
}

#[async_trait]
impl EventPublisher for KubeEventPublisher {
    async fn publish(
        &self,
        resource_ref: &ObjectReference,
        type_: EventType,
        reason: &str,
        action: &str,
        note: Option<String>,
    ) {
        let event = Event {
            type_,
            reason: reason.to_string(),
            note,
            action: action.to_string(),
            secondary: None,
        };
        if let Err(e) = self.recorder.publish(&event, resource_ref).await {
            warn!(reason, action, error = %e, "Failed to publish Kubernetes event");
        }
    }
}

/// Event actions
pub mod actions {
    /// State pipeline pass
    pub const RECONCILE: &str = "Reconcile";
    /// Address-pool resource created
    pub const ALLOCATE: &str = "Allocate";
    /// Failed address-pool resource deleted
    pub const RECLAIM: &str = "Reclaim";
}

/// Event reasons not derived from condition reasons
pub mod reasons {
    /// Pipeline completed
    pub const READY: &str = "Ready";
    /// Loopback IP requested
    pub const LOOPBACK_REQUESTED: &str = "LoopbackRequested";
    /// South subnet requested
    pub const SOUTH_SUBNET_REQUESTED: &str = "SouthSubnetRequested";
    /// Per-port subnet requested
    pub const PORT_SUBNET_REQUESTED: &str = "PortSubnetRequested";
    /// Failed address-pool resource deleted
    pub const FAILED_RESOURCE_RECLAIMED: &str = "FailedResourceReclaimed";
}

/// Recorded event, for assertions in tests
#[cfg(test)]
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedEvent {
    pub object: String,
    pub warning: bool,
    pub reason: String,
    pub action: String,
    pub note: Option<String>,
}

/// Publisher that keeps events in memory
#[cfg(test)]
#[derive(Debug, Default, Clone)]
pub struct RecordingEventPublisher {
    events: std::sync::Arc<std::sync::Mutex<Vec<RecordedEvent>>>,
}

#[cfg(test)]
impl RecordingEventPublisher {
    pub fn events(&self) -> Vec<RecordedEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn reasons(&self) -> Vec<String> {
        self.events().into_iter().map(|e| e.reason).collect()
    }
}

#[cfg(test)]
#[async_trait]
impl EventPublisher for RecordingEventPublisher {
    async fn publish(
        &self,
        resource_ref: &ObjectReference,
        type_: EventType,
        reason: &str,
        action: &str,
        note: Option<String>,
    ) {
        self.events.lock().unwrap().push(RecordedEvent {
            object: resource_ref.name.clone().unwrap_or_default(),
            warning: matches!(type_, EventType::Warning),
            reason: reason.to_string(),
            action: action.to_string(),
            note,
        });
    }
}
