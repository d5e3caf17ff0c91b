//! Controller-specific error types.
//!
//! This module defines error types specific to the switch controller that are
//! not covered by upstream library errors.

use fabric_client::FabricError;
use kube::Error as KubeError;
use thiserror::Error;

/// Errors that can occur in the switch controller.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Object-store error
    #[error("Fabric error: {0}")]
    Fabric(#[from] FabricError),

    /// Kubernetes client error (client construction, watches)
    #[error("Kubernetes error: {0}")]
    Kube(#[from] KubeError),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Reconciliation failed
    #[error("Reconciliation failed: {0}")]
    Reconciliation(String),

    /// Resource watch failed
    #[error("Resource watch failed: {0}")]
    Watch(String),

    /// Metrics registry or server failure
    #[error("Metrics error: {0}")]
    Metrics(String),

    /// I/O error (listener bind, serve)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ControllerError {
    /// True when the error is a write conflict that a quick retry resolves
    pub fn is_conflict(&self) -> bool {
        matches!(self, ControllerError::Fabric(FabricError::Conflict(_)))
    }
}

impl From<prometheus::Error> for ControllerError {
    fn from(err: prometheus::Error) -> Self {
        ControllerError::Metrics(err.to_string())
    }
}
