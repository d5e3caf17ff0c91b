//! Fabric client errors

use thiserror::Error;

/// Errors that can occur when talking to the object store
#[derive(Debug, Error)]
pub enum FabricError {
    /// Transport or unclassified API error
    #[error("Kubernetes API error: {0}")]
    Kube(#[source] kube::Error),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// A resource with the same name already exists
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// Write conflict
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Request rejected by the API server (validation, malformed patch, ...)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl FabricError {
    /// True for errors that resolve themselves on a later pass
    pub fn is_transient(&self) -> bool {
        matches!(self, FabricError::Conflict(_))
    }
}

impl From<kube::Error> for FabricError {
    fn from(err: kube::Error) -> Self {
        match &err {
            kube::Error::Api(ae) if ae.code == 404 => FabricError::NotFound(ae.message.clone()),
            kube::Error::Api(ae) if ae.code == 409 && ae.reason == "AlreadyExists" => {
                FabricError::AlreadyExists(ae.message.clone())
            }
            kube::Error::Api(ae) if ae.code == 409 => FabricError::Conflict(ae.message.clone()),
            kube::Error::Api(ae) if ae.code == 400 || ae.code == 422 => {
                FabricError::InvalidRequest(ae.message.clone())
            }
            _ => FabricError::Kube(err),
        }
    }
}
