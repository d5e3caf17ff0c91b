//! Kubernetes object references for fabric CRDs
//!
//! Provides standard Kubernetes-style object references for cross-resource references.
//! Follows the Kubernetes `ObjectReference` pattern with apiVersion, kind, name,
//! namespace and uid.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// API group shared by every fabric CRD
pub const API_GROUP: &str = "dcops.microscaler.io";

/// API version shared by every fabric CRD
pub const API_VERSION: &str = "dcops.microscaler.io/v1alpha1";

/// Reference to another object in the cluster
///
/// Used for the peer switch of an interface, the matched `SwitchConfig`, and the
/// address-pool resources (`Subnet`, `IP`) backing status entries.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ResourceReference {
    /// API version of the referenced resource (e.g., "dcops.microscaler.io/v1alpha1")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,

    /// Kind of the referenced resource (e.g., "Switch", "Subnet")
    pub kind: String,

    /// Name of the referenced resource
    pub name: String,

    /// Namespace of the referenced resource (defaults to same namespace as the referencing resource)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    /// UID of the referenced resource, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
}

impl ResourceReference {
    /// Create a reference to a fabric CRD in the same API group
    pub fn fabric(kind: &str, name: String, namespace: Option<String>, uid: Option<String>) -> Self {
        Self {
            api_version: Some(API_VERSION.to_string()),
            kind: kind.to_string(),
            name,
            namespace,
            uid,
        }
    }

    /// Build a reference from any kube resource carrying metadata
    pub fn from_resource<K>(resource: &K) -> Self
    where
        K: kube::Resource<DynamicType = ()>,
    {
        let meta = resource.meta();
        Self {
            api_version: Some(K::api_version(&()).to_string()),
            kind: K::kind(&()).to_string(),
            name: meta.name.clone().unwrap_or_default(),
            namespace: meta.namespace.clone(),
            uid: meta.uid.clone(),
        }
    }
}

/// Reference to an object by name in the same namespace
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct LocalObjectReference {
    /// Name of the referenced object
    pub name: String,
}

impl LocalObjectReference {
    /// Create a new local reference
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}
