//! IP Custom Resource Definition
//!
//! A single address reserved out of a Subnet. Used for switch loopbacks.

use super::AllocationState;
use crate::network::AddressFamily;
use crate::references::{LocalObjectReference, ResourceReference};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Default)]
#[kube(
    group = "dcops.microscaler.io",
    version = "v1alpha1",
    kind = "IP",
    plural = "ips",
    namespaced,
    status = "IPAllocationStatus",
    printcolumn = r#"{"name":"Reserved","type":"string","jsonPath":".status.reserved"}"#,
    printcolumn = r#"{"name":"State","type":"string","jsonPath":".status.state"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct IPSpec {
    /// Subnet to allocate from
    pub subnet: LocalObjectReference,

    /// Explicit address to reserve
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,

    /// Object this address is reserved for
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consumer: Option<ResourceReference>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct IPAllocationStatus {
    /// Allocation state
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<AllocationState>,

    /// Reserved address
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reserved: Option<String>,

    /// Failure or progress message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl IP {
    /// Allocation state, if reported
    pub fn state(&self) -> Option<AllocationState> {
        self.status.as_ref().and_then(|s| s.state)
    }

    /// Reserved address of a finished IP
    pub fn reserved(&self) -> Option<&str> {
        match &self.status {
            Some(status) if status.state == Some(AllocationState::Finished) => {
                status.reserved.as_deref()
            }
            _ => None,
        }
    }

    /// Address family of the reserved address
    pub fn address_family(&self) -> Option<AddressFamily> {
        self.reserved().map(AddressFamily::of_address)
    }
}
