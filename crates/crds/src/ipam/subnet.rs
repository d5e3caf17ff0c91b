//! Subnet Custom Resource Definition
//!
//! A CIDR reservation. Root pools carry an explicit `cidr`; child subnets name a
//! `parentSubnet` and ask for either a fixed `cidr`, a `prefixBits` size or a
//! `capacity` and the service carves a block out of the parent.

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
    kind = "Subnet",
    namespaced,
    status = "SubnetAllocationStatus",
    printcolumn = r#"{"name":"Reserved","type":"string","jsonPath":".status.reserved"}"#,
    printcolumn = r#"{"name":"State","type":"string","jsonPath":".status.state"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct SubnetSpec {
    /// Explicit CIDR to reserve
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cidr: Option<String>,

    /// Requested number of addresses (decimal string, may exceed 64 bits for IPv6)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity: Option<String>,

    /// Requested prefix length
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix_bits: Option<u8>,

    /// Subnet to carve this one from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_subnet: Option<LocalObjectReference>,

    /// Object this subnet is reserved for
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consumer: Option<ResourceReference>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct SubnetAllocationStatus {
    /// Address family of the reserved CIDR
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub address_family: Option<AddressFamily>,

    /// Allocation state
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<AllocationState>,

    /// Reserved CIDR
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reserved: Option<String>,

    /// Total addresses in the reserved CIDR (decimal string)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity: Option<String>,

    /// Addresses not yet handed out (decimal string)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity_left: Option<String>,

    /// Failure or progress message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Subnet {
    /// Allocation state, if reported
    pub fn state(&self) -> Option<AllocationState> {
        self.status.as_ref().and_then(|s| s.state)
    }

    /// Reserved CIDR of a finished subnet
    pub fn reserved(&self) -> Option<&str> {
        match &self.status {
            Some(status) if status.state == Some(AllocationState::Finished) => {
                status.reserved.as_deref()
            }
            _ => None,
        }
    }

    /// Address family, from status or inferred from the reserved CIDR
    pub fn address_family(&self) -> Option<AddressFamily> {
        let status = self.status.as_ref()?;
        status
            .address_family
            .or_else(|| status.reserved.as_deref().map(AddressFamily::of_address))
    }

    /// Remaining capacity of a finished subnet (0 when unknown)
    pub fn capacity_left(&self) -> u128 {
        self.status
            .as_ref()
            .and_then(|s| s.capacity_left.as_deref())
            .map(parse_capacity)
            .unwrap_or(0)
    }
}

/// Parse a decimal capacity string, saturating values that do not fit in 128 bits
pub fn parse_capacity(value: &str) -> u128 {
    let value = value.trim();
    match value.parse::<u128>() {
        Ok(v) => v,
        Err(_) if !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()) => u128::MAX,
        Err(_) => 0,
    }
}
