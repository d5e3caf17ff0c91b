//! Switch Custom Resource Definition
//!
//! Declarative representation of one physical network switch. The spec is authored by
//! operators and policy; the status is computed by the switch controller's state
//! pipeline and address orchestrator.

use crate::network::{
    AddressFamiliesMap, AddressFamily, Direction, NeighborType, PortParameters, SwitchRole,
};
use crate::references::{LocalObjectReference, ResourceReference};
use crate::selectors::{IpamSelection, LabelSelectorSpec};
use chrono::{DateTime, Utc};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Layer value meaning "not yet determined"
pub const UNDETERMINED_LAYER: u32 = 255;

/// SwitchSpec defines the desired state of a switch
#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Default)]
#[kube(
    group = "dcops.microscaler.io",
    version = "v1alpha1",
    kind = "Switch",
    namespaced,
    status = "SwitchStatus",
    shortname = "sw",
    printcolumn = r#"{"name":"State","type":"string","jsonPath":".status.state"}"#,
    printcolumn = r#"{"name":"Role","type":"string","jsonPath":".status.role"}"#,
    printcolumn = r#"{"name":"Layer","type":"integer","jsonPath":".status.layer"}"#,
    printcolumn = r#"{"name":"ASN","type":"integer","jsonPath":".status.asn"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct SwitchSpec {
    /// Switch is managed by the controller
    #[serde(default)]
    pub managed: bool,

    /// Switch is cordoned (no new workloads routed through it)
    #[serde(default)]
    pub cordon: bool,

    /// Switch sits at the top of the fabric (always layer 0, role spine)
    #[serde(default)]
    pub top_spine: bool,

    /// Scan ports for neighbors
    #[serde(default)]
    pub scan_ports: bool,

    /// Inventory record describing this switch's hardware
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inventory_ref: Option<LocalObjectReference>,

    /// Selects the SwitchConfig applied to this switch
    /// Falls back to configs labelled with the switch's layer when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_selector: Option<LabelSelectorSpec>,

    /// Per-switch overrides of the IPAM policy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipam: Option<SwitchIpamSpec>,

    /// Per-switch interface parameter overrides
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interfaces: Option<InterfacesSpec>,
}

/// Per-switch IPAM overrides; unset fields fall back to the matched SwitchConfig
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct SwitchIpamSpec {
    /// Required address families
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address_families: Option<AddressFamiliesMap>,

    /// Where carrier subnets (pools for south subnets) live
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub carrier_subnets: Option<IpamSelection>,

    /// Where loopback subnets (pools for loopback IPs) live
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loopback_subnets: Option<IpamSelection>,

    /// How this switch's south subnets are labelled
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub south_subnets: Option<IpamSelection>,

    /// How this switch's loopback addresses are labelled
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loopback_addresses: Option<IpamSelection>,
}

/// Interface parameter overrides
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct InterfacesSpec {
    /// Parameters applied to every port, on top of the config defaults
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub defaults: Option<PortParameters>,

    /// Parameters for individual ports (highest precedence)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub overrides: Vec<InterfaceOverride>,
}

/// Override for a single named port
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct InterfaceOverride {
    /// Port name (e.g., "Ethernet0")
    pub name: String,

    /// Parameters for this port
    #[serde(default)]
    pub parameters: PortParameters,

    /// Additional user-declared addresses in CIDR notation
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ip: Vec<String>,
}

impl InterfacesSpec {
    /// Override for the named port, if any
    pub fn override_for(&self, name: &str) -> Option<&InterfaceOverride> {
        self.overrides.iter().find(|o| o.name == name)
    }
}

/// SwitchStatus defines the observed state of a switch
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SwitchStatus {
    /// Lifecycle state
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<SwitchState>,

    /// Human-readable message explaining the state
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Matched SwitchConfig
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_ref: Option<ResourceReference>,

    /// Autonomous system number derived from the IPv4 loopback
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asn: Option<u32>,

    /// Total number of ports reported by inventory
    #[serde(default)]
    pub total_ports: u32,

    /// Number of switch ports (after breakout)
    #[serde(default)]
    pub switch_ports: u32,

    /// Topological role
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<SwitchRole>,

    /// Topological layer (255 = undetermined)
    #[serde(default = "default_layer")]
    pub layer: u32,

    /// Interfaces by name
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub interfaces: BTreeMap<String, InterfaceStatus>,

    /// Aggregate south subnets
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subnets: Vec<SubnetStatus>,

    /// Loopback addresses
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub loopback_addresses: Vec<IpAddressStatus>,

    /// Health facts, one per pipeline concern
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<SwitchCondition>,
}

fn default_layer() -> u32 {
    UNDETERMINED_LAYER
}

impl Default for SwitchStatus {
    fn default() -> Self {
        Self {
            state: None,
            message: None,
            config_ref: None,
            asn: None,
            total_ports: 0,
            switch_ports: 0,
            role: None,
            layer: UNDETERMINED_LAYER,
            interfaces: BTreeMap::new(),
            subnets: Vec::new(),
            loopback_addresses: Vec::new(),
            conditions: Vec::new(),
        }
    }
}

impl SwitchStatus {
    /// Clean baseline written on the first pass
    pub fn initial() -> Self {
        Self {
            state: Some(SwitchState::Initial),
            ..Self::default()
        }
    }

    /// Condition of the given type, if recorded
    pub fn condition(&self, condition_type: ConditionType) -> Option<&SwitchCondition> {
        self.conditions.iter().find(|c| c.condition_type == condition_type)
    }

    /// True if the condition is recorded and true
    pub fn condition_true(&self, condition_type: ConditionType) -> bool {
        self.condition(condition_type).is_some_and(|c| c.status)
    }
}

/// One physical or breakout-derived logical port
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct InterfaceStatus {
    /// MAC address
    #[serde(default)]
    pub mac_address: String,

    /// Link speed in Mbit/s
    #[serde(default)]
    pub speed: u32,

    /// Direction relative to the fabric hierarchy
    #[serde(default)]
    pub direction: Direction,

    /// Effective port parameters
    #[serde(default)]
    pub parameters: PortParameters,

    /// Assigned addresses
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ip: Vec<IpAddressStatus>,

    /// Neighbor on the other end of the link
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub peer: Option<PeerStatus>,
}

/// Neighbor of an interface
///
/// The LLDP data and the resolved reference are tracked independently: LLDP is filled
/// from inventory, the reference once the neighbor is matched to a Switch resource.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct PeerStatus {
    /// Resolved peer Switch resource
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_ref: Option<ResourceReference>,

    /// Neighbor identity as reported by LLDP
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lldp: Option<PeerLldp>,
}

/// LLDP-reported neighbor identity
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PeerLldp {
    /// Chassis ID of the neighbor
    pub chassis_id: String,

    /// System name of the neighbor
    #[serde(default)]
    pub system_name: String,

    /// Port ID on the neighbor
    #[serde(default)]
    pub port_id: String,

    /// Port description on the neighbor
    #[serde(default)]
    pub port_description: String,

    /// Inferred neighbor type
    pub neighbor_type: NeighborType,
}

/// An address assigned to a loopback or port
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct IpAddressStatus {
    /// Backing IP resource, for loopbacks
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_ref: Option<ResourceReference>,

    /// Address, in CIDR notation for port addresses
    pub address: String,

    /// Address family
    pub address_family: AddressFamily,

    /// Declared by the user rather than derived
    #[serde(default)]
    pub extra_address: bool,
}

/// An aggregate south subnet assigned to the switch
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SubnetStatus {
    /// Backing Subnet resource
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_ref: Option<ResourceReference>,

    /// Reserved CIDR
    pub cidr: String,

    /// Address family
    pub address_family: AddressFamily,
}

/// Named health fact
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SwitchCondition {
    /// Condition name
    #[serde(rename = "type")]
    pub condition_type: ConditionType,

    /// Whether the fact holds
    pub status: bool,

    /// Machine-readable reason (only set while false)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// Human-readable message (only set while false)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Last time the condition was evaluated
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_update_timestamp: Option<DateTime<Utc>>,

    /// Last time `status` flipped
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_timestamp: Option<DateTime<Utc>>,
}

/// Condition vocabulary
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Hash)]
pub enum ConditionType {
    Initialized,
    #[serde(rename = "InterfacesOK")]
    InterfacesOk,
    #[serde(rename = "ConfigRefOK")]
    ConfigRefOk,
    #[serde(rename = "PortParametersOK")]
    PortParametersOk,
    #[serde(rename = "NeighborsOK")]
    NeighborsOk,
    #[serde(rename = "LayerAndRoleOK")]
    LayerAndRoleOk,
    #[serde(rename = "LoopbacksOK")]
    LoopbacksOk,
    #[serde(rename = "AsnOK")]
    AsnOk,
    #[serde(rename = "SubnetsOK")]
    SubnetsOk,
    #[serde(rename = "IPAddressesOK")]
    IpAddressesOk,
    /// Recorded as an event only, never persisted in the condition list
    Ready,
}

impl ConditionType {
    /// Wire name of the condition
    pub fn as_str(&self) -> &'static str {
        match self {
            ConditionType::Initialized => "Initialized",
            ConditionType::InterfacesOk => "InterfacesOK",
            ConditionType::ConfigRefOk => "ConfigRefOK",
            ConditionType::PortParametersOk => "PortParametersOK",
            ConditionType::NeighborsOk => "NeighborsOK",
            ConditionType::LayerAndRoleOk => "LayerAndRoleOK",
            ConditionType::LoopbacksOk => "LoopbacksOK",
            ConditionType::AsnOk => "AsnOK",
            ConditionType::SubnetsOk => "SubnetsOK",
            ConditionType::IpAddressesOk => "IPAddressesOK",
            ConditionType::Ready => "Ready",
        }
    }
}

/// Switch lifecycle state
///
/// Serializes as PascalCase but also accepts lowercase values.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub enum SwitchState {
    #[serde(alias = "initial")]
    Initial,
    #[serde(alias = "processing")]
    Processing,
    #[serde(alias = "ready")]
    Ready,
    #[serde(alias = "invalid")]
    Invalid,
    #[serde(alias = "pending")]
    Pending,
}

impl SwitchState {
    /// Wire name of the state
    pub fn as_str(&self) -> &'static str {
        match self {
            SwitchState::Initial => "Initial",
            SwitchState::Processing => "Processing",
            SwitchState::Ready => "Ready",
            SwitchState::Invalid => "Invalid",
            SwitchState::Pending => "Pending",
        }
    }
}
