//! Inventory CRD
//!
//! Hardware snapshot of a device as discovered by the inventory agent: system
//! identity plus every NIC with its LLDP neighbors.

use crate::network::NeighborType;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// LLDP capability reported by end stations
pub const STATION_ONLY_CAPABILITY: &str = "Station Only";

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Default)]
#[kube(
    group = "dcops.microscaler.io",
    version = "v1alpha1",
    kind = "Inventory",
    namespaced,
    shortname = "inv"
)]
#[serde(rename_all = "camelCase")]
pub struct InventorySpec {
    /// System identity
    #[serde(default)]
    pub system: SystemInfo,

    /// Network interfaces
    #[serde(default)]
    pub nics: Vec<NicSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct SystemInfo {
    /// Hardware ID
    #[serde(default)]
    pub id: String,

    #[serde(default)]
    pub manufacturer: String,

    #[serde(default)]
    pub product_sku: String,

    #[serde(default)]
    pub serial_number: String,
}

/// One NIC as seen by the inventory agent
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct NicSpec {
    /// Interface name (e.g., "Ethernet0")
    pub name: String,

    /// MAC address
    #[serde(default)]
    pub mac_address: String,

    /// Speed in Mbit/s
    #[serde(default)]
    pub speed: u32,

    /// LLDP neighbors seen on this NIC
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub lldps: Vec<LldpSpec>,
}

/// LLDP neighbor record
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct LldpSpec {
    #[serde(default)]
    pub chassis_id: String,

    #[serde(default)]
    pub system_name: String,

    #[serde(default)]
    pub port_id: String,

    #[serde(default)]
    pub port_description: String,

    /// Advertised capabilities (e.g., "Bridge", "Router", "Station Only")
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub capabilities: Vec<String>,
}

impl LldpSpec {
    /// Neighbor type inferred from advertised capabilities
    ///
    /// End stations either advertise nothing or only "Station Only".
    pub fn neighbor_type(&self) -> NeighborType {
        if self.capabilities.is_empty()
            || self.capabilities.iter().any(|c| c == STATION_ONLY_CAPABILITY)
        {
            NeighborType::Machine
        } else {
            NeighborType::Switch
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_neighbor_type_from_capabilities() {
        let mut lldp = LldpSpec::default();
        assert_eq!(lldp.neighbor_type(), NeighborType::Machine);

        lldp.capabilities = vec![STATION_ONLY_CAPABILITY.to_string()];
        assert_eq!(lldp.neighbor_type(), NeighborType::Machine);

        lldp.capabilities = vec!["Bridge".to_string(), "Router".to_string()];
        assert_eq!(lldp.neighbor_type(), NeighborType::Switch);
    }
}
