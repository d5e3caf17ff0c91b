//! Network value types shared by the switch, config and address-pool CRDs

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// IP address family
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AddressFamily {
    #[serde(rename = "IPv4", alias = "ipv4")]
    IPv4,
    #[serde(rename = "IPv6", alias = "ipv6")]
    IPv6,
}

impl AddressFamily {
    /// Both families, in the order they are processed
    pub const ALL: [AddressFamily; 2] = [AddressFamily::IPv4, AddressFamily::IPv6];

    /// Canonical name ("IPv4" / "IPv6")
    pub fn as_str(&self) -> &'static str {
        match self {
            AddressFamily::IPv4 => "IPv4",
            AddressFamily::IPv6 => "IPv6",
        }
    }

    /// Width of an address of this family in bits
    pub fn bits(&self) -> u8 {
        match self {
            AddressFamily::IPv4 => 32,
            AddressFamily::IPv6 => 128,
        }
    }

    /// Infer the family from the textual shape of an address or CIDR
    pub fn of_address(address: &str) -> Self {
        if address.contains(':') {
            AddressFamily::IPv6
        } else {
            AddressFamily::IPv4
        }
    }
}

impl fmt::Display for AddressFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which address families are required
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AddressFamiliesMap {
    /// IPv4 addressing required
    #[serde(default = "default_true")]
    pub ipv4: bool,

    /// IPv6 addressing required
    #[serde(default)]
    pub ipv6: bool,
}

fn default_true() -> bool {
    true
}

impl Default for AddressFamiliesMap {
    fn default() -> Self {
        Self {
            ipv4: true,
            ipv6: false,
        }
    }
}

impl AddressFamiliesMap {
    /// Whether the given family is required
    pub fn requires(&self, family: AddressFamily) -> bool {
        match family {
            AddressFamily::IPv4 => self.ipv4,
            AddressFamily::IPv6 => self.ipv6,
        }
    }

    /// Required families in processing order
    pub fn families(&self) -> Vec<AddressFamily> {
        AddressFamily::ALL
            .into_iter()
            .filter(|f| self.requires(*f))
            .collect()
    }
}

/// Forward error correction mode of a port
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Fec {
    None,
    Rs,
    Fc,
}

/// Administrative state of a port
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PortState {
    Up,
    Down,
}

/// Port parameters; every field is optional so that layers of policy can be merged
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct PortParameters {
    /// Lane count (1, 2 or 4)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lanes: Option<u32>,

    /// MTU in bytes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mtu: Option<u32>,

    /// Forward error correction
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fec: Option<Fec>,

    /// IPv4 mask length of per-port networks
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipv4_mask_length: Option<u8>,

    /// IPv6 prefix length of per-port networks
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipv6_prefix: Option<u8>,

    /// Administrative state
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<PortState>,
}

impl PortParameters {
    /// Overlay `other` on top of `self`: fields set in `other` win
    pub fn merge(&mut self, other: &PortParameters) {
        if other.lanes.is_some() {
            self.lanes = other.lanes;
        }
        if other.mtu.is_some() {
            self.mtu = other.mtu;
        }
        if other.fec.is_some() {
            self.fec = other.fec;
        }
        if other.ipv4_mask_length.is_some() {
            self.ipv4_mask_length = other.ipv4_mask_length;
        }
        if other.ipv6_prefix.is_some() {
            self.ipv6_prefix = other.ipv6_prefix;
        }
        if other.state.is_some() {
            self.state = other.state;
        }
    }

    /// Per-port network prefix length for the given family
    pub fn prefix_length(&self, family: AddressFamily) -> Option<u8> {
        match family {
            AddressFamily::IPv4 => self.ipv4_mask_length,
            AddressFamily::IPv6 => self.ipv6_prefix,
        }
    }
}

/// Direction of a port relative to the fabric hierarchy
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Toward spines (upstream)
    North,
    /// Toward leaves and servers (downstream)
    #[default]
    South,
}

/// Kind of device seen on the other end of a link
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NeighborType {
    Machine,
    Switch,
}

/// Topological role of a switch
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum SwitchRole {
    Spine,
    Leaf,
    EdgeLeaf,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_overrides_only_set_fields() {
        let mut params = PortParameters {
            lanes: Some(4),
            mtu: Some(9100),
            fec: Some(Fec::Rs),
            ipv4_mask_length: Some(30),
            ipv6_prefix: Some(127),
            state: Some(PortState::Up),
        };
        params.merge(&PortParameters {
            lanes: Some(1),
            fec: Some(Fec::None),
            ..Default::default()
        });

        assert_eq!(params.lanes, Some(1));
        assert_eq!(params.fec, Some(Fec::None));
        assert_eq!(params.mtu, Some(9100));
        assert_eq!(params.ipv4_mask_length, Some(30));
    }

    #[test]
    fn test_address_family_serialization() {
        assert_eq!(serde_json::to_string(&AddressFamily::IPv6).ok().as_deref(), Some("\"IPv6\""));
        let parsed: AddressFamily = serde_json::from_str("\"ipv4\"").unwrap_or(AddressFamily::IPv6);
        assert_eq!(parsed, AddressFamily::IPv4);
        assert_eq!(AddressFamily::of_address("fd00::1/128"), AddressFamily::IPv6);
        assert_eq!(AddressFamily::of_address("10.0.0.1"), AddressFamily::IPv4);
    }

    #[test]
    fn test_required_families() {
        let families = AddressFamiliesMap { ipv4: true, ipv6: true };
        assert_eq!(families.families(), vec![AddressFamily::IPv4, AddressFamily::IPv6]);
        assert_eq!(AddressFamiliesMap::default().families(), vec![AddressFamily::IPv4]);
    }
}
