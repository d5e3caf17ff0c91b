//! SwitchConfig CRD
//!
//! Shared fabric policy matched to switches by label selector: default port
//! parameters, required address families, and where address pools live.

use crate::network::{AddressFamiliesMap, PortParameters};
use crate::selectors::{IpamSelection, LabelSelectorSpec};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Default)]
#[kube(
    group = "dcops.microscaler.io",
    version = "v1alpha1",
    kind = "SwitchConfig",
    namespaced,
    shortname = "swcfg"
)]
#[serde(rename_all = "camelCase")]
pub struct SwitchConfigSpec {
    /// Switches this config applies to (informational; matching is driven by the switch's selector)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub switches: Option<LabelSelectorSpec>,

    /// Default parameters applied to every port
    #[serde(default)]
    pub port_defaults: PortParameters,

    /// Address management policy
    #[serde(default)]
    pub ipam: SwitchConfigIpam,
}

/// Address management policy of a SwitchConfig
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct SwitchConfigIpam {
    /// Required address families
    #[serde(default)]
    pub address_families: AddressFamiliesMap,

    /// Carrier subnets: pools south subnets are carved from
    #[serde(default)]
    pub carrier_subnets: IpamSelection,

    /// Loopback subnets: pools loopback IPs are allocated from
    #[serde(default)]
    pub loopback_subnets: IpamSelection,

    /// Labels identifying a switch's south subnets
    #[serde(default)]
    pub south_subnets: IpamSelection,

    /// Labels identifying a switch's loopback addresses
    #[serde(default)]
    pub loopback_addresses: IpamSelection,
}
