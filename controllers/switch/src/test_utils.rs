//! Test utilities for unit testing reconcilers
//!
//! Builders for switches, inventories, configs and address pools, plus a
//! reconciler wired to the in-memory store.
//!
//! The default fabric policy used by these helpers: 4-lane ports with /31 IPv4
//! port networks, loopbacks from the pool labelled `pool=loopbacks`, south
//! subnets carved from the pool labelled `pool=carrier`.

use crate::addressing::{block_size, parse_network};
use crate::config::ControllerConfig;
use crate::events::RecordingEventPublisher;
use crate::metrics::Metrics;
use crate::reconciler::Reconciler;
use crate::reconciler::environment::{IpamPolicy, SwitchEnvironment};
use crds::labels;
use crds::*;
use fabric_client::MockFabricClient;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::collections::BTreeMap;
use std::sync::Arc;

pub const TEST_NAMESPACE: &str = "default";
pub const FABRIC_LABEL: (&str, &str) = ("fabric", "test");
pub const LOOPBACK_POOL: &str = "loopbacks";
pub const CARRIER_POOL: &str = "carrier";

fn label_map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect()
}

fn pool_selection(pool: &str) -> IpamSelection {
    IpamSelection {
        label_selector: Some(LabelSelectorSpec::from_labels(label_map(&[("pool", pool)]))),
        field_selector: None,
    }
}

/// Helper to create an onboarded test switch whose inventory shares its name
pub fn create_test_switch(name: &str, chassis_id: &str) -> Switch {
    let mut annotations = BTreeMap::new();
    annotations.insert(labels::CHASSIS_ID_ANNOTATION.to_string(), chassis_id.to_string());

    Switch {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(TEST_NAMESPACE.to_string()),
            uid: Some(format!("uid-{}", name)),
            labels: Some(label_map(&[(labels::ONBOARDED, "true")])),
            annotations: Some(annotations),
            ..Default::default()
        },
        spec: SwitchSpec {
            managed: true,
            inventory_ref: Some(LocalObjectReference::new(name)),
            config_selector: Some(LabelSelectorSpec::from_labels(label_map(&[FABRIC_LABEL]))),
            ..Default::default()
        },
        status: None,
    }
}

/// Helper to create a top spine
pub fn create_top_spine(name: &str, chassis_id: &str) -> Switch {
    let mut switch = create_test_switch(name, chassis_id);
    switch.spec.top_spine = true;
    switch
}

/// NIC cabled to another switch's port
pub fn switch_nic(name: &str, peer_chassis: &str, peer_port: &str) -> NicSpec {
    NicSpec {
        name: name.to_string(),
        mac_address: format!("02:00:00:00:00:{:02x}", name.len()),
        speed: 100_000,
        lldps: vec![LldpSpec {
            chassis_id: peer_chassis.to_string(),
            system_name: format!("sw-{}", peer_chassis),
            port_id: peer_port.to_string(),
            port_description: peer_port.to_string(),
            capabilities: vec!["Bridge".to_string(), "Router".to_string()],
        }],
    }
}

/// NIC cabled to a server
pub fn machine_nic(name: &str) -> NicSpec {
    NicSpec {
        lldps: vec![LldpSpec {
            chassis_id: "be:ef:00:00:00:01".to_string(),
            system_name: "server-1".to_string(),
            port_id: "eth0".to_string(),
            port_description: "eth0".to_string(),
            capabilities: Vec::new(),
        }],
        ..unconnected_nic(name)
    }
}

/// NIC without an LLDP neighbor
pub fn unconnected_nic(name: &str) -> NicSpec {
    NicSpec {
        name: name.to_string(),
        mac_address: "02:00:00:00:00:ff".to_string(),
        speed: 100_000,
        lldps: Vec::new(),
    }
}

/// Helper to create test Inventory
pub fn create_test_inventory(name: &str, nics: Vec<NicSpec>) -> Inventory {
    Inventory {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(TEST_NAMESPACE.to_string()),
            ..Default::default()
        },
        spec: InventorySpec {
            system: SystemInfo {
                id: format!("sys-{}", name),
                ..Default::default()
            },
            nics,
        },
    }
}

/// Helper to create the test fabric's SwitchConfig
pub fn create_test_switch_config(name: &str) -> SwitchConfig {
    SwitchConfig {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(TEST_NAMESPACE.to_string()),
            labels: Some(label_map(&[FABRIC_LABEL])),
            uid: Some(format!("uid-{}", name)),
            ..Default::default()
        },
        spec: SwitchConfigSpec {
            switches: None,
            port_defaults: PortParameters {
                lanes: Some(4),
                mtu: Some(9100),
                fec: Some(Fec::Rs),
                ipv4_mask_length: Some(31),
                ipv6_prefix: Some(127),
                state: Some(PortState::Up),
            },
            ipam: SwitchConfigIpam {
                address_families: AddressFamiliesMap::default(),
                carrier_subnets: pool_selection(CARRIER_POOL),
                loopback_subnets: pool_selection(LOOPBACK_POOL),
                south_subnets: IpamSelection::default(),
                loopback_addresses: IpamSelection::default(),
            },
        },
    }
}

/// Status of a subnet the pool service finished reserving
pub fn finished_subnet_status(cidr: &str) -> SubnetAllocationStatus {
    let family = AddressFamily::of_address(cidr);
    let capacity = parse_network(cidr)
        .ok()
        .and_then(|net| block_size(family, net.prefix()).ok())
        .unwrap_or(0)
        .to_string();
    SubnetAllocationStatus {
        address_family: Some(family),
        state: Some(AllocationState::Finished),
        reserved: Some(cidr.to_string()),
        capacity: Some(capacity.clone()),
        capacity_left: Some(capacity),
        message: None,
    }
}

/// Status of a subnet the pool service rejected
pub fn failed_subnet_status() -> SubnetAllocationStatus {
    SubnetAllocationStatus {
        state: Some(AllocationState::Failed),
        message: Some("parent subnet exhausted".to_string()),
        ..Default::default()
    }
}

/// Status of an IP the pool service finished reserving
pub fn finished_ip_status(address: &str) -> IPAllocationStatus {
    IPAllocationStatus {
        state: Some(AllocationState::Finished),
        reserved: Some(address.to_string()),
        message: None,
    }
}

/// Status of an IP the pool service rejected
pub fn failed_ip_status() -> IPAllocationStatus {
    IPAllocationStatus {
        state: Some(AllocationState::Failed),
        reserved: None,
        message: Some("subnet exhausted".to_string()),
    }
}

/// Helper to create a finished pool subnet labelled `pool=<pool>`
pub fn create_pool_subnet(name: &str, cidr: &str, pool: &str) -> Subnet {
    Subnet {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(TEST_NAMESPACE.to_string()),
            labels: Some(label_map(&[("pool", pool)])),
            ..Default::default()
        },
        spec: SubnetSpec {
            cidr: Some(cidr.to_string()),
            ..Default::default()
        },
        status: Some(finished_subnet_status(cidr)),
    }
}

/// Finished IP carrying the given labels
pub fn create_finished_ip(name: &str, address: &str, ip_labels: BTreeMap<String, String>) -> IP {
    IP {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(TEST_NAMESPACE.to_string()),
            labels: Some(ip_labels),
            ..Default::default()
        },
        spec: IPSpec {
            subnet: LocalObjectReference::new(LOOPBACK_POOL),
            ip: None,
            consumer: None,
        },
        status: Some(finished_ip_status(address)),
    }
}

/// Finished subnet carrying the given labels
pub fn create_finished_subnet(name: &str, cidr: &str, subnet_labels: BTreeMap<String, String>) -> Subnet {
    Subnet {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(TEST_NAMESPACE.to_string()),
            labels: Some(subnet_labels),
            ..Default::default()
        },
        spec: SubnetSpec::default(),
        status: Some(finished_subnet_status(cidr)),
    }
}

/// Store with the test config and both address pools
pub fn create_test_store() -> MockFabricClient {
    let mock = MockFabricClient::new();
    mock.add_switch_config(create_test_switch_config("fabric"));
    mock.add_subnet(create_pool_subnet(LOOPBACK_POOL, "10.255.0.0/24", LOOPBACK_POOL));
    mock.add_subnet(create_pool_subnet(CARRIER_POOL, "10.0.0.0/16", CARRIER_POOL));
    mock
}

/// Environment with the given inventory and siblings and the test config
pub fn create_test_env(inventory: Option<Inventory>, switches: Vec<Switch>) -> SwitchEnvironment {
    SwitchEnvironment {
        inventory,
        switches: Some(switches),
        config: Some(create_test_switch_config("fabric")),
        asn_base: crate::config::DEFAULT_ASN_BASE,
        ..Default::default()
    }
}

/// IPAM policy of the test config
pub fn create_test_policy() -> IpamPolicy {
    IpamPolicy::effective(
        &create_test_switch("any", "00:00:00:00:00:00"),
        &create_test_switch_config("fabric"),
    )
}

/// Reconciler over the mock store, with events recorded in memory
pub fn create_test_reconciler(mock: MockFabricClient) -> (Reconciler, RecordingEventPublisher) {
    let events = RecordingEventPublisher::default();
    let metrics = Arc::new(Metrics::new().expect("metrics registry"));
    let reconciler = Reconciler::new(
        mock,
        Arc::new(events.clone()),
        ControllerConfig::default(),
        metrics,
    );
    (reconciler, events)
}
