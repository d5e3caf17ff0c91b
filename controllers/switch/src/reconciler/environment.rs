//! Per-pass environment of a switch
//!
//! Everything the state pipeline reads besides the switch itself is fetched here,
//! fresh on every pass. A slot left `None` means the dependency is missing or not
//! yet satisfied; the pipeline step that needs it decides what that means.

use crate::addressing::{
    block_size, network_of, parse_network, port_subnet_name, south_demand, south_ports,
};
use crate::config::ControllerConfig;
use crate::error::ControllerError;
use crate::reconcile_helpers::selection_labels;
use crds::labels;
use crds::{
    AddressFamiliesMap, AddressFamily, ConditionType, IP, Inventory, IpamSelection,
    LabelSelectorSpec, Subnet, Switch, SwitchConfig, parse_capacity,
};
use fabric_client::{FabricClientTrait, FabricError, ListQuery};
use kube::ResourceExt;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// IPAM policy in effect for a switch: the config's policy with the switch's overrides applied
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IpamPolicy {
    pub address_families: AddressFamiliesMap,
    pub carrier_subnets: IpamSelection,
    pub loopback_subnets: IpamSelection,
    pub south_subnets: IpamSelection,
    pub loopback_addresses: IpamSelection,
}

impl IpamPolicy {
    pub fn effective(switch: &Switch, config: &SwitchConfig) -> Self {
        let base = &config.spec.ipam;
        let overrides = switch.spec.ipam.clone().unwrap_or_default();
        Self {
            address_families: overrides.address_families.unwrap_or(base.address_families),
            carrier_subnets: overrides
                .carrier_subnets
                .unwrap_or_else(|| base.carrier_subnets.clone()),
            loopback_subnets: overrides
                .loopback_subnets
                .unwrap_or_else(|| base.loopback_subnets.clone()),
            south_subnets: overrides
                .south_subnets
                .unwrap_or_else(|| base.south_subnets.clone()),
            loopback_addresses: overrides
                .loopback_addresses
                .unwrap_or_else(|| base.loopback_addresses.clone()),
        }
    }
}

/// Resources a switch's state pipeline is computed from
#[derive(Debug, Clone, Default)]
pub struct SwitchEnvironment {
    pub inventory: Option<Inventory>,
    pub switches: Option<Vec<Switch>>,
    pub config: Option<SwitchConfig>,
    pub policy: Option<IpamPolicy>,
    pub loopback_ips: Option<Vec<IP>>,
    pub south_subnets: Option<Vec<Subnet>>,
    pub port_subnets: Option<Vec<Subnet>>,
    pub asn_base: u32,
}

impl SwitchEnvironment {
    /// Sibling switch by name
    pub fn switch(&self, name: &str) -> Option<&Switch> {
        self.switches
            .as_ref()?
            .iter()
            .find(|s| s.metadata.name.as_deref() == Some(name))
    }
}

/// Whether every required family is present; returns the missing ones
pub fn address_families_match_config(
    required: &AddressFamiliesMap,
    present: &[AddressFamily],
) -> (bool, Vec<AddressFamily>) {
    let missing: Vec<AddressFamily> = required
        .families()
        .into_iter()
        .filter(|f| !present.contains(f))
        .collect();
    (missing.is_empty(), missing)
}

fn owner_labels(switch: &Switch, purpose: &str) -> BTreeMap<String, String> {
    let mut owned = BTreeMap::new();
    owned.insert(labels::OWNER.to_string(), switch.name_any());
    owned.insert(labels::PURPOSE.to_string(), purpose.to_string());
    owned
}

/// Labels identifying a switch's loopback IPs
pub fn loopback_ip_labels(switch: &Switch, policy: &IpamPolicy) -> Result<BTreeMap<String, String>, ControllerError> {
    let mut selected = selection_labels(&policy.loopback_addresses, switch)?;
    selected.extend(owner_labels(switch, labels::PURPOSE_LOOPBACK));
    Ok(selected)
}

/// Labels identifying a switch's south subnets
pub fn south_subnet_labels(switch: &Switch, policy: &IpamPolicy) -> Result<BTreeMap<String, String>, ControllerError> {
    let mut selected = selection_labels(&policy.south_subnets, switch)?;
    selected.extend(owner_labels(switch, labels::PURPOSE_SOUTH_SUBNET));
    Ok(selected)
}

/// Labels identifying a switch's per-port subnets
pub fn port_subnet_labels(switch: &Switch) -> BTreeMap<String, String> {
    let mut owned = owner_labels(switch, labels::PURPOSE_SWITCH_PORT);
    owned.insert(labels::GENERATED_BY.to_string(), labels::MANAGER.to_string());
    owned
}

/// Selector used to find the switch's config
///
/// The switch's own selector, or configs labelled with the switch's layer.
pub fn config_selector(switch: &Switch) -> LabelSelectorSpec {
    match &switch.spec.config_selector {
        Some(selector) => selector.clone(),
        None => {
            let layer = switch
                .status
                .as_ref()
                .map(|s| s.layer)
                .unwrap_or(crds::UNDETERMINED_LAYER);
            let mut by_layer = BTreeMap::new();
            by_layer.insert(labels::LAYER.to_string(), layer.to_string());
            LabelSelectorSpec::from_labels(by_layer)
        }
    }
}

/// Any store failure leaves the slot empty; only unexpected ones are logged
fn best_effort<T>(result: Result<T, FabricError>, what: &str, switch: &Switch) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(FabricError::NotFound(_)) => {
            debug!("{} for switch {} not found", what, switch.name_any());
            None
        }
        Err(e) => {
            warn!("Failed to fetch {} for switch {}: {}", what, switch.name_any(), e);
            None
        }
    }
}

fn loopbacks_satisfied(ips: Vec<IP>, required: &AddressFamiliesMap) -> Option<Vec<IP>> {
    let finished: Vec<IP> = ips.into_iter().filter(|ip| ip.reserved().is_some()).collect();
    let present: Vec<AddressFamily> = finished.iter().filter_map(|ip| ip.address_family()).collect();
    let (ok, missing) = address_families_match_config(required, &present);
    if ok {
        Some(finished)
    } else {
        debug!("Loopback addresses missing for families {:?}", missing);
        None
    }
}

/// Total addresses of a finished subnet's reservation
pub fn subnet_capacity(subnet: &Subnet) -> u128 {
    let from_status = subnet
        .status
        .as_ref()
        .and_then(|s| s.capacity.as_deref())
        .map(parse_capacity);
    from_status
        .or_else(|| {
            let net = parse_network(subnet.reserved()?).ok()?;
            let family = subnet.address_family()?;
            block_size(family, net.prefix()).ok()
        })
        .unwrap_or(0)
}

fn south_subnets_satisfied(
    subnets: Vec<Subnet>,
    required: &AddressFamiliesMap,
    switch: &Switch,
) -> Option<Vec<Subnet>> {
    let finished: Vec<Subnet> = subnets.into_iter().filter(|s| s.reserved().is_some()).collect();
    let present: Vec<AddressFamily> = finished.iter().filter_map(|s| s.address_family()).collect();
    let (ok, missing) = address_families_match_config(required, &present);
    if !ok {
        debug!("South subnets missing for families {:?}", missing);
        return None;
    }

    let interfaces = &switch.status.as_ref()?.interfaces;
    for family in required.families() {
        let demand = south_demand(interfaces, family).ok()?;
        let capacity: u128 = finished
            .iter()
            .filter(|s| s.address_family() == Some(family))
            .map(subnet_capacity)
            .max()
            .unwrap_or(0);
        if capacity < demand {
            debug!("{} south subnet holds {} addresses, {} needed", family, capacity, demand);
            return None;
        }
    }
    Some(finished)
}

fn condition_true(switch: &Switch, condition: ConditionType) -> bool {
    switch
        .status
        .as_ref()
        .is_some_and(|s| s.condition_true(condition))
}

/// Per-port subnet CIDRs the switch needs, by deterministic resource name
pub fn required_port_subnets(switch: &Switch) -> Result<BTreeMap<String, (String, String)>, ControllerError> {
    let mut required = BTreeMap::new();
    let name = switch.name_any();
    let Some(status) = switch.status.as_ref() else {
        return Ok(required);
    };
    for (_, port, iface) in south_ports(&status.interfaces) {
        for address in iface.ip.iter().filter(|a| !a.extra_address) {
            let network = network_of(&address.address)
                .map_err(|e| ControllerError::Reconciliation(e.to_string()))?;
            let cidr = network.to_string();
            let resource = port_subnet_name(&name, port, &cidr);
            required.insert(resource, (port.clone(), cidr));
        }
    }
    Ok(required)
}

fn port_subnets_satisfied(subnets: Vec<Subnet>, switch: &Switch) -> Option<Vec<Subnet>> {
    let required = required_port_subnets(switch).ok()?;
    let all_present = required.keys().all(|name| {
        subnets
            .iter()
            .any(|s| s.metadata.name.as_deref() == Some(name.as_str()) && s.reserved().is_some())
    });
    all_present.then_some(subnets)
}

/// Fetch the environment of one switch
///
/// Every slot degrades to `None` on its own; a store failure never aborts the
/// pass, so the pipeline still records why the switch is not ready.
pub async fn resolve(
    client: &dyn FabricClientTrait,
    switch: &Switch,
    settings: &ControllerConfig,
) -> SwitchEnvironment {
    let namespace = switch.namespace().unwrap_or_else(|| settings.namespace.clone());
    let mut env = SwitchEnvironment {
        asn_base: settings.asn_base,
        ..Default::default()
    };

    // Inventory
    if let Some(inventory_ref) = &switch.spec.inventory_ref {
        env.inventory = best_effort(
            client.get_inventory(&namespace, &inventory_ref.name).await,
            "inventory",
            switch,
        );
    }

    // Siblings
    let mut onboarded = BTreeMap::new();
    onboarded.insert(labels::ONBOARDED.to_string(), "true".to_string());
    let query = ListQuery::labels(onboarded).with_limit(settings.switch_list_limit);
    env.switches = best_effort(client.list_switches(&namespace, &query).await, "switches", switch);

    // Config: exactly one must match
    let configs = best_effort(
        client
            .list_switch_configs(&namespace, &ListQuery::selector(config_selector(switch)))
            .await,
        "switch configs",
        switch,
    )
    .unwrap_or_default();
    match configs.len() {
        1 => env.config = configs.into_iter().next(),
        0 => debug!("No SwitchConfig matches switch {}", switch.name_any()),
        n => warn!("{} SwitchConfigs match switch {}, expected exactly one", n, switch.name_any()),
    }

    let Some(config) = env.config.as_ref() else {
        return env;
    };
    let policy = IpamPolicy::effective(switch, config);

    // Loopback IPs
    match loopback_ip_labels(switch, &policy) {
        Ok(selected) => {
            env.loopback_ips = best_effort(
                client.list_ips(&namespace, &ListQuery::labels(selected)).await,
                "loopback IPs",
                switch,
            )
            .and_then(|ips| loopbacks_satisfied(ips, &policy.address_families));
        }
        Err(e) => warn!("Cannot resolve loopback selection for {}: {}", switch.name_any(), e),
    }

    // South subnets, once the port parameters they are sized from are known
    if condition_true(switch, ConditionType::PortParametersOk) {
        match south_subnet_labels(switch, &policy) {
            Ok(selected) => {
                env.south_subnets = best_effort(
                    client.list_subnets(&namespace, &ListQuery::labels(selected)).await,
                    "south subnets",
                    switch,
                )
                .and_then(|subnets| south_subnets_satisfied(subnets, &policy.address_families, switch));
            }
            Err(e) => warn!("Cannot resolve south subnet selection for {}: {}", switch.name_any(), e),
        }
    }

    // Per-port subnets, once port addresses are computed
    if settings.enable_port_subnets && condition_true(switch, ConditionType::IpAddressesOk) {
        env.port_subnets = best_effort(
            client
                .list_subnets(&namespace, &ListQuery::labels(port_subnet_labels(switch)))
                .await,
            "port subnets",
            switch,
        )
        .and_then(|subnets| port_subnets_satisfied(subnets, switch));
    }

    env.policy = Some(policy);
    env
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;

    #[test]
    fn test_address_families_match_config() {
        let both = AddressFamiliesMap { ipv4: true, ipv6: true };
        let (ok, missing) = address_families_match_config(&both, &[AddressFamily::IPv4]);
        assert!(!ok);
        assert_eq!(missing, vec![AddressFamily::IPv6]);

        let (ok, missing) = address_families_match_config(&AddressFamiliesMap::default(), &[AddressFamily::IPv4]);
        assert!(ok);
        assert!(missing.is_empty());
    }

    #[tokio::test]
    async fn test_store_failures_leave_slots_empty() {
        let mock = create_test_store();
        let leaf = create_test_switch("leaf1", "aa:aa:aa:aa:aa:02");
        mock.add_switch(leaf.clone());
        mock.add_inventory(create_test_inventory("leaf1", Vec::new()));
        mock.set_list_failure(Some("list failed"));

        let env = resolve(&mock, &leaf, &ControllerConfig::default()).await;

        assert!(env.inventory.is_some());
        assert!(env.switches.is_none());
        assert!(env.config.is_none());
        assert!(env.policy.is_none());

        mock.set_list_failure(None);
        let env = resolve(&mock, &leaf, &ControllerConfig::default()).await;
        assert!(env.switches.is_some());
        assert!(env.config.is_some());
    }
}
