//! Creation of address-pool requests
//!
//! Names are derived from content (switch, family, port, CIDR) so concurrent
//! passes create the same objects; "already exists" counts as success.

use super::AddressResource;
use crate::addressing::{
    loopback_ip_name, network_of, parse_network, port_subnet_name, prefix_for_demand,
    south_demand, south_ports, south_subnet_name,
};
use crate::error::ControllerError;
use crate::events::reasons;
use crate::reconcile_helpers::selection_labels;
use crate::reconciler::environment::{
    IpamPolicy, address_families_match_config, loopback_ip_labels, port_subnet_labels,
    south_subnet_labels,
};
use crds::labels;
use crds::{
    AddressFamily, IP, IPSpec, LocalObjectReference, ResourceReference, Subnet, SubnetSpec,
    Switch,
};
use fabric_client::{FabricClientTrait, FabricError, ListQuery};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::{Resource, ResourceExt};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

fn request_meta(switch: &Switch, namespace: &str, name: String, mut labels: BTreeMap<String, String>) -> ObjectMeta {
    labels.insert(labels::GENERATED_BY.to_string(), labels::MANAGER.to_string());
    ObjectMeta {
        name: Some(name),
        namespace: Some(namespace.to_string()),
        labels: Some(labels),
        owner_references: switch.controller_owner_ref(&()).map(|owner| vec![owner]),
        ..Default::default()
    }
}

/// Finished pools of a family, by name
fn pools_for(subnets: &[Subnet], family: AddressFamily) -> Vec<&Subnet> {
    let mut pools: Vec<&Subnet> = subnets
        .iter()
        .filter(|s| s.reserved().is_some() && s.address_family() == Some(family))
        .collect();
    pools.sort_by_key(|s| s.name_any());
    pools
}

/// Map a create result: AlreadyExists means another pass got there first
fn created<T>(result: Result<T, FabricError>, kind: &'static str, name: &str) -> Result<bool, ControllerError> {
    match result {
        Ok(_) => {
            info!("Requested {} {}", kind, name);
            Ok(true)
        }
        Err(FabricError::AlreadyExists(_)) => {
            debug!("{} {} already exists", kind, name);
            Ok(false)
        }
        Err(e) => Err(e.into()),
    }
}

/// Request a loopback IP for every required family not yet covered
pub async fn request_loopbacks(
    client: &dyn FabricClientTrait,
    namespace: &str,
    switch: &Switch,
    policy: &IpamPolicy,
) -> Result<Vec<AddressResource>, ControllerError> {
    let lookup = loopback_ip_labels(switch, policy)?;
    let existing = client.list_ips(namespace, &ListQuery::labels(lookup.clone())).await?;
    let covered: Vec<AddressFamily> = existing.iter().filter_map(|ip| ip.address_family()).collect();
    let (_, missing) = address_families_match_config(&policy.address_families, &covered);
    if missing.is_empty() {
        return Ok(Vec::new());
    }

    let pool_query = ListQuery::labels(selection_labels(&policy.loopback_subnets, switch)?);
    let pools = client.list_subnets(namespace, &pool_query).await?;
    let mut requested = Vec::new();

    for family in missing {
        let Some(pool) = pools_for(&pools, family)
            .into_iter()
            .find(|pool| pool.capacity_left() > 0)
        else {
            warn!("No {} loopback subnet with free capacity for switch {}", family, switch.name_any());
            continue;
        };

        let name = loopback_ip_name(&switch.name_any(), family);
        let ip = IP {
            metadata: request_meta(switch, namespace, name.clone(), lookup.clone()),
            spec: IPSpec {
                subnet: LocalObjectReference::new(pool.name_any()),
                ip: None,
                consumer: Some(ResourceReference::from_resource(switch)),
            },
            status: None,
        };
        if created(client.create_ip(namespace, &ip).await, "IP", &name)? {
            requested.push(AddressResource {
                kind: "IP",
                name,
                reason: reasons::LOOPBACK_REQUESTED,
            });
        }
    }
    Ok(requested)
}

/// Request a south subnet per required family, sized to the south ports' demand
pub async fn request_south_subnets(
    client: &dyn FabricClientTrait,
    namespace: &str,
    switch: &Switch,
    policy: &IpamPolicy,
) -> Result<Vec<AddressResource>, ControllerError> {
    let Some(status) = switch.status.as_ref() else {
        return Ok(Vec::new());
    };
    let lookup = south_subnet_labels(switch, policy)?;
    let existing = client.list_subnets(namespace, &ListQuery::labels(lookup.clone())).await?;
    let covered: Vec<AddressFamily> = existing
        .iter()
        .filter(|s| s.reserved().is_some())
        .filter_map(|s| s.address_family())
        .collect();
    let (_, missing) = address_families_match_config(&policy.address_families, &covered);
    if missing.is_empty() {
        return Ok(Vec::new());
    }

    let pool_query = ListQuery::labels(selection_labels(&policy.carrier_subnets, switch)?);
    let pools = client.list_subnets(namespace, &pool_query).await?;
    let mut requested = Vec::new();

    for family in missing {
        let demand = match south_demand(&status.interfaces, family) {
            Ok(demand) => demand,
            Err(e) => {
                warn!("Cannot size {} south subnet for switch {}: {}", family, switch.name_any(), e);
                continue;
            }
        };
        let Some(pool) = pools_for(&pools, family)
            .into_iter()
            .find(|pool| pool.capacity_left() >= demand.max(1))
        else {
            warn!(
                "No {} carrier subnet with {} free addresses for switch {}",
                family,
                demand,
                switch.name_any()
            );
            continue;
        };

        let name = south_subnet_name(&switch.name_any(), family);
        let subnet = Subnet {
            metadata: request_meta(switch, namespace, name.clone(), lookup.clone()),
            spec: SubnetSpec {
                prefix_bits: Some(prefix_for_demand(family, demand)),
                parent_subnet: Some(LocalObjectReference::new(pool.name_any())),
                consumer: Some(ResourceReference::from_resource(switch)),
                ..Default::default()
            },
            status: None,
        };
        if created(client.create_subnet(namespace, &subnet).await, "Subnet", &name)? {
            requested.push(AddressResource {
                kind: "Subnet",
                name,
                reason: reasons::SOUTH_SUBNET_REQUESTED,
            });
        }
    }
    Ok(requested)
}

/// Request a subnet backing every derived south port address
pub async fn request_port_subnets(
    client: &dyn FabricClientTrait,
    namespace: &str,
    switch: &Switch,
    policy: &IpamPolicy,
) -> Result<Vec<AddressResource>, ControllerError> {
    let Some(status) = switch.status.as_ref() else {
        return Ok(Vec::new());
    };
    let selected = selection_labels(&policy.south_subnets, switch)?;
    let switch_name = switch.name_any();
    let mut requested = Vec::new();

    for (_, port, iface) in south_ports(&status.interfaces) {
        for address in iface.ip.iter().filter(|a| !a.extra_address) {
            let network = network_of(&address.address)
                .map_err(|e| ControllerError::Reconciliation(e.to_string()))?;
            let cidr = network.to_string();

            let parent = status.subnets.iter().find(|s| {
                parse_network(&s.cidr).is_ok_and(|south| south.contains(network.network()))
            });
            let Some(parent_name) = parent.and_then(|p| p.object_ref.as_ref()).map(|r| r.name.clone()) else {
                warn!("No south subnet of {} contains {} ({})", switch_name, cidr, port);
                continue;
            };

            let name = port_subnet_name(&switch_name, port, &cidr);
            let mut port_labels = selected.clone();
            port_labels.extend(port_subnet_labels(switch));
            port_labels.insert(labels::INTERFACE_NAME.to_string(), port.to_lowercase());

            let subnet = Subnet {
                metadata: request_meta(switch, namespace, name.clone(), port_labels),
                spec: SubnetSpec {
                    cidr: Some(cidr),
                    parent_subnet: Some(LocalObjectReference::new(parent_name)),
                    consumer: Some(ResourceReference::from_resource(switch)),
                    ..Default::default()
                },
                status: None,
            };
            if created(client.create_subnet(namespace, &subnet).await, "Subnet", &name)? {
                requested.push(AddressResource {
                    kind: "Subnet",
                    name,
                    reason: reasons::PORT_SUBNET_REQUESTED,
                });
            }
        }
    }
    Ok(requested)
}
