//! Address steps: loopbacks, ASN, south subnets and per-port addresses

use super::{SwitchStepResult, invalid, status_mut};
use crate::addressing::{
    AddressError, derive_asn, layout_south_ports, mirror_address, parse_network,
};
use crate::reconciler::environment::SwitchEnvironment;
use crds::{
    AddressFamily, Direction, InterfaceStatus, IpAddressStatus, ResourceReference, SubnetStatus,
    Switch,
};
use kube::ResourceExt;
use std::collections::BTreeMap;
use tracing::debug;

/// Copy the reserved loopback addresses into status
pub fn update_loopbacks(switch: &mut Switch, env: &SwitchEnvironment) -> SwitchStepResult {
    let ips = env
        .loopback_ips
        .as_ref()
        .ok_or_else(|| invalid("MissingLoopbacks", "loopback addresses are not reserved yet"))?;

    let mut loopbacks: Vec<IpAddressStatus> = ips
        .iter()
        .filter_map(|ip| {
            let address = ip.reserved()?.to_string();
            Some(IpAddressStatus {
                object_ref: Some(ResourceReference::from_resource(ip)),
                address_family: AddressFamily::of_address(&address),
                address,
                extra_address: false,
            })
        })
        .collect();
    loopbacks.sort_by(|a, b| (a.address_family, &a.address).cmp(&(b.address_family, &b.address)));

    status_mut(switch).loopback_addresses = loopbacks;
    Ok(())
}

/// Derive the ASN from the IPv4 loopback
pub fn update_asn(switch: &mut Switch, env: &SwitchEnvironment) -> SwitchStepResult {
    let status = status_mut(switch);
    let asn = derive_asn(env.asn_base, &status.loopback_addresses)
        .map_err(|e| invalid("AsnFailed", e.to_string()))?;
    status.asn = Some(asn);
    Ok(())
}

/// Copy the reserved south subnets into status
pub fn update_subnets(switch: &mut Switch, env: &SwitchEnvironment) -> SwitchStepResult {
    let subnets = env
        .south_subnets
        .as_ref()
        .ok_or_else(|| invalid("MissingSubnets", "south subnets are not reserved yet"))?;

    let mut entries: Vec<SubnetStatus> = subnets
        .iter()
        .filter_map(|subnet| {
            let cidr = subnet.reserved()?.to_string();
            Some(SubnetStatus {
                object_ref: Some(ResourceReference::from_resource(subnet)),
                address_family: subnet.address_family().unwrap_or(AddressFamily::of_address(&cidr)),
                cidr,
            })
        })
        .collect();
    entries.sort_by(|a, b| (a.address_family, &a.cidr).cmp(&(b.address_family, &b.cidr)));

    status_mut(switch).subnets = entries;
    Ok(())
}

fn address_status(address: String) -> IpAddressStatus {
    IpAddressStatus {
        object_ref: None,
        address_family: AddressFamily::of_address(&address),
        address,
        extra_address: false,
    }
}

/// User-declared addresses of a port
fn extra_addresses(switch: &Switch, port: &str) -> Result<Vec<IpAddressStatus>, AddressError> {
    let Some(port_override) = switch
        .spec
        .interfaces
        .as_ref()
        .and_then(|spec| spec.override_for(port))
    else {
        return Ok(Vec::new());
    };
    port_override
        .ip
        .iter()
        .map(|cidr| {
            parse_network(cidr)?;
            Ok(IpAddressStatus {
                extra_address: true,
                ..address_status(cidr.clone())
            })
        })
        .collect()
}

/// Addresses of a north port: the peer's derived addresses, each advanced by one
fn north_addresses(
    port: &str,
    iface: &InterfaceStatus,
    env: &SwitchEnvironment,
) -> Result<Option<Vec<IpAddressStatus>>, AddressError> {
    let Some(peer) = iface.peer.as_ref() else {
        return Ok(None);
    };
    let Some(peer_switch) = peer.object_ref.as_ref().and_then(|r| env.switch(&r.name)) else {
        return Ok(None);
    };
    let Some(peer_ifaces) = peer_switch.status.as_ref().map(|s| &s.interfaces) else {
        return Ok(Some(Vec::new()));
    };
    let remote = peer.lldp.as_ref().and_then(|lldp| {
        peer_ifaces
            .get(&lldp.port_description)
            .or_else(|| peer_ifaces.get(&lldp.port_id))
    });
    let Some(remote) = remote else {
        debug!("Peer port of {} not found on {}", port, peer_switch.name_any());
        return Ok(Some(Vec::new()));
    };

    remote
        .ip
        .iter()
        .filter(|a| !a.extra_address)
        .map(|a| Ok(address_status(mirror_address(&a.address)?.to_string())))
        .collect::<Result<Vec<_>, _>>()
        .map(Some)
}

/// Compute the addresses of every switch port
///
/// South ports are laid out in index order inside the switch's south subnet of each
/// family. North ports mirror the peer's address on the same link. Declared extra
/// addresses are listed first.
pub fn update_switch_port_ips(switch: &mut Switch, env: &SwitchEnvironment) -> SwitchStepResult {
    let status = switch
        .status
        .as_ref()
        .ok_or_else(|| invalid("MissingStatus", "switch status is not initialized"))?;

    let mut derived: BTreeMap<String, Vec<IpAddressStatus>> = BTreeMap::new();

    for family in AddressFamily::ALL {
        let Some(subnet) = status.subnets.iter().find(|s| s.address_family == family) else {
            continue;
        };
        let network = parse_network(&subnet.cidr).map_err(|e| invalid("InvalidSubnet", e.to_string()))?;
        let blocks = layout_south_ports(&network, &status.interfaces).map_err(|e| match e {
            AddressError::SubnetExhausted { .. } => invalid("SubnetExhausted", e.to_string()),
            other => invalid("InvalidPortParameters", other.to_string()),
        })?;
        for block in blocks {
            derived
                .entry(block.port)
                .or_default()
                .push(address_status(block.address.to_string()));
        }
    }

    for (name, iface) in &status.interfaces {
        if iface.direction != Direction::North {
            continue;
        }
        match north_addresses(name, iface, env) {
            Ok(None) => {}
            Ok(Some(addresses)) if addresses.is_empty() => {
                return Err(invalid(
                    "PeerAddressesMissing",
                    format!("peer of north port {} has no addresses yet", name),
                ));
            }
            Ok(Some(addresses)) => {
                derived.insert(name.clone(), addresses);
            }
            Err(e) => return Err(invalid("PeerAddressInvalid", format!("{}: {}", name, e))),
        }
    }

    let mut assigned: BTreeMap<String, Vec<IpAddressStatus>> = BTreeMap::new();
    for name in status.interfaces.keys() {
        let mut addresses = extra_addresses(switch, name)
            .map_err(|e| invalid("InvalidExtraAddress", format!("{}: {}", name, e)))?;
        addresses.extend(derived.remove(name).unwrap_or_default());
        assigned.insert(name.clone(), addresses);
    }

    let status = status_mut(switch);
    for (name, addresses) in assigned {
        if let Some(iface) = status.interfaces.get_mut(&name) {
            iface.ip = addresses;
        }
    }
    Ok(())
}
