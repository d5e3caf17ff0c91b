//! Interface discovery: status baseline, interfaces from inventory, neighbor resolution

use super::{SwitchStepResult, invalid, pending, status_mut};
use crate::addressing::{PORT_PREFIX, normalize_chassis_id};
use crate::reconcile_helpers::chassis_id;
use crate::reconciler::environment::SwitchEnvironment;
use crds::{
    InterfaceStatus, PeerLldp, PeerStatus, ResourceReference, Switch, SwitchRole, SwitchStatus,
};
use kube::ResourceExt;
use std::collections::BTreeMap;

/// Reset an empty status to the clean baseline and pin top spines
pub fn initialize(switch: &mut Switch, _env: &SwitchEnvironment) -> SwitchStepResult {
    let top_spine = switch.spec.top_spine;
    let status = status_mut(switch);
    if status.state.is_none() {
        *status = SwitchStatus::initial();
    }
    if top_spine {
        status.layer = 0;
        status.role = Some(SwitchRole::Spine);
    }
    Ok(())
}

/// Rebuild the interface map from inventory
///
/// Only switch ports are kept. Parameters and direction start from scratch and are
/// recomputed by later steps; assigned addresses are carried over so a halted pass
/// does not drop them.
pub fn update_interfaces(switch: &mut Switch, env: &SwitchEnvironment) -> SwitchStepResult {
    let inventory = env
        .inventory
        .as_ref()
        .ok_or_else(|| invalid("MissingInventory", "inventory for the switch was not found"))?;

    let status = status_mut(switch);
    let mut interfaces = BTreeMap::new();

    for nic in inventory.spec.nics.iter().filter(|n| n.name.starts_with(PORT_PREFIX)) {
        let peer = nic.lldps.first().map(|lldp| PeerStatus {
            object_ref: None,
            lldp: Some(PeerLldp {
                chassis_id: lldp.chassis_id.clone(),
                system_name: lldp.system_name.clone(),
                port_id: lldp.port_id.clone(),
                port_description: lldp.port_description.clone(),
                neighbor_type: lldp.neighbor_type(),
            }),
        });
        let ip = status
            .interfaces
            .get(&nic.name)
            .map(|previous| previous.ip.clone())
            .unwrap_or_default();

        interfaces.insert(
            nic.name.clone(),
            InterfaceStatus {
                mac_address: nic.mac_address.clone(),
                speed: nic.speed,
                ip,
                peer,
                ..Default::default()
            },
        );
    }

    status.total_ports = u32::try_from(inventory.spec.nics.len()).unwrap_or(u32::MAX);
    status.switch_ports = u32::try_from(interfaces.len()).unwrap_or(u32::MAX);
    status.interfaces = interfaces;
    Ok(())
}

/// Resolve LLDP neighbors to sibling Switch resources by chassis ID
pub fn update_neighbors(switch: &mut Switch, env: &SwitchEnvironment) -> SwitchStepResult {
    let siblings = env
        .switches
        .as_ref()
        .ok_or_else(|| pending("MissingSwitches", "sibling switches could not be listed"))?;

    let own_name = switch.name_any();
    let by_chassis: BTreeMap<String, ResourceReference> = siblings
        .iter()
        .filter(|s| s.name_any() != own_name)
        .filter_map(|s| Some((chassis_id(s)?, ResourceReference::from_resource(s))))
        .collect();

    let status = status_mut(switch);
    for iface in status.interfaces.values_mut() {
        if let Some(peer) = iface.peer.as_mut() {
            peer.object_ref = peer
                .lldp
                .as_ref()
                .and_then(|lldp| by_chassis.get(&normalize_chassis_id(&lldp.chassis_id)))
                .cloned();
        }
    }
    Ok(())
}
