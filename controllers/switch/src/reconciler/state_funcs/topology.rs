//! Topology engine: layer, role and port direction

use super::{SwitchStepResult, invalid, pending, status_mut};
use crate::addressing::normalize_chassis_id;
use crate::reconcile_helpers::chassis_id;
use crate::reconciler::environment::SwitchEnvironment;
use crds::{Direction, NeighborType, Switch, SwitchRole, SwitchStatus, UNDETERMINED_LAYER};
use kube::ResourceExt;
use std::collections::{BTreeMap, BTreeSet};

fn layer_of(switch: &Switch) -> u32 {
    switch.status.as_ref().map(|s| s.layer).unwrap_or(UNDETERMINED_LAYER)
}

/// Normalized chassis IDs of every LLDP neighbor
fn neighbor_chassis(status: &SwitchStatus) -> BTreeSet<String> {
    status
        .interfaces
        .values()
        .filter_map(|iface| iface.peer.as_ref()?.lldp.as_ref())
        .map(|lldp| normalize_chassis_id(&lldp.chassis_id))
        .collect()
}

/// Layer of a switch given its siblings
///
/// Top spines are layer 0. Otherwise the lowest sibling layer below the current one
/// that holds a neighbor gives `layer + 1`; without one the current layer is kept.
pub fn compute_layer(switch: &Switch, siblings: &[Switch]) -> u32 {
    if switch.spec.top_spine {
        return 0;
    }
    let current = layer_of(switch);
    let Some(status) = switch.status.as_ref() else {
        return current;
    };
    let neighbors = neighbor_chassis(status);
    let own_name = switch.name_any();

    let mut layers: BTreeMap<u32, Vec<&Switch>> = BTreeMap::new();
    for sibling in siblings.iter().filter(|s| s.name_any() != own_name) {
        let layer = layer_of(sibling);
        if layer != UNDETERMINED_LAYER {
            layers.entry(layer).or_default().push(sibling);
        }
    }

    layers
        .range(..current)
        .find(|(_, members)| {
            members
                .iter()
                .any(|m| chassis_id(m).is_some_and(|c| neighbors.contains(&c)))
        })
        .map(|(layer, _)| layer + 1)
        .unwrap_or(current)
}

/// Leaf when any neighbor is a machine, spine otherwise
pub fn compute_role(switch: &Switch) -> SwitchRole {
    if switch.spec.top_spine {
        return SwitchRole::Spine;
    }
    let machine_facing = switch.status.as_ref().is_some_and(|status| {
        status
            .interfaces
            .values()
            .filter_map(|iface| iface.peer.as_ref()?.lldp.as_ref())
            .any(|lldp| lldp.neighbor_type == NeighborType::Machine)
    });
    if machine_facing {
        SwitchRole::Leaf
    } else {
        SwitchRole::Spine
    }
}

/// Compute layer and role, then mark ports facing a lower layer as north
pub fn update_layer_and_role(switch: &mut Switch, env: &SwitchEnvironment) -> SwitchStepResult {
    let siblings = env
        .switches
        .as_ref()
        .ok_or_else(|| pending("MissingSwitches", "sibling switches could not be listed"))?;

    let layer = compute_layer(switch, siblings);
    let role = compute_role(switch);

    let status = status_mut(switch);
    status.layer = layer;
    status.role = Some(role);

    if layer == UNDETERMINED_LAYER {
        return Err(invalid(
            "LayerUndetermined",
            "no neighbor with a known layer was found",
        ));
    }

    for iface in status.interfaces.values_mut() {
        let peer_layer = iface
            .peer
            .as_ref()
            .and_then(|p| p.object_ref.as_ref())
            .and_then(|r| env.switch(&r.name))
            .map(layer_of);
        iface.direction = match peer_layer {
            Some(peer_layer) if peer_layer < layer => Direction::North,
            _ => Direction::South,
        };
    }
    Ok(())
}
