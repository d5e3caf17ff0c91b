//! Port breakout
//!
//! A 4-lane port at index `i` (divisible by 4) can be split into sub-ports
//! `i+1..i+3`. The interface map is reconciled against the lane count of each
//! baseline port: 4 lanes means no sub-ports, 2 lanes means `i+2` only, 1 lane
//! means all three.

use crate::addressing::{PORT_PREFIX, port_index, port_name};
use crds::{InterfaceStatus, SwitchStatus};
use std::collections::BTreeMap;
use tracing::debug;

/// Sub-port offsets that must exist and must not exist for a lane count
fn sub_port_layout(lanes: u32) -> Option<(&'static [u32], &'static [u32])> {
    match lanes {
        4 => Some((&[], &[1, 2, 3])),
        2 => Some((&[2], &[1, 3])),
        1 => Some((&[1, 2, 3], &[])),
        _ => None,
    }
}

/// Copy of a baseline port for a new sub-port; addresses and peer stay with the baseline
fn clone_sub_port(baseline: &InterfaceStatus) -> InterfaceStatus {
    InterfaceStatus {
        ip: Vec::new(),
        peer: None,
        ..baseline.clone()
    }
}

/// Add and remove sub-ports so the interface map matches each baseline's lanes
///
/// Odd-indexed ports left with a lane count other than 1 are dropped. Port counts
/// are updated: usable counts switch ports, total keeps the non-switch NICs.
pub fn reconcile_breakout(status: &mut SwitchStatus) {
    let interfaces = &mut status.interfaces;
    let previous_usable = u32::try_from(
        interfaces.keys().filter(|n| n.starts_with(PORT_PREFIX)).count(),
    )
    .unwrap_or(u32::MAX);
    let non_switch = status.total_ports.saturating_sub(previous_usable);

    let baselines: BTreeMap<u32, u32> = interfaces
        .iter()
        .filter_map(|(name, iface)| {
            let idx = port_index(name)?;
            let lanes = iface.parameters.lanes?;
            (idx % 4 == 0).then_some((idx, lanes))
        })
        .collect();

    for (idx, lanes) in baselines {
        let Some((present, absent)) = sub_port_layout(lanes) else {
            debug!("Port {} has unsupported lane count {}", port_name(idx), lanes);
            continue;
        };
        for offset in absent {
            if interfaces.remove(&port_name(idx + offset)).is_some() {
                debug!("Removed sub-port {} ({} lanes on {})", port_name(idx + offset), lanes, port_name(idx));
            }
        }
        let Some(baseline) = interfaces.get(&port_name(idx)).cloned() else {
            continue;
        };
        for offset in present {
            interfaces
                .entry(port_name(idx + offset))
                .or_insert_with(|| clone_sub_port(&baseline));
        }
    }

    interfaces.retain(|name, iface| match port_index(name) {
        Some(idx) if idx % 2 == 1 => iface.parameters.lanes.is_none_or(|lanes| lanes == 1),
        _ => true,
    });

    let usable = u32::try_from(
        interfaces.keys().filter(|n| n.starts_with(PORT_PREFIX)).count(),
    )
    .unwrap_or(u32::MAX);
    status.switch_ports = usable;
    status.total_ports = usable.saturating_add(non_switch);
}
