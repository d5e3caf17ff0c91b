//! Config reference and effective port parameters

use super::breakout::reconcile_breakout;
use super::{SwitchStepResult, pending, status_mut};
use crate::addressing::{port_index, port_name};
use crate::reconciler::environment::SwitchEnvironment;
use crds::{Direction, InterfaceStatus, PortParameters, ResourceReference, Switch};

/// Record the matched SwitchConfig
pub fn update_config_ref(switch: &mut Switch, env: &SwitchEnvironment) -> SwitchStepResult {
    let config = env.config.as_ref().ok_or_else(|| {
        pending("MissingConfig", "no single SwitchConfig matches the switch")
    })?;
    status_mut(switch).config_ref = Some(ResourceReference::from_resource(config));
    Ok(())
}

/// Parameters the north peer uses on the other end of the link
fn upstream_parameters(iface: &InterfaceStatus, env: &SwitchEnvironment) -> Option<PortParameters> {
    let peer = iface.peer.as_ref()?;
    let peer_switch = env.switch(&peer.object_ref.as_ref()?.name)?;
    let peer_ifaces = &peer_switch.status.as_ref()?.interfaces;
    let lldp = peer.lldp.as_ref()?;
    peer_ifaces
        .get(&lldp.port_description)
        .or_else(|| peer_ifaces.get(&lldp.port_id))
        .map(|remote| remote.parameters.clone())
}

/// Compute effective parameters for every port, then apply breakout
///
/// Precedence, lowest first: config defaults, switch defaults, per-port override.
/// North ports copy the parameters of the peer's port. Breakout sub-ports take the
/// lane count of their baseline port unless an override sets it.
pub fn update_port_parameters(switch: &mut Switch, env: &SwitchEnvironment) -> SwitchStepResult {
    let config = env.config.as_ref().ok_or_else(|| {
        pending("MissingConfig", "no single SwitchConfig matches the switch")
    })?;
    if env.switches.is_none() {
        return Err(pending("MissingSwitches", "sibling switches could not be listed"));
    }

    let interfaces_spec = switch.spec.interfaces.clone().unwrap_or_default();
    let status = status_mut(switch);

    for (name, iface) in status.interfaces.iter_mut() {
        let mut params = config.spec.port_defaults.clone();
        if let Some(defaults) = &interfaces_spec.defaults {
            params.merge(defaults);
        }
        if let Some(port_override) = interfaces_spec.override_for(name) {
            params.merge(&port_override.parameters);
        }
        if iface.direction == Direction::North {
            if let Some(upstream) = upstream_parameters(iface, env) {
                params = upstream;
            }
        }
        iface.parameters = params;
    }

    // Sub-port lane inheritance
    let baselines: Vec<(String, Option<u32>)> = status
        .interfaces
        .keys()
        .filter_map(|name| {
            let idx = port_index(name)?;
            (idx % 4 != 0).then(|| {
                let baseline = port_name(idx - idx % 4);
                let lanes = status
                    .interfaces
                    .get(&baseline)
                    .and_then(|b| b.parameters.lanes);
                (name.clone(), lanes)
            })
        })
        .collect();
    for (name, lanes) in baselines {
        let explicit = interfaces_spec
            .override_for(&name)
            .is_some_and(|o| o.parameters.lanes.is_some());
        if explicit || lanes.is_none() {
            continue;
        }
        if let Some(iface) = status.interfaces.get_mut(&name) {
            iface.parameters.lanes = lanes;
        }
    }

    reconcile_breakout(status);
    Ok(())
}
