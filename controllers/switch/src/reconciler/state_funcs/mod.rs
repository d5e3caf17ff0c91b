//! Steps of the switch state pipeline
//!
//! Order matters: each step reads what the earlier ones computed.
//!
//! | Step                 | Condition        |
//! |----------------------|------------------|
//! | initialize           | Initialized      |
//! | update-interfaces    | InterfacesOK     |
//! | update-neighbors     | NeighborsOK      |
//! | update-layer-role    | LayerAndRoleOK   |
//! | update-config-ref    | ConfigRefOK      |
//! | update-port-params   | PortParametersOK |
//! | update-loopbacks     | LoopbacksOK      |
//! | update-asn           | AsnOK            |
//! | update-subnets       | SubnetsOK        |
//! | update-port-ips      | IPAddressesOK    |
//! | set-ready            |                  |

pub mod addresses;
pub mod breakout;
#[cfg(test)]
mod breakout_test;
pub mod interfaces;
pub mod ports;
pub mod topology;

use super::environment::SwitchEnvironment;
use super::pipeline::{StateError, StatePipeline, StateTarget, Step};
use crate::reconcile_helpers::set_condition;
use chrono::{DateTime, Utc};
use crds::{ConditionType, Switch, SwitchState, SwitchStatus};

pub type SwitchStateError = StateError<SwitchState>;
pub type SwitchStepResult = Result<(), SwitchStateError>;

/// Halt with the switch left Invalid
pub fn invalid(reason: &str, message: impl Into<String>) -> SwitchStateError {
    StateError::new(SwitchState::Invalid, reason, message)
}

/// Halt with the switch left Pending
pub fn pending(reason: &str, message: impl Into<String>) -> SwitchStateError {
    StateError::new(SwitchState::Pending, reason, message)
}

/// Status of a switch that went through `initialize`
pub(crate) fn status_mut(switch: &mut Switch) -> &mut SwitchStatus {
    switch.status.get_or_insert_with(SwitchStatus::initial)
}

impl StateTarget for Switch {
    type Condition = ConditionType;
    type State = SwitchState;

    fn record_success(&mut self, condition: ConditionType, now: DateTime<Utc>) {
        let status = status_mut(self);
        set_condition(&mut status.conditions, condition, true, None, None, now);
        status.state = Some(SwitchState::Processing);
        status.message = None;
    }

    fn record_failure(&mut self, condition: Option<ConditionType>, error: &SwitchStateError, now: DateTime<Utc>) {
        let status = status_mut(self);
        if let Some(condition) = condition {
            set_condition(
                &mut status.conditions,
                condition,
                false,
                Some(error.reason.clone()),
                Some(error.message.clone()),
                now,
            );
        }
        status.state = Some(error.state);
        status.message = Some(error.message.clone());
    }
}

/// Mark the switch Ready; the Ready condition is only ever an event
pub fn set_ready(switch: &mut Switch, _env: &SwitchEnvironment) -> SwitchStepResult {
    let status = status_mut(switch);
    status.state = Some(SwitchState::Ready);
    status.message = None;
    Ok(())
}

/// The full switch pipeline
pub fn switch_pipeline() -> StatePipeline<Switch, SwitchEnvironment> {
    StatePipeline::new(vec![
        Step {
            name: "initialize",
            condition: Some(ConditionType::Initialized),
            run: interfaces::initialize,
        },
        Step {
            name: "update-interfaces",
            condition: Some(ConditionType::InterfacesOk),
            run: interfaces::update_interfaces,
        },
        Step {
            name: "update-neighbors",
            condition: Some(ConditionType::NeighborsOk),
            run: interfaces::update_neighbors,
        },
        Step {
            name: "update-layer-role",
            condition: Some(ConditionType::LayerAndRoleOk),
            run: topology::update_layer_and_role,
        },
        Step {
            name: "update-config-ref",
            condition: Some(ConditionType::ConfigRefOk),
            run: ports::update_config_ref,
        },
        Step {
            name: "update-port-params",
            condition: Some(ConditionType::PortParametersOk),
            run: ports::update_port_parameters,
        },
        Step {
            name: "update-loopbacks",
            condition: Some(ConditionType::LoopbacksOk),
            run: addresses::update_loopbacks,
        },
        Step {
            name: "update-asn",
            condition: Some(ConditionType::AsnOk),
            run: addresses::update_asn,
        },
        Step {
            name: "update-subnets",
            condition: Some(ConditionType::SubnetsOk),
            run: addresses::update_subnets,
        },
        Step {
            name: "update-port-ips",
            condition: Some(ConditionType::IpAddressesOk),
            run: addresses::update_switch_port_ips,
        },
        Step {
            name: "set-ready",
            condition: None,
            run: set_ready,
        },
    ])
}
