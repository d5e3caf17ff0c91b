//! Address orchestrator
//!
//! Decides which address-pool resources a switch is missing and requests them.
//! Each pass first reclaims failed resources, then works on a single address
//! class: loopback IPs, then the aggregate south subnet, then per-port subnets.
//! A class is only started once the previous one is satisfied.

pub mod cleanup;
pub mod requests;

use super::environment::resolve;
use crate::config::ControllerConfig;
use crate::error::ControllerError;
use crds::{ConditionType, Switch};
use fabric_client::FabricClientTrait;
use kube::ResourceExt;
use tracing::debug;

/// Address class the orchestrator is waiting on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressClass {
    Config,
    Loopbacks,
    SouthSubnets,
    PortSubnets,
}

/// An address-pool resource created or deleted by a pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressResource {
    /// "IP" or "Subnet"
    pub kind: &'static str,
    pub name: String,
    /// Event reason describing the action
    pub reason: &'static str,
}

/// Outcome of one orchestrator pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddressReport {
    pub requested: Vec<AddressResource>,
    pub reclaimed: Vec<AddressResource>,
    /// First class that is not yet satisfied; `None` when nothing is left to do
    pub waiting_on: Option<AddressClass>,
}

impl AddressReport {
    pub fn is_settled(&self) -> bool {
        self.waiting_on.is_none()
    }
}

fn condition_true(switch: &Switch, condition: ConditionType) -> bool {
    switch
        .status
        .as_ref()
        .is_some_and(|s| s.condition_true(condition))
}

/// Run one orchestrator pass for a switch
pub async fn orchestrate(
    client: &dyn FabricClientTrait,
    switch: &Switch,
    settings: &ControllerConfig,
) -> Result<AddressReport, ControllerError> {
    let namespace = switch.namespace().unwrap_or_else(|| settings.namespace.clone());
    let env = resolve(client, switch, settings).await;
    let mut report = AddressReport::default();

    report.reclaimed = cleanup::sweep_failed(client, &namespace, switch, env.policy.as_ref()).await?;
    if !report.reclaimed.is_empty() {
        // Fresh requests go out on the next pass, after the pool service saw the deletions
        report.waiting_on = Some(if env.loopback_ips.is_none() {
            AddressClass::Loopbacks
        } else if env.south_subnets.is_none() {
            AddressClass::SouthSubnets
        } else {
            AddressClass::PortSubnets
        });
        return Ok(report);
    }

    let Some(policy) = env.policy.as_ref() else {
        debug!("Switch {} has no config yet, no addresses to request", switch.name_any());
        report.waiting_on = Some(AddressClass::Config);
        return Ok(report);
    };

    if env.loopback_ips.is_none() {
        report.requested = requests::request_loopbacks(client, &namespace, switch, policy).await?;
        report.waiting_on = Some(AddressClass::Loopbacks);
    } else if env.south_subnets.is_none() {
        if condition_true(switch, ConditionType::PortParametersOk) {
            report.requested = requests::request_south_subnets(client, &namespace, switch, policy).await?;
        }
        report.waiting_on = Some(AddressClass::SouthSubnets);
    } else if settings.enable_port_subnets
        && condition_true(switch, ConditionType::IpAddressesOk)
        && env.port_subnets.is_none()
    {
        report.requested = requests::request_port_subnets(client, &namespace, switch, policy).await?;
        report.waiting_on = Some(AddressClass::PortSubnets);
    }

    Ok(report)
}
