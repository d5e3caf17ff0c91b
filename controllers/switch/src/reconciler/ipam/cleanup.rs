//! Reclaiming failed address-pool requests
//!
//! A request the pool service rejected stays in state `Failed` forever. The
//! orchestrator deletes such objects so a fresh request can be made.

use super::AddressResource;
use crate::error::ControllerError;
use crate::events::reasons;
use crate::reconciler::environment::{
    IpamPolicy, loopback_ip_labels, port_subnet_labels, south_subnet_labels,
};
use crds::labels;
use crds::{AllocationState, Switch};
use fabric_client::{FabricClientTrait, FabricError, ListQuery};
use kube::ResourceExt;
use std::collections::BTreeMap;
use tracing::{info, warn};

fn generated(mut selected: BTreeMap<String, String>) -> ListQuery {
    selected.insert(labels::GENERATED_BY.to_string(), labels::MANAGER.to_string());
    ListQuery::labels(selected)
}

fn deleted(result: Result<(), FabricError>, kind: &'static str, name: &str) -> Result<bool, ControllerError> {
    match result {
        Ok(()) => {
            info!("Reclaimed failed {} {}", kind, name);
            Ok(true)
        }
        Err(FabricError::NotFound(_)) => Ok(false),
        Err(e) => Err(e.into()),
    }
}

fn reclaimed(kind: &'static str, name: String) -> AddressResource {
    AddressResource {
        kind,
        name,
        reason: reasons::FAILED_RESOURCE_RECLAIMED,
    }
}

/// Delete every failed IP and Subnet the controller generated for a switch
///
/// Loopback and south-subnet lookups need the IPAM policy; without it only
/// per-port subnets are swept.
pub async fn sweep_failed(
    client: &dyn FabricClientTrait,
    namespace: &str,
    switch: &Switch,
    policy: Option<&IpamPolicy>,
) -> Result<Vec<AddressResource>, ControllerError> {
    let mut swept = Vec::new();

    let mut subnet_queries = vec![ListQuery::labels(port_subnet_labels(switch))];

    if let Some(policy) = policy {
        match loopback_ip_labels(switch, policy) {
            Ok(selected) => {
                let ips = client.list_ips(namespace, &generated(selected)).await?;
                for ip in ips.iter().filter(|ip| ip.state() == Some(AllocationState::Failed)) {
                    let name = ip.name_any();
                    if deleted(client.delete_ip(namespace, &name).await, "IP", &name)? {
                        swept.push(reclaimed("IP", name));
                    }
                }
            }
            Err(e) => warn!("Skipping loopback sweep for {}: {}", switch.name_any(), e),
        }
        match south_subnet_labels(switch, policy) {
            Ok(selected) => subnet_queries.push(generated(selected)),
            Err(e) => warn!("Skipping south subnet sweep for {}: {}", switch.name_any(), e),
        }
    }

    for query in subnet_queries {
        let subnets = client.list_subnets(namespace, &query).await?;
        for subnet in subnets.iter().filter(|s| s.state() == Some(AllocationState::Failed)) {
            let name = subnet.name_any();
            if deleted(client.delete_subnet(namespace, &name).await, "Subnet", &name)? {
                swept.push(reclaimed("Subnet", name));
            }
        }
    }

    Ok(swept)
}
