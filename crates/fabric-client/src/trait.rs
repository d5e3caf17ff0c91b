//! FabricClient trait for mocking
//!
//! Abstracts the object store so reconcilers can be tested against an in-memory
//! implementation. The concrete `FabricClient` talks to the Kubernetes API.

use crate::error::FabricError;
use crate::query::ListQuery;
use crds::{IP, Inventory, Subnet, Switch, SwitchConfig, SwitchStatus};

/// Object-store operations used by the switch controllers
///
/// All async methods must be `Send` to work with Tokio's work-stealing runtime.
#[async_trait::async_trait]
pub trait FabricClientTrait: Send + Sync {
    // Switches
    async fn get_switch(&self, namespace: &str, name: &str) -> Result<Switch, FabricError>;
    async fn list_switches(&self, namespace: &str, query: &ListQuery) -> Result<Vec<Switch>, FabricError>;
    /// Force-apply the status of a switch under the controller's field manager
    async fn patch_switch_status(&self, namespace: &str, name: &str, status: &SwitchStatus) -> Result<Switch, FabricError>;

    // Inventory and policy
    async fn get_inventory(&self, namespace: &str, name: &str) -> Result<Inventory, FabricError>;
    async fn list_switch_configs(&self, namespace: &str, query: &ListQuery) -> Result<Vec<SwitchConfig>, FabricError>;

    // Address pools
    async fn list_subnets(&self, namespace: &str, query: &ListQuery) -> Result<Vec<Subnet>, FabricError>;
    async fn create_subnet(&self, namespace: &str, subnet: &Subnet) -> Result<Subnet, FabricError>;
    async fn delete_subnet(&self, namespace: &str, name: &str) -> Result<(), FabricError>;
    async fn list_ips(&self, namespace: &str, query: &ListQuery) -> Result<Vec<IP>, FabricError>;
    async fn create_ip(&self, namespace: &str, ip: &IP) -> Result<IP, FabricError>;
    async fn delete_ip(&self, namespace: &str, name: &str) -> Result<(), FabricError>;
}
