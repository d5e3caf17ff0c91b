//! Kubernetes-backed fabric client

use crate::error::FabricError;
use crate::fabric_trait::FabricClientTrait;
use crate::query::ListQuery;
use crds::labels::MANAGER;
use crds::{IP, Inventory, Subnet, Switch, SwitchConfig, SwitchStatus};
use k8s_openapi::NamespaceResourceScope;
use kube::api::{Api, DeleteParams, ObjectList, Patch, PatchParams, PostParams};
use kube::{Client, Resource};
use serde::de::DeserializeOwned;
use std::fmt::Debug;
use tracing::debug;

/// Fabric client talking to the Kubernetes API server
#[derive(Clone)]
pub struct FabricClient {
    client: Client,
}

impl FabricClient {
    /// Wrap an existing Kubernetes client
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api<K>(&self, namespace: &str) -> Api<K>
    where
        K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>,
    {
        Api::namespaced(self.client.clone(), namespace)
    }
}

/// List every page of objects matching the query
async fn list_all<K>(api: &Api<K>, query: &ListQuery) -> Result<Vec<K>, FabricError>
where
    K: Clone + DeserializeOwned + Debug,
{
    let mut lp = query.list_params();
    let mut items = Vec::new();
    loop {
        let page: ObjectList<K> = api.list(&lp).await?;
        items.extend(page.items);
        match page.metadata.continue_ {
            Some(token) if !token.is_empty() => lp = lp.continue_token(&token),
            _ => break,
        }
    }
    Ok(items)
}

#[async_trait::async_trait]
impl FabricClientTrait for FabricClient {
    async fn get_switch(&self, namespace: &str, name: &str) -> Result<Switch, FabricError> {
        Ok(self.api::<Switch>(namespace).get(name).await?)
    }

    async fn list_switches(&self, namespace: &str, query: &ListQuery) -> Result<Vec<Switch>, FabricError> {
        list_all(&self.api::<Switch>(namespace), query).await
    }

    async fn patch_switch_status(&self, namespace: &str, name: &str, status: &SwitchStatus) -> Result<Switch, FabricError> {
        let patch = serde_json::json!({
            "apiVersion": Switch::api_version(&()),
            "kind": Switch::kind(&()),
            "status": status,
        });
        let pp = PatchParams::apply(MANAGER).force();
        debug!("Applying status for switch {}/{}", namespace, name);
        Ok(self
            .api::<Switch>(namespace)
            .patch_status(name, &pp, &Patch::Apply(&patch))
            .await?)
    }

    async fn get_inventory(&self, namespace: &str, name: &str) -> Result<Inventory, FabricError> {
        Ok(self.api::<Inventory>(namespace).get(name).await?)
    }

    async fn list_switch_configs(&self, namespace: &str, query: &ListQuery) -> Result<Vec<SwitchConfig>, FabricError> {
        list_all(&self.api::<SwitchConfig>(namespace), query).await
    }

    async fn list_subnets(&self, namespace: &str, query: &ListQuery) -> Result<Vec<Subnet>, FabricError> {
        list_all(&self.api::<Subnet>(namespace), query).await
    }

    async fn create_subnet(&self, namespace: &str, subnet: &Subnet) -> Result<Subnet, FabricError> {
        Ok(self
            .api::<Subnet>(namespace)
            .create(&PostParams::default(), subnet)
            .await?)
    }

    async fn delete_subnet(&self, namespace: &str, name: &str) -> Result<(), FabricError> {
        self.api::<Subnet>(namespace)
            .delete(name, &DeleteParams::default())
            .await?;
        Ok(())
    }

    async fn list_ips(&self, namespace: &str, query: &ListQuery) -> Result<Vec<IP>, FabricError> {
        list_all(&self.api::<IP>(namespace), query).await
    }

    async fn create_ip(&self, namespace: &str, ip: &IP) -> Result<IP, FabricError> {
        Ok(self
            .api::<IP>(namespace)
            .create(&PostParams::default(), ip)
            .await?)
    }

    async fn delete_ip(&self, namespace: &str, name: &str) -> Result<(), FabricError> {
        self.api::<IP>(namespace)
            .delete(name, &DeleteParams::default())
            .await?;
        Ok(())
    }
}
