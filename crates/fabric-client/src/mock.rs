//! Mock FabricClient for unit testing
//!
//! In-memory implementation of `FabricClientTrait`. Objects are keyed by
//! namespace and name; list queries are filtered with the same label-selector
//! matching the API server applies. Address-pool allocation is not simulated:
//! tests drive subnet/IP status explicitly with the `set_*_status` helpers.

use crate::error::FabricError;
use crate::fabric_trait::FabricClientTrait;
use crate::query::ListQuery;
use crds::{
    IP, IPAllocationStatus, Inventory, Subnet, SubnetAllocationStatus, Switch, SwitchConfig,
    SwitchStatus,
};
use kube::Resource;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

type Store<K> = Arc<Mutex<HashMap<(String, String), K>>>;

/// Mock FabricClient for testing
#[derive(Debug, Clone, Default)]
pub struct MockFabricClient {
    switches: Store<Switch>,
    inventories: Store<Inventory>,
    switch_configs: Store<SwitchConfig>,
    subnets: Store<Subnet>,
    ips: Store<IP>,
    status_patches: Arc<Mutex<u32>>,
    status_conflict: Arc<Mutex<bool>>,
    list_failure: Arc<Mutex<Option<String>>>,
    next_uid: Arc<Mutex<u64>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn key<K: Resource>(object: &K, namespace: &str) -> (String, String) {
    (
        object.meta().namespace.clone().unwrap_or_else(|| namespace.to_string()),
        object.meta().name.clone().unwrap_or_default(),
    )
}

fn list_matching<K>(store: &Store<K>, namespace: &str, query: &ListQuery) -> Vec<K>
where
    K: Resource + Clone,
{
    let empty = BTreeMap::new();
    let mut items: Vec<K> = lock(store)
        .iter()
        .filter(|((ns, _), _)| ns == namespace)
        .filter(|(_, obj)| query.matches(obj.meta().labels.as_ref().unwrap_or(&empty)))
        .map(|(_, obj)| obj.clone())
        .collect();
    items.sort_by(|a, b| a.meta().name.cmp(&b.meta().name));
    items
}

impl MockFabricClient {
    /// Create an empty mock store
    pub fn new() -> Self {
        Self::default()
    }

    fn insert<K: Resource>(&self, store: &Store<K>, mut object: K) {
        let key = key(&object, "default");
        if object.meta().uid.is_none() {
            object.meta_mut().uid = Some(self.next_uid());
        }
        object.meta_mut().namespace = Some(key.0.clone());
        lock(store).insert(key, object);
    }

    fn next_uid(&self) -> String {
        let mut id = lock(&self.next_uid);
        *id += 1;
        format!("00000000-0000-0000-0000-{:012}", *id)
    }

    /// Add or replace a switch (for test setup)
    pub fn add_switch(&self, switch: Switch) {
        self.insert(&self.switches, switch);
    }

    /// Add or replace an inventory (for test setup)
    pub fn add_inventory(&self, inventory: Inventory) {
        self.insert(&self.inventories, inventory);
    }

    /// Add or replace a switch config (for test setup)
    pub fn add_switch_config(&self, config: SwitchConfig) {
        self.insert(&self.switch_configs, config);
    }

    /// Add or replace a subnet (for test setup)
    pub fn add_subnet(&self, subnet: Subnet) {
        self.insert(&self.subnets, subnet);
    }

    /// Add or replace an IP (for test setup)
    pub fn add_ip(&self, ip: IP) {
        self.insert(&self.ips, ip);
    }

    /// Stored switch, if any
    pub fn switch(&self, namespace: &str, name: &str) -> Option<Switch> {
        lock(&self.switches)
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
    }

    /// All stored subnets in a namespace, sorted by name
    pub fn subnets(&self, namespace: &str) -> Vec<Subnet> {
        list_matching(&self.subnets, namespace, &ListQuery::all())
    }

    /// All stored IPs in a namespace, sorted by name
    pub fn ips(&self, namespace: &str) -> Vec<IP> {
        list_matching(&self.ips, namespace, &ListQuery::all())
    }

    /// Simulate the address-pool service updating a subnet
    pub fn set_subnet_status(&self, namespace: &str, name: &str, status: SubnetAllocationStatus) {
        if let Some(subnet) = lock(&self.subnets).get_mut(&(namespace.to_string(), name.to_string())) {
            subnet.status = Some(status);
        }
    }

    /// Simulate the address-pool service updating an IP
    pub fn set_ip_status(&self, namespace: &str, name: &str, status: IPAllocationStatus) {
        if let Some(ip) = lock(&self.ips).get_mut(&(namespace.to_string(), name.to_string())) {
            ip.status = Some(status);
        }
    }

    /// Number of status patches applied so far
    pub fn status_patch_count(&self) -> u32 {
        *lock(&self.status_patches)
    }

    /// Make status patches fail with a write conflict
    pub fn set_status_conflict(&self, conflict: bool) {
        *lock(&self.status_conflict) = conflict;
    }

    /// Make every list call fail with an invalid-request error
    pub fn set_list_failure(&self, message: Option<&str>) {
        *lock(&self.list_failure) = message.map(str::to_string);
    }

    fn check_list(&self) -> Result<(), FabricError> {
        match lock(&self.list_failure).as_ref() {
            Some(message) => Err(FabricError::InvalidRequest(message.clone())),
            None => Ok(()),
        }
    }

    fn create<K: Resource<DynamicType = ()> + Clone>(&self, store: &Store<K>, namespace: &str, object: &K) -> Result<K, FabricError> {
        let key = key(object, namespace);
        if lock(store).contains_key(&key) {
            return Err(FabricError::AlreadyExists(format!("{} {} already exists", K::kind(&()), key.1)));
        }
        let mut created = object.clone();
        created.meta_mut().namespace = Some(key.0.clone());
        created.meta_mut().uid = Some(self.next_uid());
        lock(store).insert(key, created.clone());
        Ok(created)
    }

    fn delete<K: Resource<DynamicType = ()>>(store: &Store<K>, namespace: &str, name: &str) -> Result<(), FabricError> {
        lock(store)
            .remove(&(namespace.to_string(), name.to_string()))
            .map(|_| ())
            .ok_or_else(|| FabricError::NotFound(format!("{} {} not found", K::kind(&()), name)))
    }
}

#[async_trait::async_trait]
impl FabricClientTrait for MockFabricClient {
    async fn get_switch(&self, namespace: &str, name: &str) -> Result<Switch, FabricError> {
        self.switch(namespace, name)
            .ok_or_else(|| FabricError::NotFound(format!("Switch {} not found", name)))
    }

    async fn list_switches(&self, namespace: &str, query: &ListQuery) -> Result<Vec<Switch>, FabricError> {
        self.check_list()?;
        Ok(list_matching(&self.switches, namespace, query))
    }

    async fn patch_switch_status(&self, namespace: &str, name: &str, status: &SwitchStatus) -> Result<Switch, FabricError> {
        if *lock(&self.status_conflict) {
            return Err(FabricError::Conflict(format!("Switch {} was modified", name)));
        }
        let mut switches = lock(&self.switches);
        let switch = switches
            .get_mut(&(namespace.to_string(), name.to_string()))
            .ok_or_else(|| FabricError::NotFound(format!("Switch {} not found", name)))?;
        switch.status = Some(status.clone());
        *lock(&self.status_patches) += 1;
        Ok(switch.clone())
    }

    async fn get_inventory(&self, namespace: &str, name: &str) -> Result<Inventory, FabricError> {
        lock(&self.inventories)
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| FabricError::NotFound(format!("Inventory {} not found", name)))
    }

    async fn list_switch_configs(&self, namespace: &str, query: &ListQuery) -> Result<Vec<SwitchConfig>, FabricError> {
        self.check_list()?;
        Ok(list_matching(&self.switch_configs, namespace, query))
    }

    async fn list_subnets(&self, namespace: &str, query: &ListQuery) -> Result<Vec<Subnet>, FabricError> {
        self.check_list()?;
        Ok(list_matching(&self.subnets, namespace, query))
    }

    async fn create_subnet(&self, namespace: &str, subnet: &Subnet) -> Result<Subnet, FabricError> {
        self.create(&self.subnets, namespace, subnet)
    }

    async fn delete_subnet(&self, namespace: &str, name: &str) -> Result<(), FabricError> {
        Self::delete(&self.subnets, namespace, name)
    }

    async fn list_ips(&self, namespace: &str, query: &ListQuery) -> Result<Vec<IP>, FabricError> {
        self.check_list()?;
        Ok(list_matching(&self.ips, namespace, query))
    }

    async fn create_ip(&self, namespace: &str, ip: &IP) -> Result<IP, FabricError> {
        self.create(&self.ips, namespace, ip)
    }

    async fn delete_ip(&self, namespace: &str, name: &str) -> Result<(), FabricError> {
        Self::delete(&self.ips, namespace, name)
    }
}
