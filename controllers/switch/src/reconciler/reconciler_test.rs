//! Unit tests for the switch reconcilers, driven against the in-memory store

#[cfg(test)]
mod tests {
    use crate::addressing::{port_subnet_name, south_demand};
    use crate::error::ControllerError;
    use crate::events::{actions, reasons};
    use crate::reconciler::environment::subnet_capacity;
    use crate::reconciler::{CONFLICT_REQUEUE, STATE_CONTROLLER, WAITING_REQUEUE};
    use crate::test_utils::*;
    use crds::{AddressFamiliesMap, AddressFamily, SwitchState, SwitchStatus};
    use fabric_client::MockFabricClient;
    use kube::ResourceExt;
    use kube_runtime::controller::Action;
    use std::time::Duration;

    const SPINE: &str = "aa:aa:aa:aa:aa:01";
    const LEAF: &str = "aa:aa:aa:aa:aa:02";

    /// Top spine cabled twice to an undiscovered leaf
    fn fabric_store() -> MockFabricClient {
        let mock = create_test_store();
        mock.add_switch(create_top_spine("spine1", SPINE));
        mock.add_switch(create_test_switch("leaf1", LEAF));
        mock.add_inventory(create_test_inventory(
            "spine1",
            vec![
                switch_nic("Ethernet0", LEAF, "Ethernet0"),
                switch_nic("Ethernet4", LEAF, "Ethernet4"),
                unconnected_nic("eth0"),
            ],
        ));
        mock.add_inventory(create_test_inventory(
            "leaf1",
            vec![
                switch_nic("Ethernet0", SPINE, "Ethernet0"),
                switch_nic("Ethernet4", SPINE, "Ethernet4"),
            ],
        ));
        mock
    }

    fn status_of(mock: &MockFabricClient, name: &str) -> SwitchStatus {
        mock.switch(TEST_NAMESPACE, name).unwrap().status.unwrap()
    }

    #[tokio::test]
    async fn test_switch_converges_to_ready() {
        let mock = fabric_store();
        let (reconciler, events) = create_test_reconciler(mock.clone());
        let spine = mock.switch(TEST_NAMESPACE, "spine1").unwrap();

        // Pass 1: everything up to port parameters, then no loopback yet
        let action = reconciler.reconcile_switch(&spine).await.unwrap();
        assert_eq!(action, Action::requeue(WAITING_REQUEUE));
        let status = status_of(&mock, "spine1");
        assert_eq!(status.state, Some(SwitchState::Invalid));
        assert_eq!(status.layer, 0);
        assert_eq!(status.switch_ports, 2);
        assert_eq!(status.total_ports, 3);
        assert_eq!(events.reasons(), vec!["MissingLoopbacks"]);
        assert!(events.events()[0].warning);

        let action = reconciler.reconcile_switch_addresses(&spine).await.unwrap();
        assert_eq!(action, Action::requeue(WAITING_REQUEUE));
        assert_eq!(mock.ips(TEST_NAMESPACE)[0].name_any(), "spine1-lo-ipv4");
        let requested = events.events().pop().unwrap();
        assert_eq!(requested.reason, reasons::LOOPBACK_REQUESTED);
        assert_eq!(requested.action, actions::ALLOCATE);
        assert!(!requested.warning);

        mock.set_ip_status(TEST_NAMESPACE, "spine1-lo-ipv4", finished_ip_status("10.255.0.1/32"));

        // Pass 2: loopback and ASN, then no south subnet yet
        reconciler.reconcile_switch(&spine).await.unwrap();
        let status = status_of(&mock, "spine1");
        assert_eq!(status.asn, Some(4_216_711_681));
        assert_eq!(status.loopback_addresses[0].address, "10.255.0.1/32");
        assert_eq!(events.reasons().last().map(String::as_str), Some("MissingSubnets"));

        reconciler.reconcile_switch_addresses(&spine).await.unwrap();
        let south = mock
            .subnets(TEST_NAMESPACE)
            .into_iter()
            .find(|s| s.name_any() == "spine1-sn-ipv4")
            .unwrap();
        assert_eq!(south.spec.prefix_bits, Some(28));
        assert_eq!(
            events.reasons().last().map(String::as_str),
            Some(reasons::SOUTH_SUBNET_REQUESTED)
        );

        mock.set_subnet_status(TEST_NAMESPACE, "spine1-sn-ipv4", finished_subnet_status("10.0.0.0/28"));

        // Pass 3: subnets and port addresses
        let action = reconciler.reconcile_switch(&spine).await.unwrap();
        assert_eq!(action, Action::await_change());
        let status = status_of(&mock, "spine1");
        assert_eq!(status.state, Some(SwitchState::Ready));
        assert!(status.message.is_none());
        assert_eq!(status.interfaces["Ethernet0"].ip[0].address, "10.0.0.0/31");
        assert_eq!(status.interfaces["Ethernet4"].ip[0].address, "10.0.0.8/31");
        assert_eq!(events.reasons().last().map(String::as_str), Some(reasons::READY));

        // Pass 4: nothing changed, nothing written or published
        let patches = mock.status_patch_count();
        let published = events.events().len();
        let action = reconciler.reconcile_switch(&spine).await.unwrap();
        assert_eq!(action, Action::await_change());
        assert_eq!(mock.status_patch_count(), patches);
        assert_eq!(events.events().len(), published);

        // Per-port subnets follow the computed addresses
        let action = reconciler.reconcile_switch_addresses(&spine).await.unwrap();
        assert_eq!(action, Action::requeue(WAITING_REQUEUE));
        let first = port_subnet_name("spine1", "Ethernet0", "10.0.0.0/31");
        let second = port_subnet_name("spine1", "Ethernet4", "10.0.0.8/31");
        for (name, cidr) in [(&first, "10.0.0.0/31"), (&second, "10.0.0.8/31")] {
            mock.set_subnet_status(TEST_NAMESPACE, name, finished_subnet_status(cidr));
        }
        let action = reconciler.reconcile_switch_addresses(&spine).await.unwrap();
        assert_eq!(action, Action::await_change());

        let halted = reconciler
            .metrics
            .reconcile_total
            .with_label_values(&[STATE_CONTROLLER, "halted"])
            .get();
        assert_eq!(halted, 2);
    }

    #[tokio::test]
    async fn test_dual_stack_switch_waits_for_config_then_converges() {
        let mock = MockFabricClient::new();
        mock.add_subnet(create_pool_subnet(LOOPBACK_POOL, "10.255.0.0/24", LOOPBACK_POOL));
        mock.add_subnet(create_pool_subnet("loopbacks-v6", "fd00:ff::/120", LOOPBACK_POOL));
        mock.add_subnet(create_pool_subnet(CARRIER_POOL, "10.0.0.0/16", CARRIER_POOL));
        mock.add_subnet(create_pool_subnet("carrier-v6", "fd00::/112", CARRIER_POOL));
        mock.add_switch(create_top_spine("spine1", SPINE));
        mock.add_switch(create_test_switch("leaf1", LEAF));
        mock.add_inventory(create_test_inventory(
            "spine1",
            vec![
                switch_nic("Ethernet0", LEAF, "Ethernet0"),
                switch_nic("Ethernet4", LEAF, "Ethernet4"),
            ],
        ));
        let (reconciler, events) = create_test_reconciler(mock.clone());
        let spine = mock.switch(TEST_NAMESPACE, "spine1").unwrap();

        // No SwitchConfig yet
        let action = reconciler.reconcile_switch(&spine).await.unwrap();
        assert_eq!(action, Action::requeue(WAITING_REQUEUE));
        let status = status_of(&mock, "spine1");
        assert_eq!(status.state, Some(SwitchState::Pending));
        assert!(status.config_ref.is_none());
        assert_eq!(events.reasons(), vec!["MissingConfig"]);

        let mut config = create_test_switch_config("fabric");
        config.spec.ipam.address_families = AddressFamiliesMap { ipv4: true, ipv6: true };
        mock.add_switch_config(config);

        reconciler.reconcile_switch(&spine).await.unwrap();
        let status = status_of(&mock, "spine1");
        assert_eq!(status.state, Some(SwitchState::Invalid));
        assert!(status.config_ref.is_some());
        assert_eq!(events.reasons().last().map(String::as_str), Some("MissingLoopbacks"));

        // One loopback per family
        reconciler.reconcile_switch_addresses(&spine).await.unwrap();
        let mut loopbacks: Vec<String> = mock.ips(TEST_NAMESPACE).iter().map(|ip| ip.name_any()).collect();
        loopbacks.sort();
        assert_eq!(loopbacks, vec!["spine1-lo-ipv4", "spine1-lo-ipv6"]);
        mock.set_ip_status(TEST_NAMESPACE, "spine1-lo-ipv4", finished_ip_status("10.255.0.1/32"));
        mock.set_ip_status(TEST_NAMESPACE, "spine1-lo-ipv6", finished_ip_status("fd00:ff::1/128"));

        reconciler.reconcile_switch(&spine).await.unwrap();
        let status = status_of(&mock, "spine1");
        assert_eq!(status.loopback_addresses.len(), 2);
        assert_eq!(events.reasons().last().map(String::as_str), Some("MissingSubnets"));

        // South subnets sized to 2 ports x 4 lanes x 2 addresses
        let demand = south_demand(&status.interfaces, AddressFamily::IPv4).unwrap();
        assert_eq!(demand, 2 * 4 * 2);
        reconciler.reconcile_switch_addresses(&spine).await.unwrap();
        let prefix_of = |name: &str| {
            mock.subnets(TEST_NAMESPACE)
                .into_iter()
                .find(|s| s.name_any() == name)
                .and_then(|s| s.spec.prefix_bits)
        };
        assert_eq!(prefix_of("spine1-sn-ipv4"), Some(28));
        assert_eq!(prefix_of("spine1-sn-ipv6"), Some(124));
        mock.set_subnet_status(TEST_NAMESPACE, "spine1-sn-ipv4", finished_subnet_status("10.0.0.0/28"));
        mock.set_subnet_status(TEST_NAMESPACE, "spine1-sn-ipv6", finished_subnet_status("fd00::/124"));
        let south_v4 = mock
            .subnets(TEST_NAMESPACE)
            .into_iter()
            .find(|s| s.name_any() == "spine1-sn-ipv4")
            .unwrap();
        assert_eq!(subnet_capacity(&south_v4), demand);

        let action = reconciler.reconcile_switch(&spine).await.unwrap();
        assert_eq!(action, Action::await_change());
        let status = status_of(&mock, "spine1");
        assert_eq!(status.state, Some(SwitchState::Ready));
        assert_eq!(status.loopback_addresses.len(), 2);
        assert_eq!(status.subnets.len(), 2);
        let addresses = |port: &str| -> Vec<String> {
            status.interfaces[port].ip.iter().map(|a| a.address.clone()).collect()
        };
        assert!(addresses("Ethernet0").contains(&"10.0.0.0/31".to_string()));
        assert!(addresses("Ethernet0").contains(&"fd00::/127".to_string()));
        assert!(addresses("Ethernet4").contains(&"10.0.0.8/31".to_string()));
        assert!(addresses("Ethernet4").contains(&"fd00::8/127".to_string()));
    }

    #[tokio::test]
    async fn test_deleted_switch_is_ignored() {
        let mock = create_test_store();
        let (reconciler, events) = create_test_reconciler(mock.clone());
        let gone = create_test_switch("gone", LEAF);

        assert_eq!(reconciler.reconcile_switch(&gone).await.unwrap(), Action::await_change());
        assert_eq!(reconciler.reconcile_switch_addresses(&gone).await.unwrap(), Action::await_change());
        assert!(events.events().is_empty());
        assert_eq!(mock.status_patch_count(), 0);
    }

    #[tokio::test]
    async fn test_status_conflict_requeues_quickly() {
        let mock = fabric_store();
        mock.set_status_conflict(true);
        let (reconciler, events) = create_test_reconciler(mock.clone());
        let spine = mock.switch(TEST_NAMESPACE, "spine1").unwrap();

        let action = reconciler.reconcile_switch(&spine).await.unwrap();

        assert_eq!(action, Action::requeue(CONFLICT_REQUEUE));
        assert!(mock.switch(TEST_NAMESPACE, "spine1").unwrap().status.is_none());
        assert!(events.events().is_empty());

        mock.set_status_conflict(false);
        reconciler.reconcile_switch(&spine).await.unwrap();
        assert!(mock.switch(TEST_NAMESPACE, "spine1").unwrap().status.is_some());
    }

    #[tokio::test]
    async fn test_list_failures_still_record_status() {
        let mock = fabric_store();
        mock.set_list_failure(Some("list failed"));
        let (reconciler, events) = create_test_reconciler(mock.clone());
        let spine = mock.switch(TEST_NAMESPACE, "spine1").unwrap();

        let action = reconciler.reconcile_switch(&spine).await.unwrap();

        assert_eq!(action, Action::requeue(WAITING_REQUEUE));
        let status = status_of(&mock, "spine1");
        assert_eq!(status.state, Some(SwitchState::Pending));
        assert_eq!(status.total_ports, 3);
        assert_eq!(events.reasons(), vec!["MissingSwitches"]);
    }

    #[tokio::test]
    async fn test_failures_back_off_until_success() {
        let mock = fabric_store();
        let (reconciler, _) = create_test_reconciler(mock.clone());
        let spine = mock.switch(TEST_NAMESPACE, "spine1").unwrap();
        let failure = ControllerError::Reconciliation("store unavailable".to_string());

        let delays: Vec<Action> = (0..4).map(|_| reconciler.error_action(&spine, &failure)).collect();

        assert_eq!(
            delays,
            vec![
                Action::requeue(Duration::from_secs(60)),
                Action::requeue(Duration::from_secs(60)),
                Action::requeue(Duration::from_secs(120)),
                Action::requeue(Duration::from_secs(180)),
            ]
        );
        assert_eq!(reconciler.error_count("default/spine1"), 4);

        reconciler.reconcile_switch(&spine).await.unwrap();
        assert_eq!(reconciler.error_count("default/spine1"), 0);
        assert_eq!(
            reconciler.error_action(&spine, &failure),
            Action::requeue(Duration::from_secs(60))
        );
    }

    #[tokio::test]
    async fn test_conflict_errors_skip_backoff() {
        let mock = fabric_store();
        let (reconciler, _) = create_test_reconciler(mock.clone());
        let spine = mock.switch(TEST_NAMESPACE, "spine1").unwrap();
        let conflict = ControllerError::Fabric(fabric_client::FabricError::Conflict("stale".to_string()));

        assert_eq!(reconciler.error_action(&spine, &conflict), Action::requeue(CONFLICT_REQUEUE));
        assert_eq!(reconciler.error_count("default/spine1"), 0);
    }

    #[tokio::test]
    async fn test_failed_loopback_reclaim_is_reported() {
        let mock = fabric_store();
        let (reconciler, events) = create_test_reconciler(mock.clone());
        let spine = mock.switch(TEST_NAMESPACE, "spine1").unwrap();

        reconciler.reconcile_switch_addresses(&spine).await.unwrap();
        mock.set_ip_status(TEST_NAMESPACE, "spine1-lo-ipv4", failed_ip_status());
        let action = reconciler.reconcile_switch_addresses(&spine).await.unwrap();

        assert_eq!(action, Action::requeue(WAITING_REQUEUE));
        assert!(mock.ips(TEST_NAMESPACE).is_empty());
        let reclaimed = events.events().pop().unwrap();
        assert!(reclaimed.warning);
        assert_eq!(reclaimed.reason, reasons::FAILED_RESOURCE_RECLAIMED);
        assert_eq!(reclaimed.action, actions::RECLAIM);

        let reclaims = reconciler
            .metrics
            .address_resources_total
            .with_label_values(&["IP", actions::RECLAIM])
            .get();
        assert_eq!(reclaims, 1);
    }
}
