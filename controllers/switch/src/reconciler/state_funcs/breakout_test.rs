//! Unit tests for port breakout

#[cfg(test)]
mod tests {
    use crate::reconciler::state_funcs::breakout::reconcile_breakout;
    use crate::reconciler::state_funcs::interfaces::{initialize, update_interfaces};
    use crate::reconciler::state_funcs::ports::update_port_parameters;
    use crate::test_utils::*;
    use crds::{
        AddressFamily, InterfaceOverride, InterfaceStatus, InterfacesSpec, IpAddressStatus,
        PeerStatus, PortParameters, SwitchStatus,
    };

    fn port(lanes: u32) -> InterfaceStatus {
        InterfaceStatus {
            mac_address: "02:00:00:00:00:01".to_string(),
            speed: 100_000,
            parameters: PortParameters {
                lanes: Some(lanes),
                mtu: Some(9100),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn status_with(ports: &[(&str, u32)], non_switch: u32) -> SwitchStatus {
        let mut status = SwitchStatus::initial();
        for (name, lanes) in ports {
            status.interfaces.insert((*name).to_string(), port(*lanes));
        }
        status.switch_ports = ports.len() as u32;
        status.total_ports = status.switch_ports + non_switch;
        status
    }

    fn names(status: &SwitchStatus) -> Vec<&str> {
        status.interfaces.keys().map(String::as_str).collect()
    }

    #[test]
    fn test_single_lane_breakout_adds_sub_ports() {
        let mut status = status_with(&[("Ethernet0", 1), ("Ethernet4", 4)], 1);
        let baseline = status.interfaces.get_mut("Ethernet0").unwrap();
        baseline.peer = Some(PeerStatus::default());
        baseline.ip = vec![IpAddressStatus {
            object_ref: None,
            address: "10.0.0.0/31".to_string(),
            address_family: AddressFamily::IPv4,
            extra_address: false,
        }];

        reconcile_breakout(&mut status);

        assert_eq!(
            names(&status),
            vec!["Ethernet0", "Ethernet1", "Ethernet2", "Ethernet3", "Ethernet4"]
        );
        let sub_port = &status.interfaces["Ethernet2"];
        assert_eq!(sub_port.parameters.lanes, Some(1));
        assert_eq!(sub_port.parameters.mtu, Some(9100));
        assert!(sub_port.ip.is_empty());
        assert!(sub_port.peer.is_none());
        assert_eq!(status.switch_ports, 5);
        assert_eq!(status.total_ports, 6);
    }

    #[test]
    fn test_two_lane_breakout_keeps_even_sub_port() {
        let mut status = status_with(
            &[("Ethernet0", 2), ("Ethernet1", 1), ("Ethernet2", 1), ("Ethernet3", 1)],
            0,
        );

        reconcile_breakout(&mut status);

        assert_eq!(names(&status), vec!["Ethernet0", "Ethernet2"]);
        assert_eq!(status.switch_ports, 2);
        assert_eq!(status.total_ports, 2);
    }

    #[test]
    fn test_four_lanes_removes_all_sub_ports() {
        let mut status = status_with(&[("Ethernet0", 4), ("Ethernet2", 2)], 2);

        reconcile_breakout(&mut status);

        assert_eq!(names(&status), vec!["Ethernet0"]);
        assert_eq!(status.switch_ports, 1);
        assert_eq!(status.total_ports, 3);
    }

    #[test]
    fn test_breakout_round_trip_restores_port_map() {
        let original = status_with(&[("Ethernet0", 4), ("Ethernet4", 4)], 1);
        let mut status = original.clone();

        for lanes in [1, 2, 4] {
            status.interfaces.get_mut("Ethernet0").unwrap().parameters.lanes = Some(lanes);
            // Sub-ports follow their baseline's lanes, as update_port_parameters does
            for sub in ["Ethernet1", "Ethernet2", "Ethernet3"] {
                if let Some(iface) = status.interfaces.get_mut(sub) {
                    iface.parameters.lanes = Some(lanes);
                }
            }
            reconcile_breakout(&mut status);
        }

        assert_eq!(status.interfaces, original.interfaces);
        assert_eq!(status.switch_ports, original.switch_ports);
        assert_eq!(status.total_ports, original.total_ports);
    }

    #[test]
    fn test_odd_port_with_multiple_lanes_is_dropped() {
        let mut status = status_with(&[("Ethernet5", 4), ("Ethernet6", 2)], 0);

        reconcile_breakout(&mut status);

        assert_eq!(names(&status), vec!["Ethernet6"]);
    }

    #[test]
    fn test_override_breaks_out_port_through_parameters_step() {
        let mut leaf = create_test_switch("leaf1", "aa:aa:aa:aa:aa:02");
        leaf.spec.interfaces = Some(InterfacesSpec {
            defaults: None,
            overrides: vec![InterfaceOverride {
                name: "Ethernet0".to_string(),
                parameters: PortParameters {
                    lanes: Some(1),
                    ..Default::default()
                },
                ip: Vec::new(),
            }],
        });
        let inventory = create_test_inventory(
            "leaf1",
            vec![machine_nic("Ethernet0"), machine_nic("Ethernet4"), unconnected_nic("eth0")],
        );
        let env = create_test_env(Some(inventory), Vec::new());

        // Two passes: the second starts again from the inventory's physical ports
        for _ in 0..2 {
            initialize(&mut leaf, &env).unwrap();
            update_interfaces(&mut leaf, &env).unwrap();
            update_port_parameters(&mut leaf, &env).unwrap();
        }

        let status = leaf.status.unwrap();
        assert_eq!(
            names(&status),
            vec!["Ethernet0", "Ethernet1", "Ethernet2", "Ethernet3", "Ethernet4"]
        );
        assert_eq!(status.interfaces["Ethernet3"].parameters.lanes, Some(1));
        assert_eq!(status.interfaces["Ethernet3"].parameters.mtu, Some(9100));
        assert_eq!(status.interfaces["Ethernet4"].parameters.lanes, Some(4));
        assert_eq!(status.switch_ports, 5);
        assert_eq!(status.total_ports, 6);
    }
}
