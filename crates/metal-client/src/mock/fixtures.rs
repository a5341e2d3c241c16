//! Helper functions for building model values in tests

use crate::models::*;

/// A bond port (`bond0`) in the given mode
pub fn bond_port(id: &str, network_type: NetworkType, bonded: bool) -> Port {
    Port {
        id: id.to_string(),
        name: "bond0".to_string(),
        port_type: PortType::NetworkBondPort,
        network_type: Some(network_type),
        data: PortData {
            bonded,
            mac: Some("b8:ce:f6:00:00:01".to_string()),
        },
        native_virtual_network: None,
        virtual_networks: Vec::new(),
        bond: None,
        disbond_operation_supported: true,
    }
}

/// An ordinary member port (`eth1`) of `bond0`
pub fn member_port(id: &str, bonded: bool) -> Port {
    Port {
        id: id.to_string(),
        name: "eth1".to_string(),
        port_type: PortType::NetworkPort,
        network_type: None,
        data: PortData {
            bonded,
            mac: Some("b8:ce:f6:00:00:02".to_string()),
        },
        native_virtual_network: None,
        virtual_networks: Vec::new(),
        bond: Some(BondRef {
            id: "bond-ref".to_string(),
            name: "bond0".to_string(),
        }),
        disbond_operation_supported: true,
    }
}

pub fn vlan(id: &str, vxlan: u32) -> VirtualNetwork {
    VirtualNetwork {
        id: id.to_string(),
        vxlan: Some(vxlan),
        description: None,
        href: None,
    }
}

/// Attach VLANs to a port, optionally marking one as native
pub fn with_vlans(mut port: Port, vlans: &[VirtualNetwork], native: Option<&str>) -> Port {
    port.virtual_networks = vlans.to_vec();
    port.native_virtual_network = native.and_then(|id| vlans.iter().find(|v| v.id == id).cloned());
    port
}

pub fn device(id: &str, ports: Vec<Port>) -> Device {
    Device {
        id: id.to_string(),
        hostname: format!("{}.example", id),
        state: "active".to_string(),
        network_ports: ports,
    }
}
