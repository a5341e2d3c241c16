//! Observed-state projection of a port

use metal_client::{NetworkType, Port};
use std::collections::BTreeSet;

/// What the controller reports back about a port
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PortObservation {
    pub port_id: String,
    pub name: String,
    pub network_type: Option<String>,
    pub bonded: bool,
    /// `true` for Layer2 types, `false` for Layer3/hybrid, `None` when unknown
    pub layer2: Option<bool>,
    pub vlan_ids: BTreeSet<String>,
    pub vxlan_ids: BTreeSet<u32>,
    pub native_vlan_id: Option<String>,
    pub bond_id: Option<String>,
    pub bond_name: Option<String>,
    pub mac: Option<String>,
    pub disbond_supported: bool,
}

impl From<&Port> for PortObservation {
    fn from(port: &Port) -> Self {
        let layer2 = match port.network_type {
            Some(t) if t.is_layer2() => Some(true),
            Some(t) if t.is_layer3() => Some(false),
            _ => None,
        };

        Self {
            port_id: port.id.clone(),
            name: port.name.clone(),
            network_type: port.network_type.map(|t| t.as_str().to_string()),
            bonded: port.is_bonded(),
            layer2,
            vlan_ids: port.attached_vlan_ids(),
            vxlan_ids: port.attached_vxlans(),
            native_vlan_id: port.native_vlan_id().map(str::to_string),
            bond_id: port.bond.as_ref().map(|b| b.id.clone()),
            bond_name: port.bond.as_ref().map(|b| b.name.clone()),
            mac: port.data.mac.clone(),
            disbond_supported: port.disbond_operation_supported,
        }
    }
}

impl PortObservation {
    /// Derived state-machine label, e.g. `layer2-bonded-native`
    pub fn mode(&self) -> &'static str {
        match (self.layer2, self.bonded, self.native_vlan_id.is_some()) {
            (Some(true), false, _) => "layer2-individual",
            (Some(true), true, false) => "layer2-bonded-no-native",
            (Some(true), true, true) => "layer2-bonded-native",
            (_, true, _) => "layer3-bonded",
            (_, false, _) => "layer3-unbonded",
        }
    }

    pub fn network_type_is(&self, expected: NetworkType) -> bool {
        self.network_type.as_deref() == Some(expected.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use metal_client::mock::fixtures;

    #[test]
    fn test_projection_of_layer2_port() {
        let port = fixtures::with_vlans(
            fixtures::bond_port("p-1", NetworkType::Layer2Bonded, true),
            &[fixtures::vlan("a", 1001), fixtures::vlan("b", 1002)],
            Some("b"),
        );
        let observed = PortObservation::from(&port);

        assert_eq!(observed.layer2, Some(true));
        assert_eq!(observed.vxlan_ids, BTreeSet::from([1001, 1002]));
        assert_eq!(observed.native_vlan_id.as_deref(), Some("b"));
        assert_eq!(observed.mode(), "layer2-bonded-native");
        assert!(observed.network_type_is(NetworkType::Layer2Bonded));
    }

    #[test]
    fn test_projection_of_hybrid_and_untyped_ports() {
        let hybrid = PortObservation::from(&fixtures::bond_port("p-1", NetworkType::Hybrid, false));
        assert_eq!(hybrid.layer2, Some(false));
        assert_eq!(hybrid.mode(), "layer3-unbonded");

        let member = PortObservation::from(&fixtures::member_port("p-2", true));
        assert_eq!(member.layer2, None);
        assert_eq!(member.bond_name.as_deref(), Some("bond0"));
        assert_eq!(member.mode(), "layer3-bonded");
    }
}
