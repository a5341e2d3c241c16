//! Desired port state

use crate::sanity::SanityError;
use metal_client::Port;
use std::collections::BTreeSet;

/// How the port to manage is identified
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PortIdentity {
    /// Port UUID
    Id(String),
    /// Port looked up by name on its device
    DeviceName { device_id: String, name: String },
}

impl PortIdentity {
    /// Build an identity from loosely specified parts
    ///
    /// Either `port_id` alone, or both `device_id` and `name`.
    pub fn from_parts(
        port_id: Option<&str>,
        device_id: Option<&str>,
        name: Option<&str>,
    ) -> Result<Self, SanityError> {
        let port_id = port_id.filter(|s| !s.is_empty());
        let device_id = device_id.filter(|s| !s.is_empty());
        let name = name.filter(|s| !s.is_empty());

        match (port_id, device_id, name) {
            (Some(_), Some(_), _) | (Some(_), _, Some(_)) => Err(SanityError::AmbiguousIdentity),
            (Some(id), None, None) => Ok(PortIdentity::Id(id.to_string())),
            (None, Some(device_id), Some(name)) => Ok(PortIdentity::DeviceName {
                device_id: device_id.to_string(),
                name: name.to_string(),
            }),
            (None, _, _) => Err(SanityError::IncompleteIdentity),
        }
    }
}

impl std::fmt::Display for PortIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PortIdentity::Id(id) => write!(f, "port {}", id),
            PortIdentity::DeviceName { device_id, name } => write!(f, "port {} of device {}", name, device_id),
        }
    }
}

/// Which of the two VLAN addressings a spec uses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VlanAddressing {
    /// VLAN UUIDs (`vlan_ids`)
    Uuid,
    /// VXLAN numbers (`vxlan_ids`)
    Vxlan,
}

/// Desired configuration of one port
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortSpec {
    pub identity: PortIdentity,
    pub bonded: bool,
    /// `None` leaves the Layer2/Layer3 mode alone
    pub layer2: Option<bool>,
    /// Native VLAN, addressed the same way as the attachment set
    pub native_vlan: Option<String>,
    pub vlan_ids: BTreeSet<String>,
    pub vxlan_ids: BTreeSet<u32>,
    pub reset_on_delete: bool,
}

impl PortSpec {
    /// A spec that only pins the bonding state
    pub fn new(identity: PortIdentity, bonded: bool) -> Self {
        Self {
            identity,
            bonded,
            layer2: None,
            native_vlan: None,
            vlan_ids: BTreeSet::new(),
            vxlan_ids: BTreeSet::new(),
            reset_on_delete: false,
        }
    }

    /// Desired state applied on deletion: bonded Layer3, nothing attached
    pub fn reset(identity: PortIdentity) -> Self {
        Self {
            layer2: Some(false),
            ..Self::new(identity, true)
        }
    }

    pub fn addressing(&self) -> VlanAddressing {
        if self.vxlan_ids.is_empty() {
            VlanAddressing::Uuid
        } else {
            VlanAddressing::Vxlan
        }
    }

    /// Desired attachment set, rendered in the spec's addressing
    pub fn desired_vlans(&self) -> BTreeSet<String> {
        match self.addressing() {
            VlanAddressing::Uuid => self.vlan_ids.clone(),
            VlanAddressing::Vxlan => self.vxlan_ids.iter().map(u32::to_string).collect(),
        }
    }

    /// Desired native VLAN; an empty string means "none"
    pub fn desired_native(&self) -> Option<&str> {
        self.native_vlan.as_deref().filter(|native| !native.is_empty())
    }
}

/// VLANs attached to `port`, rendered in `addressing`
///
/// In VXLAN addressing a VLAN without a known VXLAN number falls back to
/// its UUID, so it still shows up as something to detach.
pub fn attached_vlans(port: &Port, addressing: VlanAddressing) -> BTreeSet<String> {
    match addressing {
        VlanAddressing::Uuid => port.attached_vlan_ids(),
        VlanAddressing::Vxlan => port
            .virtual_networks
            .iter()
            .map(|vlan| vlan.vxlan.map_or_else(|| vlan.id.clone(), |vxlan| vxlan.to_string()))
            .collect(),
    }
}

/// Native VLAN of `port`, rendered in `addressing`
pub fn current_native(port: &Port, addressing: VlanAddressing) -> Option<String> {
    let native = port.native_virtual_network.as_ref()?;
    Some(match (addressing, native.vxlan) {
        (VlanAddressing::Vxlan, Some(vxlan)) => vxlan.to_string(),
        _ => native.id.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use metal_client::mock::fixtures;
    use metal_client::NetworkType;

    #[test]
    fn test_identity_from_port_id() {
        assert_eq!(
            PortIdentity::from_parts(Some("p-1"), None, None).unwrap(),
            PortIdentity::Id("p-1".to_string())
        );
    }

    #[test]
    fn test_identity_from_device_and_name() {
        assert_eq!(
            PortIdentity::from_parts(None, Some("d-1"), Some("bond0")).unwrap(),
            PortIdentity::DeviceName {
                device_id: "d-1".to_string(),
                name: "bond0".to_string(),
            }
        );
    }

    #[test]
    fn test_identity_rejects_mixed_and_partial_parts() {
        assert_eq!(
            PortIdentity::from_parts(Some("p-1"), Some("d-1"), None),
            Err(SanityError::AmbiguousIdentity)
        );
        assert_eq!(
            PortIdentity::from_parts(Some("p-1"), None, Some("bond0")),
            Err(SanityError::AmbiguousIdentity)
        );
        assert_eq!(
            PortIdentity::from_parts(None, Some("d-1"), None),
            Err(SanityError::IncompleteIdentity)
        );
        assert_eq!(
            PortIdentity::from_parts(None, None, Some("")),
            Err(SanityError::IncompleteIdentity)
        );
    }

    #[test]
    fn test_vxlan_addressing_renders_numbers() {
        let mut spec = PortSpec::new(PortIdentity::Id("p-1".to_string()), true);
        spec.vxlan_ids = BTreeSet::from([1001, 1002]);
        assert_eq!(spec.addressing(), VlanAddressing::Vxlan);
        assert_eq!(
            spec.desired_vlans(),
            BTreeSet::from(["1001".to_string(), "1002".to_string()])
        );

        let mut port = fixtures::bond_port("p-1", NetworkType::Layer2Bonded, true);
        port = fixtures::with_vlans(port, &[fixtures::vlan("v-1", 1001)], Some("v-1"));
        port.virtual_networks.push(metal_client::VirtualNetwork {
            id: "v-x".to_string(),
            vxlan: None,
            description: None,
            href: None,
        });
        assert_eq!(
            attached_vlans(&port, VlanAddressing::Vxlan),
            BTreeSet::from(["1001".to_string(), "v-x".to_string()])
        );
        assert_eq!(current_native(&port, VlanAddressing::Vxlan).as_deref(), Some("1001"));
        assert_eq!(current_native(&port, VlanAddressing::Uuid).as_deref(), Some("v-1"));
    }

    #[test]
    fn test_reset_spec_targets_bonded_layer3() {
        let spec = PortSpec::reset(PortIdentity::Id("p-1".to_string()));
        assert!(spec.bonded);
        assert_eq!(spec.layer2, Some(false));
        assert!(spec.desired_vlans().is_empty());
        assert_eq!(spec.desired_native(), None);
    }
}
