//! Pre-mutation sanity checks
//!
//! Rejects specs the API would refuse halfway through the pipeline, before
//! any remote state is touched.

use crate::spec::PortSpec;
use metal_client::Port;
use thiserror::Error;

/// A spec that can never be applied to the port as it stands
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SanityError {
    #[error("you must specify either id or (device_id and name)")]
    AmbiguousIdentity,

    #[error("If you don't use port_id, you must supply both device_id and name")]
    IncompleteIdentity,

    #[error("layer2 flag can be set only for bond ports (port {port_id} is not one)")]
    Layer2OnNonBondPort { port_id: String },

    #[error("bond port in Layer3 can't be unbonded")]
    UnbondedLayer3BondPort,

    #[error("the native VLAN to be set ({native}) is not (being) assigned to the port")]
    NativeVlanNotAssigned { native: String },

    #[error("native VLAN can only be set if more than one VLAN are assigned to the port (got {count})")]
    NativeVlanNeedsMultipleVlans { count: usize },

    #[error("vlan_ids and vxlan_ids are mutually exclusive")]
    MixedVlanAddressing,
}

/// Check `spec` against the current `port`
///
/// The effective target mode is `spec.layer2` when set, otherwise the
/// port's current mode.
pub fn sanity_check(port: &Port, spec: &PortSpec) -> Result<(), SanityError> {
    if !spec.vlan_ids.is_empty() && !spec.vxlan_ids.is_empty() {
        return Err(SanityError::MixedVlanAddressing);
    }

    let is_bond_port = port.is_bond_port();
    if !is_bond_port && spec.layer2 == Some(true) {
        return Err(SanityError::Layer2OnNonBondPort {
            port_id: port.id.clone(),
        });
    }

    let target_layer2 = spec.layer2.unwrap_or_else(|| port.is_layer2());
    if is_bond_port && !target_layer2 && !spec.bonded {
        return Err(SanityError::UnbondedLayer3BondPort);
    }

    if let Some(native) = spec.desired_native() {
        let desired = spec.desired_vlans();
        if !desired.contains(native) {
            return Err(SanityError::NativeVlanNotAssigned {
                native: native.to_string(),
            });
        }
        if desired.len() < 2 {
            return Err(SanityError::NativeVlanNeedsMultipleVlans { count: desired.len() });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::PortIdentity;
    use metal_client::mock::fixtures;
    use metal_client::NetworkType;
    use std::collections::BTreeSet;

    fn spec(bonded: bool, layer2: Option<bool>) -> PortSpec {
        PortSpec {
            layer2,
            ..PortSpec::new(PortIdentity::Id("p-1".to_string()), bonded)
        }
    }

    fn with_vlans(mut spec: PortSpec, vlans: &[&str], native: Option<&str>) -> PortSpec {
        spec.vlan_ids = vlans.iter().map(|v| v.to_string()).collect();
        spec.native_vlan = native.map(str::to_string);
        spec
    }

    /// Expected outcome for every layer2 x bonded x port type combination
    #[test]
    fn test_mode_grid_is_total() {
        let l3_bond = fixtures::bond_port("p-1", NetworkType::Layer3, true);
        let l2_bond = fixtures::bond_port("p-1", NetworkType::Layer2Bonded, true);
        let member = fixtures::member_port("p-2", true);

        for layer2 in [None, Some(false), Some(true)] {
            for bonded in [false, true] {
                let s = spec(bonded, layer2);

                // bond port currently in Layer3
                let expected = match (layer2, bonded) {
                    (None | Some(false), false) => Err(SanityError::UnbondedLayer3BondPort),
                    _ => Ok(()),
                };
                assert_eq!(sanity_check(&l3_bond, &s), expected, "layer3 bond, {layer2:?}/{bonded}");

                // bond port currently in Layer2
                let expected = match (layer2, bonded) {
                    (Some(false), false) => Err(SanityError::UnbondedLayer3BondPort),
                    _ => Ok(()),
                };
                assert_eq!(sanity_check(&l2_bond, &s), expected, "layer2 bond, {layer2:?}/{bonded}");

                // ordinary port
                let expected = match layer2 {
                    Some(true) => Err(SanityError::Layer2OnNonBondPort {
                        port_id: "p-2".to_string(),
                    }),
                    _ => Ok(()),
                };
                assert_eq!(sanity_check(&member, &s), expected, "member, {layer2:?}/{bonded}");
            }
        }
    }

    #[test]
    fn test_native_vlan_grid() {
        let port = fixtures::bond_port("p-1", NetworkType::Layer2Bonded, true);
        let base = spec(true, Some(true));

        assert_eq!(sanity_check(&port, &with_vlans(base.clone(), &["a", "b"], Some("a"))), Ok(()));
        assert_eq!(sanity_check(&port, &with_vlans(base.clone(), &[], None)), Ok(()));
        assert_eq!(
            sanity_check(&port, &with_vlans(base.clone(), &["a", "b"], Some("c"))),
            Err(SanityError::NativeVlanNotAssigned { native: "c".to_string() })
        );
        assert_eq!(
            sanity_check(&port, &with_vlans(base.clone(), &["a"], Some("a"))),
            Err(SanityError::NativeVlanNeedsMultipleVlans { count: 1 })
        );
        assert_eq!(
            sanity_check(&port, &with_vlans(base.clone(), &[], Some("a"))),
            Err(SanityError::NativeVlanNotAssigned { native: "a".to_string() })
        );
        // empty string means "no native"
        assert_eq!(sanity_check(&port, &with_vlans(base, &["a"], Some(""))), Ok(()));
    }

    #[test]
    fn test_native_vlan_in_vxlan_addressing() {
        let port = fixtures::bond_port("p-1", NetworkType::Layer2Bonded, true);
        let mut s = spec(true, Some(true));
        s.vxlan_ids = BTreeSet::from([1001, 1002]);
        s.native_vlan = Some("1002".to_string());
        assert_eq!(sanity_check(&port, &s), Ok(()));

        s.native_vlan = Some("v-uuid".to_string());
        assert!(matches!(
            sanity_check(&port, &s),
            Err(SanityError::NativeVlanNotAssigned { .. })
        ));
    }

    #[test]
    fn test_mixed_addressing_rejected() {
        let port = fixtures::bond_port("p-1", NetworkType::Layer2Bonded, true);
        let mut s = with_vlans(spec(true, Some(true)), &["a"], None);
        s.vxlan_ids = BTreeSet::from([1001]);
        assert_eq!(sanity_check(&port, &s), Err(SanityError::MixedVlanAddressing));
    }

    #[test]
    fn test_identity_messages_match_operator_wording() {
        assert_eq!(
            SanityError::AmbiguousIdentity.to_string(),
            "you must specify either id or (device_id and name)"
        );
        assert_eq!(
            SanityError::IncompleteIdentity.to_string(),
            "If you don't use port_id, you must supply both device_id and name"
        );
    }
}
