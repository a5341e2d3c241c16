//! Translation between MetalPort resources and the port reconciler

use crds::{MetalPort, MetalPortSpec, MetalPortStatus, PortPhase};
use metal_client::Port;
use port_reconciler::{PortIdentity, PortObservation, PortSpec, ReconcileError, SanityError};

/// Identity named by a MetalPort spec
pub fn port_identity(spec: &MetalPortSpec) -> Result<PortIdentity, SanityError> {
    PortIdentity::from_parts(
        spec.port_id.as_deref(),
        spec.device_id.as_deref(),
        spec.name.as_deref(),
    )
}

/// Desired port state for a MetalPort
pub fn port_spec(port: &MetalPort) -> Result<PortSpec, SanityError> {
    let spec = &port.spec;
    Ok(PortSpec {
        identity: port_identity(spec)?,
        bonded: spec.bonded,
        layer2: spec.layer2,
        native_vlan: spec.native_vlan_id.clone().filter(|native| !native.is_empty()),
        vlan_ids: spec.vlan_ids.iter().cloned().collect(),
        vxlan_ids: spec.vxlan_ids.iter().copied().collect(),
        reset_on_delete: spec.reset_on_delete,
    })
}

/// Status of a port that now matches its spec
pub fn converged(remote: &Port, planned: usize, generation: Option<i64>) -> MetalPortStatus {
    with_observation(
        MetalPortStatus {
            phase: PortPhase::Converged,
            planned_operations: u32::try_from(planned).unwrap_or(u32::MAX),
            observed_generation: generation,
            ..MetalPortStatus::default()
        },
        &PortObservation::from(remote),
    )
}

/// Status after a failed reconcile; the last observation is kept
pub fn failed(previous: Option<&MetalPortStatus>, error: &ReconcileError, generation: Option<i64>) -> MetalPortStatus {
    let phase = if error.is_retryable() {
        PortPhase::Failed
    } else {
        PortPhase::Invalid
    };
    MetalPortStatus {
        phase,
        message: Some(error.to_string()),
        observed_generation: generation,
        ..previous.cloned().unwrap_or_default()
    }
}

/// Status of a resource whose identity fields are unusable
pub fn invalid(previous: Option<&MetalPortStatus>, error: &SanityError, generation: Option<i64>) -> MetalPortStatus {
    MetalPortStatus {
        phase: PortPhase::Invalid,
        message: Some(error.to_string()),
        observed_generation: generation,
        ..previous.cloned().unwrap_or_default()
    }
}

/// Status while the deletion-time reset runs
pub fn resetting(previous: Option<&MetalPortStatus>) -> MetalPortStatus {
    MetalPortStatus {
        phase: PortPhase::Resetting,
        message: None,
        ..previous.cloned().unwrap_or_default()
    }
}

fn with_observation(status: MetalPortStatus, observed: &PortObservation) -> MetalPortStatus {
    MetalPortStatus {
        port_id: Some(observed.port_id.clone()),
        name: Some(observed.name.clone()),
        network_type: observed.network_type.clone(),
        bonded: observed.bonded,
        layer2: observed.layer2,
        vlan_ids: observed.vlan_ids.iter().cloned().collect(),
        vxlan_ids: observed.vxlan_ids.iter().copied().collect(),
        native_vlan_id: observed.native_vlan_id.clone(),
        bond_id: observed.bond_id.clone(),
        bond_name: observed.bond_name.clone(),
        mac: observed.mac.clone(),
        disbond_supported: observed.disbond_supported,
        ..status
    }
}

/// Whether writing `desired` would change anything
pub fn status_needs_update(current: Option<&MetalPortStatus>, desired: &MetalPortStatus) -> bool {
    current != Some(desired)
}

/// Merge patch for the status subresource
///
/// Every field is written explicitly so that cleared values (no native VLAN,
/// empty VLAN lists) remove what an earlier status set.
pub fn status_patch(status: &MetalPortStatus) -> serde_json::Value {
    serde_json::json!({
        "status": {
            "phase": status.phase,
            "message": status.message,
            "plannedOperations": status.planned_operations,
            "portId": status.port_id,
            "name": status.name,
            "networkType": status.network_type,
            "bonded": status.bonded,
            "layer2": status.layer2,
            "vlanIds": status.vlan_ids,
            "vxlanIds": status.vxlan_ids,
            "nativeVlanId": status.native_vlan_id,
            "bondId": status.bond_id,
            "bondName": status.bond_name,
            "mac": status.mac,
            "disbondSupported": status.disbond_supported,
            "observedGeneration": status.observed_generation,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use metal_client::mock::fixtures;
    use metal_client::NetworkType;
    use port_reconciler::Step;

    fn resource(spec: MetalPortSpec) -> MetalPort {
        MetalPort::new("port-a", spec)
    }

    fn base_spec() -> MetalPortSpec {
        MetalPortSpec {
            port_id: Some("p-1".to_string()),
            device_id: None,
            name: None,
            bonded: true,
            layer2: Some(true),
            vlan_ids: vec!["b".to_string(), "a".to_string()],
            vxlan_ids: Vec::new(),
            native_vlan_id: Some("a".to_string()),
            reset_on_delete: true,
        }
    }

    #[test]
    fn test_port_spec_from_resource() {
        let spec = port_spec(&resource(base_spec())).unwrap();
        assert_eq!(spec.identity, PortIdentity::Id("p-1".to_string()));
        assert_eq!(spec.layer2, Some(true));
        assert_eq!(spec.native_vlan.as_deref(), Some("a"));
        assert_eq!(spec.vlan_ids.iter().map(String::as_str).collect::<Vec<_>>(), vec!["a", "b"]);
        assert!(spec.reset_on_delete);
    }

    #[test]
    fn test_identity_by_device_and_name() {
        let spec = MetalPortSpec {
            port_id: None,
            device_id: Some("d-1".to_string()),
            name: Some("bond0".to_string()),
            ..base_spec()
        };
        assert_eq!(
            port_identity(&spec).unwrap(),
            PortIdentity::DeviceName {
                device_id: "d-1".to_string(),
                name: "bond0".to_string(),
            }
        );
    }

    #[test]
    fn test_bad_identity_is_rejected() {
        let both = MetalPortSpec {
            device_id: Some("d-1".to_string()),
            name: Some("bond0".to_string()),
            ..base_spec()
        };
        assert_eq!(port_spec(&resource(both)), Err(SanityError::AmbiguousIdentity));

        let half = MetalPortSpec {
            port_id: None,
            device_id: Some("d-1".to_string()),
            ..base_spec()
        };
        assert_eq!(port_identity(&half), Err(SanityError::IncompleteIdentity));
    }

    #[test]
    fn test_converged_status_projects_port() {
        let remote = fixtures::with_vlans(
            fixtures::bond_port("p-1", NetworkType::Layer2Bonded, true),
            &[fixtures::vlan("a", 1001), fixtures::vlan("b", 1002)],
            Some("a"),
        );
        let status = converged(&remote, 3, Some(7));

        assert_eq!(status.phase, PortPhase::Converged);
        assert_eq!(status.planned_operations, 3);
        assert_eq!(status.network_type.as_deref(), Some("layer2-bonded"));
        assert_eq!(status.layer2, Some(true));
        assert_eq!(status.vlan_ids, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(status.vxlan_ids, vec![1001, 1002]);
        assert_eq!(status.native_vlan_id.as_deref(), Some("a"));
        assert_eq!(status.observed_generation, Some(7));
        assert_eq!(status.message, None);
    }

    #[test]
    fn test_failed_status_keeps_last_observation() {
        let remote = fixtures::bond_port("p-1", NetworkType::Layer3, true);
        let previous = converged(&remote, 0, Some(1));

        let retryable = ReconcileError::Cancelled { step: Step::Bond };
        let status = failed(Some(&previous), &retryable, Some(2));
        assert_eq!(status.phase, PortPhase::Failed);
        assert_eq!(status.port_id.as_deref(), Some("p-1"));
        assert_eq!(status.message.as_deref(), Some("bond: cancelled"));

        let validation = ReconcileError::Validation(SanityError::UnbondedLayer3BondPort);
        assert_eq!(failed(None, &validation, None).phase, PortPhase::Invalid);
    }

    #[test]
    fn test_status_needs_update() {
        let remote = fixtures::bond_port("p-1", NetworkType::Layer3, true);
        let status = converged(&remote, 0, Some(1));

        assert!(status_needs_update(None, &status));
        assert!(!status_needs_update(Some(&status), &status));
        assert!(status_needs_update(Some(&status), &resetting(Some(&status))));
    }

    #[test]
    fn test_status_patch_clears_removed_fields() {
        let patch = status_patch(&MetalPortStatus::default());
        assert_eq!(patch["status"]["phase"], "Pending");
        assert!(patch["status"]["nativeVlanId"].is_null());
        assert_eq!(patch["status"]["vlanIds"], serde_json::json!([]));
    }
}
