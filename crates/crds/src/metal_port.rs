//! MetalPort CRD
//!
//! Declares the desired network configuration of one bare-metal server port:
//! bonding, Layer2/Layer3 mode, attached VLANs and the native VLAN.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Finalizer that gates deletion on the port reset
pub const METAL_PORT_FINALIZER: &str = "metal.dcops.microscaler.io/port-reset";

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[kube(
    group = "metal.dcops.microscaler.io",
    version = "v1alpha1",
    kind = "MetalPort",
    namespaced,
    status = "MetalPortStatus",
    shortname = "mport",
    printcolumn = r#"{"name":"Port","type":"string","jsonPath":".status.portId"}"#,
    printcolumn = r#"{"name":"Type","type":"string","jsonPath":".status.networkType"}"#,
    printcolumn = r#"{"name":"Phase","type":"string","jsonPath":".status.phase"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct MetalPortSpec {
    /// Port UUID; mutually exclusive with `deviceId` + `name`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port_id: Option<String>,

    /// Device UUID, used together with `name`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,

    /// Port name on the device (e.g. `bond0`, `eth1`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Whether the port should be bonded
    pub bonded: bool,

    /// Layer2 (true) or Layer3 (false); only valid for bond ports. Unset leaves the mode alone.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layer2: Option<bool>,

    /// VLAN UUIDs to attach; mutually exclusive with `vxlanIds`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub vlan_ids: Vec<String>,

    /// VXLAN numbers to attach; mutually exclusive with `vlanIds`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub vxlan_ids: Vec<u32>,

    /// Native VLAN, given as a UUID or VXLAN number to match the attachment list
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub native_vlan_id: Option<String>,

    /// Put the port back to bonded Layer3 with nothing attached when this resource is deleted
    #[serde(default)]
    pub reset_on_delete: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MetalPortStatus {
    pub phase: PortPhase,

    /// Error or warning text from the last reconcile
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Number of operations the last reconcile had to issue
    #[serde(default)]
    pub planned_operations: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_type: Option<String>,

    #[serde(default)]
    pub bonded: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layer2: Option<bool>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub vlan_ids: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub vxlan_ids: Vec<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub native_vlan_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bond_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bond_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mac: Option<String>,

    #[serde(default)]
    pub disbond_supported: bool,

    /// Generation the status was computed for
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}

/// Reconcile phase
///
/// Serializes as PascalCase ("Converged", "Failed", etc.), matching the
/// other DCops CRDs.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "PascalCase")]
pub enum PortPhase {
    /// Not reconciled yet
    #[default]
    Pending,

    /// Remote port matches the spec
    Converged,

    /// Spec can never be applied as written; fix the resource
    Invalid,

    /// Last reconcile failed and will be retried
    Failed,

    /// Reset on delete in progress
    Resetting,
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::CustomResourceExt;

    #[test]
    fn test_spec_uses_camel_case_and_defaults() {
        let spec: MetalPortSpec = serde_json::from_value(serde_json::json!({
            "deviceId": "d-1",
            "name": "bond0",
            "bonded": true,
            "layer2": true,
            "vxlanIds": [1001, 1002],
            "nativeVlanId": "1001"
        }))
        .unwrap();

        assert_eq!(spec.device_id.as_deref(), Some("d-1"));
        assert_eq!(spec.vxlan_ids, vec![1001, 1002]);
        assert!(spec.vlan_ids.is_empty());
        assert!(!spec.reset_on_delete);
    }

    #[test]
    fn test_status_phase_serializes_pascal_case() {
        let status = MetalPortStatus {
            phase: PortPhase::Converged,
            planned_operations: 2,
            ..Default::default()
        };
        let value = serde_json::to_value(&status).unwrap();
        assert_eq!(value["phase"], "Converged");
        assert_eq!(value["plannedOperations"], 2);
        assert!(value.get("vlanIds").is_none());
    }

    #[test]
    fn test_crd_metadata() {
        let crd = MetalPort::crd();
        assert_eq!(crd.spec.group, "metal.dcops.microscaler.io");
        assert_eq!(crd.spec.names.kind, "MetalPort");
        assert_eq!(crd.spec.scope, "Namespaced");
    }
}
