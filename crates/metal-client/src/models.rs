//! Metal API models
//!
//! These models match the JSON returned by the Metal v1 REST API. Only the
//! fields the port controller and its waiters read are modelled; everything
//! else in the payload is ignored on deserialization.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Port kind reported by the API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PortType {
    NetworkPort,
    NetworkBondPort,
    #[serde(other)]
    Unknown,
}

/// Network mode of a port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NetworkType {
    #[serde(rename = "layer3")]
    Layer3,
    #[serde(rename = "hybrid")]
    Hybrid,
    #[serde(rename = "hybrid-bonded")]
    HybridBonded,
    #[serde(rename = "layer2-individual")]
    Layer2Individual,
    #[serde(rename = "layer2-bonded")]
    Layer2Bonded,
    #[serde(other)]
    Unknown,
}

impl NetworkType {
    pub fn is_layer2(self) -> bool {
        matches!(self, NetworkType::Layer2Individual | NetworkType::Layer2Bonded)
    }

    pub fn is_layer3(self) -> bool {
        matches!(
            self,
            NetworkType::Layer3 | NetworkType::Hybrid | NetworkType::HybridBonded
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            NetworkType::Layer3 => "layer3",
            NetworkType::Hybrid => "hybrid",
            NetworkType::HybridBonded => "hybrid-bonded",
            NetworkType::Layer2Individual => "layer2-individual",
            NetworkType::Layer2Bonded => "layer2-bonded",
            NetworkType::Unknown => "unknown",
        }
    }
}

/// Port data block
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PortData {
    #[serde(default)]
    pub bonded: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mac: Option<String>,
}

/// VLAN (virtual network) as embedded in a port
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VirtualNetwork {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vxlan: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
}

/// Reference to the bond a port belongs to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BondRef {
    pub id: String,
    pub name: String,
}

/// Network port on a device
///
/// Fetched with `include=native_virtual_network,virtual_networks` so the
/// VLAN associations are embedded objects instead of bare hrefs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Port {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub port_type: PortType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_type: Option<NetworkType>,
    #[serde(default)]
    pub data: PortData,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub native_virtual_network: Option<VirtualNetwork>,
    #[serde(default)]
    pub virtual_networks: Vec<VirtualNetwork>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bond: Option<BondRef>,
    #[serde(default)]
    pub disbond_operation_supported: bool,
}

impl Port {
    pub fn is_bond_port(&self) -> bool {
        self.port_type == PortType::NetworkBondPort
    }

    pub fn is_bonded(&self) -> bool {
        self.data.bonded
    }

    /// True when the network type is one of the Layer2 variants
    pub fn is_layer2(&self) -> bool {
        self.network_type.is_some_and(NetworkType::is_layer2)
    }

    /// UUIDs of the attached VLANs
    pub fn attached_vlan_ids(&self) -> BTreeSet<String> {
        self.virtual_networks.iter().map(|v| v.id.clone()).collect()
    }

    /// VXLAN numbers of the attached VLANs (entries without one are skipped)
    pub fn attached_vxlans(&self) -> BTreeSet<u32> {
        self.virtual_networks.iter().filter_map(|v| v.vxlan).collect()
    }

    /// UUID of the native VLAN, if one is set
    pub fn native_vlan_id(&self) -> Option<&str> {
        self.native_virtual_network.as_ref().map(|v| v.id.as_str())
    }

    /// VXLAN number of the native VLAN, if one is set and known
    pub fn native_vxlan(&self) -> Option<u32> {
        self.native_virtual_network.as_ref().and_then(|v| v.vxlan)
    }
}

/// Device (server) with its network ports
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    pub id: String,
    #[serde(default)]
    pub hostname: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub network_ports: Vec<Port>,
}

impl Device {
    /// Find a port by its name (e.g. "bond0", "eth1")
    pub fn port_by_name(&self, name: &str) -> Option<&Port> {
        self.network_ports.iter().find(|p| p.name == name)
    }
}

/// Requested address for a Layer3 conversion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressRequest {
    pub address_family: u8,
    pub public: bool,
}

impl AddressRequest {
    pub const fn new(address_family: u8, public: bool) -> Self {
        Self {
            address_family,
            public,
        }
    }

    /// Public IPv4, private IPv4 and public IPv6
    pub fn layer3_defaults() -> Vec<AddressRequest> {
        vec![
            AddressRequest::new(4, true),
            AddressRequest::new(4, false),
            AddressRequest::new(6, true),
        ]
    }
}

/// Desired state of a single VLAN in a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VlanAssignmentState {
    Assigned,
    Unassigned,
}

/// One entry of a VLAN assignment batch request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VlanAssignmentCreateRequest {
    /// VLAN UUID or VXLAN number rendered as a string
    pub vlan: String,
    pub state: VlanAssignmentState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub native: Option<bool>,
}

/// Request body for creating a VLAN assignment batch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VlanAssignmentBatchCreateRequest {
    pub vlan_assignments: Vec<VlanAssignmentCreateRequest>,
}

impl VlanAssignmentBatchCreateRequest {
    pub fn is_empty(&self) -> bool {
        self.vlan_assignments.is_empty()
    }
}

/// Server-side batch lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchState {
    Queued,
    InProgress,
    Completed,
    Failed,
    #[serde(other)]
    Unknown,
}

impl BatchState {
    pub fn as_str(self) -> &'static str {
        match self {
            BatchState::Queued => "queued",
            BatchState::InProgress => "in_progress",
            BatchState::Completed => "completed",
            BatchState::Failed => "failed",
            BatchState::Unknown => "unknown",
        }
    }
}

/// Assignment entry as reported back by a batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VlanAssignment {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub vlan: serde_json::Value,
    pub state: VlanAssignmentState,
}

/// VLAN assignment batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VlanAssignmentBatch {
    pub id: String,
    pub state: BatchState,
    #[serde(default)]
    pub error_messages: Vec<String>,
    #[serde(default)]
    pub vlan_assignments: Vec<VlanAssignment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Metal gateway
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gateway {
    pub id: String,
    pub state: String,
}

/// Interconnection virtual circuit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VirtualCircuit {
    pub id: String,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vnid: Option<u32>,
}

/// Reserved IP block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IpReservation {
    pub id: String,
    pub state: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cidr: Option<u8>,
}

/// Device reference embedded in a spot market request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceRef {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
}

/// Spot market request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpotMarketRequest {
    pub id: String,
    #[serde(default)]
    pub devices: Vec<DeviceRef>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_port_deserializes_with_embedded_vlans() {
        let port: Port = serde_json::from_value(json!({
            "id": "p-1",
            "name": "bond0",
            "type": "NetworkBondPort",
            "network_type": "layer2-bonded",
            "data": { "bonded": true, "mac": "aa:bb:cc:dd:ee:ff" },
            "native_virtual_network": { "id": "v-1", "vxlan": 1001 },
            "virtual_networks": [
                { "id": "v-1", "vxlan": 1001 },
                { "id": "v-2", "vxlan": 1002 }
            ],
            "disbond_operation_supported": true,
            "href": "/metal/v1/ports/p-1"
        }))
        .unwrap();

        assert!(port.is_bond_port());
        assert!(port.is_bonded());
        assert!(port.is_layer2());
        assert_eq!(port.native_vlan_id(), Some("v-1"));
        assert_eq!(port.native_vxlan(), Some(1001));
        assert_eq!(
            port.attached_vlan_ids(),
            BTreeSet::from(["v-1".to_string(), "v-2".to_string()])
        );
        assert_eq!(port.attached_vxlans(), BTreeSet::from([1001, 1002]));
    }

    #[test]
    fn test_port_without_network_type_is_not_layer2() {
        let port: Port = serde_json::from_value(json!({
            "id": "p-2",
            "name": "eth1",
            "type": "NetworkPort",
            "data": { "bonded": false }
        }))
        .unwrap();

        assert_eq!(port.network_type, None);
        assert!(!port.is_layer2());
        assert!(port.virtual_networks.is_empty());
    }

    #[test]
    fn test_unknown_enum_values_do_not_fail() {
        let port: Port = serde_json::from_value(json!({
            "id": "p-3",
            "name": "mgmt0",
            "type": "NetworkManagementPort",
            "network_type": "layer2-fancy"
        }))
        .unwrap();

        assert_eq!(port.port_type, PortType::Unknown);
        assert_eq!(port.network_type, Some(NetworkType::Unknown));
    }

    #[test]
    fn test_batch_request_omits_absent_native_flag() {
        let request = VlanAssignmentBatchCreateRequest {
            vlan_assignments: vec![
                VlanAssignmentCreateRequest {
                    vlan: "v-1".to_string(),
                    state: VlanAssignmentState::Unassigned,
                    native: None,
                },
                VlanAssignmentCreateRequest {
                    vlan: "1002".to_string(),
                    state: VlanAssignmentState::Assigned,
                    native: Some(false),
                },
            ],
        };

        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "vlan_assignments": [
                    { "vlan": "v-1", "state": "unassigned" },
                    { "vlan": "1002", "state": "assigned", "native": false }
                ]
            })
        );
    }

    #[test]
    fn test_batch_state_parses_server_labels() {
        let batch: VlanAssignmentBatch = serde_json::from_value(json!({
            "id": "b-1",
            "state": "in_progress",
            "error_messages": []
        }))
        .unwrap();
        assert_eq!(batch.state, BatchState::InProgress);
        assert_eq!(batch.state.as_str(), "in_progress");
    }
}
