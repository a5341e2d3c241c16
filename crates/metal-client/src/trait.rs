//! MetalClient trait for mocking
//!
//! This trait abstracts the Metal API client so the port reconciler can be
//! driven against an in-memory fake in tests.

use crate::error::MetalError;
use crate::models::*;

/// Trait for Metal API client operations
///
/// All async methods must be `Send` to work with Tokio's work-stealing runtime.
#[async_trait::async_trait]
pub trait MetalClientTrait: Send + Sync {
    /// Get the base URL
    fn base_url(&self) -> &str;

    // Ports
    async fn get_port(&self, id: &str) -> Result<Port, MetalError>;
    async fn bond_port(&self, id: &str, bulk_enable: bool) -> Result<Port, MetalError>;
    async fn disbond_port(&self, id: &str, bulk_enable: bool) -> Result<Port, MetalError>;
    async fn convert_to_layer2(&self, id: &str) -> Result<Port, MetalError>;
    async fn convert_to_layer3(&self, id: &str, request_ips: &[AddressRequest]) -> Result<Port, MetalError>;
    async fn assign_native_vlan(&self, id: &str, vnid: &str) -> Result<Port, MetalError>;
    async fn unassign_native_vlan(&self, id: &str) -> Result<Port, MetalError>;

    // VLAN assignment batches
    async fn create_vlan_assignment_batch(
        &self,
        port_id: &str,
        request: &VlanAssignmentBatchCreateRequest,
    ) -> Result<VlanAssignmentBatch, MetalError>;
    async fn get_vlan_assignment_batch(&self, port_id: &str, batch_id: &str) -> Result<VlanAssignmentBatch, MetalError>;

    // Devices
    async fn get_device(&self, id: &str) -> Result<Device, MetalError>;

    // Other provisioned resources
    async fn get_gateway(&self, id: &str) -> Result<Gateway, MetalError>;
    async fn get_virtual_circuit(&self, id: &str) -> Result<VirtualCircuit, MetalError>;
    async fn get_ip_reservation(&self, id: &str) -> Result<IpReservation, MetalError>;
    async fn get_spot_market_request(&self, id: &str) -> Result<SpotMarketRequest, MetalError>;
}
