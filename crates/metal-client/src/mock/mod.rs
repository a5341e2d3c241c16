//! Mock MetalClient for unit testing
//!
//! This module provides an in-memory implementation of `MetalClientTrait`
//! that simulates the remote side closely enough to drive the port
//! reconciler end to end without a network.
//!
//! The mock is organized into domain-specific modules:
//! - `ports.rs` - port mutations, VLAN assignment batches, devices
//! - `resources.rs` - scripted gateways, virtual circuits, IP reservations, spot market requests
//! - `fixtures.rs` - builders for ports, VLANs and devices
//!
//! Every trait call is recorded in a call log (see [`MockCall`]), and any
//! operation can be made to fail with a given HTTP status (see
//! [`MockMetalClient::fail`]).

pub mod fixtures;
mod ports;
mod resources;

use crate::error::MetalError;
use crate::metal_trait::MetalClientTrait;
use crate::models::*;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

pub use resources::Script;

/// Operations that can be failed on purpose
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockOperation {
    GetPort,
    BondPort,
    DisbondPort,
    ConvertToLayer2,
    ConvertToLayer3,
    AssignNativeVlan,
    UnassignNativeVlan,
    CreateBatch,
    GetBatch,
    GetDevice,
    GetGateway,
    GetVirtualCircuit,
    GetIpReservation,
    GetSpotMarketRequest,
}

/// One recorded trait call
#[derive(Debug, Clone, PartialEq)]
pub enum MockCall {
    GetPort { id: String },
    BondPort { id: String, bulk_enable: bool },
    DisbondPort { id: String, bulk_enable: bool },
    ConvertToLayer2 { id: String },
    ConvertToLayer3 { id: String, request_ips: Vec<AddressRequest> },
    AssignNativeVlan { id: String, vnid: String },
    UnassignNativeVlan { id: String },
    CreateBatch { port_id: String, request: VlanAssignmentBatchCreateRequest },
    GetBatch { port_id: String, batch_id: String },
    GetDevice { id: String },
    GetGateway { id: String },
    GetVirtualCircuit { id: String },
    GetIpReservation { id: String },
    GetSpotMarketRequest { id: String },
}

impl MockCall {
    /// True for calls that change remote state
    pub fn is_mutating(&self) -> bool {
        matches!(
            self,
            MockCall::BondPort { .. }
                | MockCall::DisbondPort { .. }
                | MockCall::ConvertToLayer2 { .. }
                | MockCall::ConvertToLayer3 { .. }
                | MockCall::AssignNativeVlan { .. }
                | MockCall::UnassignNativeVlan { .. }
                | MockCall::CreateBatch { .. }
        )
    }
}

/// Server-side record of a batch
#[derive(Debug, Clone)]
pub(crate) struct BatchRecord {
    pub(crate) port_id: String,
    pub(crate) batch: VlanAssignmentBatch,
    pub(crate) request: VlanAssignmentBatchCreateRequest,
    /// States still to be reported by subsequent polls
    pub(crate) upcoming: VecDeque<BatchState>,
    pub(crate) failure_messages: Vec<String>,
    pub(crate) applied: bool,
}

/// How the next created batch should progress
#[derive(Debug, Clone, Default)]
pub(crate) struct BatchPlan {
    pub(crate) states: Vec<BatchState>,
    pub(crate) error_messages: Vec<String>,
}

/// Mock MetalClient for testing
///
/// This mock stores resources in memory and can be configured to return
/// specific responses for testing different scenarios.
#[derive(Debug, Clone)]
pub struct MockMetalClient {
    pub(crate) base_url: String,
    // In-memory storage for resources
    pub(crate) ports: Arc<Mutex<HashMap<String, Port>>>,
    pub(crate) vlans: Arc<Mutex<HashMap<String, VirtualNetwork>>>,
    pub(crate) devices: Arc<Mutex<HashMap<String, Device>>>,
    pub(crate) batches: Arc<Mutex<HashMap<String, BatchRecord>>>,
    pub(crate) batch_plans: Arc<Mutex<VecDeque<BatchPlan>>>,
    pub(crate) gateways: Arc<Mutex<HashMap<String, Script<Gateway>>>>,
    pub(crate) virtual_circuits: Arc<Mutex<HashMap<String, Script<VirtualCircuit>>>>,
    pub(crate) ip_reservations: Arc<Mutex<HashMap<String, Script<IpReservation>>>>,
    pub(crate) spot_market_requests: Arc<Mutex<HashMap<String, Script<SpotMarketRequest>>>>,
    // Call log and failure injection
    pub(crate) calls: Arc<Mutex<Vec<MockCall>>>,
    pub(crate) failures: Arc<Mutex<HashMap<MockOperation, (u16, String)>>>,
    // Counter for generating IDs
    pub(crate) next_id: Arc<Mutex<u64>>,
}

impl MockMetalClient {
    /// Create a new mock client
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ports: Arc::new(Mutex::new(HashMap::new())),
            vlans: Arc::new(Mutex::new(HashMap::new())),
            devices: Arc::new(Mutex::new(HashMap::new())),
            batches: Arc::new(Mutex::new(HashMap::new())),
            batch_plans: Arc::new(Mutex::new(VecDeque::new())),
            gateways: Arc::new(Mutex::new(HashMap::new())),
            virtual_circuits: Arc::new(Mutex::new(HashMap::new())),
            ip_reservations: Arc::new(Mutex::new(HashMap::new())),
            spot_market_requests: Arc::new(Mutex::new(HashMap::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
            failures: Arc::new(Mutex::new(HashMap::new())),
            next_id: Arc::new(Mutex::new(1)),
        }
    }

    /// Add or replace a port
    pub fn add_port(&self, port: Port) {
        self.ports.lock().unwrap().insert(port.id.clone(), port);
    }

    /// Current server-side view of a port
    pub fn port(&self, id: &str) -> Option<Port> {
        self.ports.lock().unwrap().get(id).cloned()
    }

    /// Register a VLAN so batches can address it by UUID or VXLAN number
    pub fn add_vlan(&self, id: impl Into<String>, vxlan: u32) {
        let id = id.into();
        self.vlans.lock().unwrap().insert(
            id.clone(),
            VirtualNetwork {
                id,
                vxlan: Some(vxlan),
                description: None,
                href: None,
            },
        );
    }

    /// Add a device; its `network_ports` are also registered as ports
    pub fn add_device(&self, device: Device) {
        for port in &device.network_ports {
            self.add_port(port.clone());
        }
        self.devices.lock().unwrap().insert(device.id.clone(), device);
    }

    /// Script the states the next created batch reports, one per poll
    ///
    /// The first state is returned by the create call itself. Once the list
    /// is exhausted the last state sticks. Unscripted batches complete
    /// immediately.
    pub fn script_next_batch(&self, states: Vec<BatchState>, error_messages: Vec<String>) {
        self.batch_plans.lock().unwrap().push_back(BatchPlan {
            states,
            error_messages,
        });
    }

    /// Script the snapshots returned for a gateway, one per fetch (`None` is a 404)
    pub fn script_gateway(&self, id: impl Into<String>, steps: Vec<Option<Gateway>>) {
        self.gateways.lock().unwrap().insert(id.into(), Script::new(steps));
    }

    pub fn script_virtual_circuit(&self, id: impl Into<String>, steps: Vec<Option<VirtualCircuit>>) {
        self.virtual_circuits.lock().unwrap().insert(id.into(), Script::new(steps));
    }

    pub fn script_ip_reservation(&self, id: impl Into<String>, steps: Vec<Option<IpReservation>>) {
        self.ip_reservations.lock().unwrap().insert(id.into(), Script::new(steps));
    }

    pub fn script_spot_market_request(&self, id: impl Into<String>, steps: Vec<Option<SpotMarketRequest>>) {
        self.spot_market_requests.lock().unwrap().insert(id.into(), Script::new(steps));
    }

    /// Make every call of `operation` fail with the given HTTP status
    pub fn fail(&self, operation: MockOperation, status: u16, message: impl Into<String>) {
        self.failures.lock().unwrap().insert(operation, (status, message.into()));
    }

    pub fn clear_failures(&self) {
        self.failures.lock().unwrap().clear();
    }

    /// Every call made so far, in order
    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Calls that changed remote state
    pub fn mutating_calls(&self) -> Vec<MockCall> {
        self.calls().into_iter().filter(MockCall::is_mutating).collect()
    }

    /// Batch requests submitted so far, in order
    pub fn batch_requests(&self) -> Vec<VlanAssignmentBatchCreateRequest> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                MockCall::CreateBatch { request, .. } => Some(request),
                _ => None,
            })
            .collect()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    pub(crate) fn record(&self, call: MockCall) {
        self.calls.lock().unwrap().push(call);
    }

    /// Injected failure for `operation`, if any
    pub(crate) fn check(&self, operation: MockOperation) -> Result<(), MetalError> {
        match self.failures.lock().unwrap().get(&operation) {
            Some((status, message)) => Err(error_for_status(*status, message)),
            None => Ok(()),
        }
    }

    pub(crate) fn next_id(&self, prefix: &str) -> String {
        let mut next = self.next_id.lock().unwrap();
        let id = format!("{}-{}", prefix, *next);
        *next += 1;
        id
    }
}

/// Same status mapping as the HTTP client
pub(crate) fn error_for_status(status: u16, message: &str) -> MetalError {
    match status {
        401 => MetalError::Authentication(message.to_string()),
        403 => MetalError::Forbidden(message.to_string()),
        404 => MetalError::NotFound(message.to_string()),
        _ => MetalError::Api(format!("{} - {}", status, message)),
    }
}

#[async_trait::async_trait]
impl MetalClientTrait for MockMetalClient {
    fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get_port(&self, id: &str) -> Result<Port, MetalError> {
        self.record(MockCall::GetPort { id: id.to_string() });
        self.check(MockOperation::GetPort)?;
        ports::get_port(self, id)
    }

    async fn bond_port(&self, id: &str, bulk_enable: bool) -> Result<Port, MetalError> {
        self.record(MockCall::BondPort { id: id.to_string(), bulk_enable });
        self.check(MockOperation::BondPort)?;
        ports::bond_port(self, id)
    }

    async fn disbond_port(&self, id: &str, bulk_enable: bool) -> Result<Port, MetalError> {
        self.record(MockCall::DisbondPort { id: id.to_string(), bulk_enable });
        self.check(MockOperation::DisbondPort)?;
        ports::disbond_port(self, id)
    }

    async fn convert_to_layer2(&self, id: &str) -> Result<Port, MetalError> {
        self.record(MockCall::ConvertToLayer2 { id: id.to_string() });
        self.check(MockOperation::ConvertToLayer2)?;
        ports::convert_to_layer2(self, id)
    }

    async fn convert_to_layer3(&self, id: &str, request_ips: &[AddressRequest]) -> Result<Port, MetalError> {
        self.record(MockCall::ConvertToLayer3 {
            id: id.to_string(),
            request_ips: request_ips.to_vec(),
        });
        self.check(MockOperation::ConvertToLayer3)?;
        ports::convert_to_layer3(self, id)
    }

    async fn assign_native_vlan(&self, id: &str, vnid: &str) -> Result<Port, MetalError> {
        self.record(MockCall::AssignNativeVlan {
            id: id.to_string(),
            vnid: vnid.to_string(),
        });
        self.check(MockOperation::AssignNativeVlan)?;
        ports::assign_native_vlan(self, id, vnid)
    }

    async fn unassign_native_vlan(&self, id: &str) -> Result<Port, MetalError> {
        self.record(MockCall::UnassignNativeVlan { id: id.to_string() });
        self.check(MockOperation::UnassignNativeVlan)?;
        ports::unassign_native_vlan(self, id)
    }

    async fn create_vlan_assignment_batch(
        &self,
        port_id: &str,
        request: &VlanAssignmentBatchCreateRequest,
    ) -> Result<VlanAssignmentBatch, MetalError> {
        self.record(MockCall::CreateBatch {
            port_id: port_id.to_string(),
            request: request.clone(),
        });
        self.check(MockOperation::CreateBatch)?;
        ports::create_batch(self, port_id, request)
    }

    async fn get_vlan_assignment_batch(&self, port_id: &str, batch_id: &str) -> Result<VlanAssignmentBatch, MetalError> {
        self.record(MockCall::GetBatch {
            port_id: port_id.to_string(),
            batch_id: batch_id.to_string(),
        });
        self.check(MockOperation::GetBatch)?;
        ports::get_batch(self, port_id, batch_id)
    }

    async fn get_device(&self, id: &str) -> Result<Device, MetalError> {
        self.record(MockCall::GetDevice { id: id.to_string() });
        self.check(MockOperation::GetDevice)?;
        ports::get_device(self, id)
    }

    async fn get_gateway(&self, id: &str) -> Result<Gateway, MetalError> {
        self.record(MockCall::GetGateway { id: id.to_string() });
        self.check(MockOperation::GetGateway)?;
        resources::next(&self.gateways, "Gateway", id)
    }

    async fn get_virtual_circuit(&self, id: &str) -> Result<VirtualCircuit, MetalError> {
        self.record(MockCall::GetVirtualCircuit { id: id.to_string() });
        self.check(MockOperation::GetVirtualCircuit)?;
        resources::next(&self.virtual_circuits, "Virtual circuit", id)
    }

    async fn get_ip_reservation(&self, id: &str) -> Result<IpReservation, MetalError> {
        self.record(MockCall::GetIpReservation { id: id.to_string() });
        self.check(MockOperation::GetIpReservation)?;
        resources::next(&self.ip_reservations, "IP reservation", id)
    }

    async fn get_spot_market_request(&self, id: &str) -> Result<SpotMarketRequest, MetalError> {
        self.record(MockCall::GetSpotMarketRequest { id: id.to_string() });
        self.check(MockOperation::GetSpotMarketRequest)?;
        resources::next(&self.spot_market_requests, "Spot market request", id)
    }
}
