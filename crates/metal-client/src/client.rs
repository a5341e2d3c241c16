//! Metal API client
//!
//! Implements the subset of the Metal v1 REST API the port controller needs:
//! ports and their VLAN assignment batches, devices, and the read endpoints
//! of the other provisioned resources the waiters track.

use crate::common::HttpClient;
use crate::error::MetalError;
use crate::metal_trait::MetalClientTrait;
use crate::models::*;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

/// Default API endpoint
pub const DEFAULT_BASE_URL: &str = "https://api.equinix.com/metal/v1";

/// Port includes needed to see VLAN associations as objects
const PORT_INCLUDES: &str = "native_virtual_network,virtual_networks";
const DEVICE_INCLUDES: &str = "network_ports.native_virtual_network,network_ports.virtual_networks";

/// Metal API client
#[derive(Debug, Clone)]
pub struct MetalClient {
    http: HttpClient,
}

impl MetalClient {
    /// Create a new Metal client
    ///
    /// # Arguments
    /// * `base_url` - API base URL (e.g., "https://api.equinix.com/metal/v1")
    /// * `token` - API token sent as `X-Auth-Token`
    pub fn new(base_url: String, token: String) -> Result<Self, MetalError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("metal-port-controller/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(MetalError::Http)?;

        Ok(Self {
            http: HttpClient::new(client, base_url, token),
        })
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        self.http.base_url()
    }

    fn port_path(id: &str) -> String {
        format!("/ports/{}", id)
    }
}

#[async_trait::async_trait]
impl MetalClientTrait for MetalClient {
    fn base_url(&self) -> &str {
        self.http.base_url()
    }

    async fn get_port(&self, id: &str) -> Result<Port, MetalError> {
        self.http
            .get(&format!("{}?include={}", Self::port_path(id), PORT_INCLUDES))
            .await
    }

    async fn bond_port(&self, id: &str, bulk_enable: bool) -> Result<Port, MetalError> {
        debug!("Bonding port {} (bulk_enable={})", id, bulk_enable);
        self.http
            .post(&format!("{}/bond?bulk_enable={}", Self::port_path(id), bulk_enable), None)
            .await
    }

    async fn disbond_port(&self, id: &str, bulk_enable: bool) -> Result<Port, MetalError> {
        debug!("Disbonding port {} (bulk_enable={})", id, bulk_enable);
        self.http
            .post(&format!("{}/disbond?bulk_enable={}", Self::port_path(id), bulk_enable), None)
            .await
    }

    async fn convert_to_layer2(&self, id: &str) -> Result<Port, MetalError> {
        self.http
            .post(
                &format!("{}/convert/layer-2?include={}", Self::port_path(id), PORT_INCLUDES),
                None,
            )
            .await
    }

    async fn convert_to_layer3(&self, id: &str, request_ips: &[AddressRequest]) -> Result<Port, MetalError> {
        let body = json!({ "request_ips": request_ips });
        self.http
            .post(
                &format!("{}/convert/layer-3?include={}", Self::port_path(id), PORT_INCLUDES),
                Some(&body),
            )
            .await
    }

    async fn assign_native_vlan(&self, id: &str, vnid: &str) -> Result<Port, MetalError> {
        let body = json!({ "vnid": vnid });
        self.http
            .post(
                &format!("{}/native-vlan?include={}", Self::port_path(id), PORT_INCLUDES),
                Some(&body),
            )
            .await
    }

    async fn unassign_native_vlan(&self, id: &str) -> Result<Port, MetalError> {
        self.http
            .delete(&format!("{}/native-vlan?include={}", Self::port_path(id), PORT_INCLUDES))
            .await
    }

    async fn create_vlan_assignment_batch(
        &self,
        port_id: &str,
        request: &VlanAssignmentBatchCreateRequest,
    ) -> Result<VlanAssignmentBatch, MetalError> {
        if request.is_empty() {
            return Err(MetalError::InvalidRequest(format!(
                "refusing to create an empty VLAN assignment batch for port {}",
                port_id
            )));
        }
        let body = serde_json::to_value(request)?;
        self.http
            .post(
                &format!("{}/vlan-assignments/batches", Self::port_path(port_id)),
                Some(&body),
            )
            .await
    }

    async fn get_vlan_assignment_batch(&self, port_id: &str, batch_id: &str) -> Result<VlanAssignmentBatch, MetalError> {
        self.http
            .get(&format!(
                "{}/vlan-assignments/batches/{}",
                Self::port_path(port_id),
                batch_id
            ))
            .await
    }

    async fn get_device(&self, id: &str) -> Result<Device, MetalError> {
        self.http
            .get(&format!("/devices/{}?include={}", id, DEVICE_INCLUDES))
            .await
    }

    async fn get_gateway(&self, id: &str) -> Result<Gateway, MetalError> {
        self.http.get(&format!("/metal-gateways/{}", id)).await
    }

    async fn get_virtual_circuit(&self, id: &str) -> Result<VirtualCircuit, MetalError> {
        self.http.get(&format!("/virtual-circuits/{}", id)).await
    }

    async fn get_ip_reservation(&self, id: &str) -> Result<IpReservation, MetalError> {
        self.http.get(&format!("/ips/{}", id)).await
    }

    async fn get_spot_market_request(&self, id: &str) -> Result<SpotMarketRequest, MetalError> {
        self.http
            .get(&format!("/spot-market-requests/{}?include=devices", id))
            .await
    }
}
