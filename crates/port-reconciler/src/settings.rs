//! Reconciler tunables

use metal_client::waiters::BatchPolling;
use metal_client::AddressRequest;
use std::time::Duration;

/// Knobs the controller passes down to the reconciler
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcilerSettings {
    /// How VLAN assignment batches are polled
    pub batch_polling: BatchPolling,
    /// Budget kept back from every wait
    pub safety_margin: Duration,
    /// Addresses requested when converting a port back to Layer3
    pub layer3_ip_requests: Vec<AddressRequest>,
}

impl Default for ReconcilerSettings {
    fn default() -> Self {
        Self {
            batch_polling: BatchPolling::default(),
            safety_margin: Duration::from_secs(30),
            layer3_ip_requests: AddressRequest::layer3_defaults(),
        }
    }
}
