//! Waiters for asynchronously provisioned Metal resources
//!
//! Each function is a thin parameterisation of [`StateWaiter`]: it maps one
//! resource's status field onto the waiter's pending/target sets and fixes
//! the polling cadence the API tolerates for that resource.

use crate::error::MetalError;
use crate::metal_trait::MetalClientTrait;
use crate::models::*;
use state_waiter::{Observed, StateWaiter, WaitError};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Batch states
pub const BATCH_PENDING: [&str; 2] = ["queued", "in_progress"];
pub const BATCH_TARGET: [&str; 1] = ["completed"];

/// Cadence for polling VLAN assignment batches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchPolling {
    /// Sleep before the first poll
    pub initial_delay: Duration,
    /// Floor applied to every interval
    pub min_poll_interval: Duration,
    /// Fixed interval; `None` backs off exponentially
    pub poll_interval: Option<Duration>,
}

impl Default for BatchPolling {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(5),
            min_poll_interval: Duration::from_secs(5),
            poll_interval: None,
        }
    }
}

/// Treat a 404 as "not there (yet)" rather than an error
fn found<T>(result: Result<T, MetalError>) -> Result<Option<T>, MetalError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(MetalError::NotFound(_)) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Wait for a VLAN assignment batch to complete
///
/// A `failed` batch ends the wait with `WaitError::UnexpectedState`
/// carrying the batch's error messages.
pub async fn wait_for_vlan_batch<C>(
    client: &C,
    port_id: &str,
    batch_id: &str,
    polling: BatchPolling,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Result<VlanAssignmentBatch, WaitError<MetalError>>
where
    C: MetalClientTrait + ?Sized,
{
    let mut waiter = StateWaiter::new(format!("vlan assignment batch {}", batch_id))
        .pending(BATCH_PENDING)
        .target(BATCH_TARGET)
        .timeout(timeout)
        .initial_delay(polling.initial_delay)
        .min_poll_interval(polling.min_poll_interval)
        .cancel_on(cancel.clone());
    if let Some(interval) = polling.poll_interval {
        waiter = waiter.poll_interval(interval);
    }

    waiter
        .wait(|| async move {
            let batch = found(client.get_vlan_assignment_batch(port_id, batch_id).await)?;
            Ok(batch.map(|batch| {
                let status = batch.state.as_str();
                let messages = batch.error_messages.clone();
                Observed::new(batch, status).with_messages(messages)
            }))
        })
        .await
}

fn gateway_waiter(id: &str, timeout: Duration, cancel: &CancellationToken) -> StateWaiter {
    StateWaiter::new(format!("metal gateway {}", id))
        .timeout(timeout)
        .initial_delay(Duration::from_secs(10))
        .min_poll_interval(Duration::from_secs(5))
        .cancel_on(cancel.clone())
}

async fn refresh_gateway<C>(client: &C, id: &str) -> Result<Option<Observed<Gateway>>, MetalError>
where
    C: MetalClientTrait + ?Sized,
{
    Ok(found(client.get_gateway(id).await)?.map(|gw| {
        let state = gw.state.clone();
        Observed::new(gw, state)
    }))
}

/// Wait for a gateway to become `ready`
pub async fn wait_for_gateway_state<C>(
    client: &C,
    id: &str,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Result<Gateway, WaitError<MetalError>>
where
    C: MetalClientTrait + ?Sized,
{
    gateway_waiter(id, timeout, cancel)
        .pending(["provisioning"])
        .target(["ready"])
        .wait(|| refresh_gateway(client, id))
        .await
}

/// Wait for a gateway to disappear after deletion
pub async fn wait_for_gateway_deletion<C>(
    client: &C,
    id: &str,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Result<(), WaitError<MetalError>>
where
    C: MetalClientTrait + ?Sized,
{
    gateway_waiter(id, timeout, cancel)
        .pending(["deleting"])
        .wait_until_gone(|| refresh_gateway(client, id))
        .await
}

fn virtual_circuit_waiter(id: &str, timeout: Duration, cancel: &CancellationToken) -> StateWaiter {
    StateWaiter::new(format!("virtual circuit {}", id))
        .timeout(timeout)
        .initial_delay(Duration::from_secs(10))
        .min_poll_interval(Duration::from_secs(5))
        .cancel_on(cancel.clone())
}

async fn refresh_virtual_circuit<C>(client: &C, id: &str) -> Result<Option<Observed<VirtualCircuit>>, MetalError>
where
    C: MetalClientTrait + ?Sized,
{
    Ok(found(client.get_virtual_circuit(id).await)?.map(|vc| {
        let status = vc.status.clone();
        Observed::new(vc, status)
    }))
}

/// Wait for a virtual circuit to become `active`
pub async fn wait_for_virtual_circuit_status<C>(
    client: &C,
    id: &str,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Result<VirtualCircuit, WaitError<MetalError>>
where
    C: MetalClientTrait + ?Sized,
{
    virtual_circuit_waiter(id, timeout, cancel)
        .pending(["activating"])
        .target(["active"])
        .wait(|| refresh_virtual_circuit(client, id))
        .await
}

/// Wait for a virtual circuit to disappear after deletion
pub async fn wait_for_virtual_circuit_deletion<C>(
    client: &C,
    id: &str,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Result<(), WaitError<MetalError>>
where
    C: MetalClientTrait + ?Sized,
{
    virtual_circuit_waiter(id, timeout, cancel)
        .pending(["deleting"])
        .wait_until_gone(|| refresh_virtual_circuit(client, id))
        .await
}

/// Wait for an IP reservation to be `created`
///
/// `also_accept` adds a second acceptable state (e.g. `denied`), for
/// callers that only need the request to be settled.
pub async fn wait_for_ip_reservation_state<C>(
    client: &C,
    id: &str,
    also_accept: Option<&str>,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Result<IpReservation, WaitError<MetalError>>
where
    C: MetalClientTrait + ?Sized,
{
    let mut target = vec!["created".to_string()];
    if let Some(extra) = also_accept.filter(|extra| *extra != "created") {
        target.push(extra.to_string());
    }

    StateWaiter::new(format!("IP reservation {}", id))
        .pending(["pending"])
        .target(target)
        .timeout(timeout)
        .min_poll_interval(Duration::from_secs(15))
        .cancel_on(cancel.clone())
        .wait(|| async move {
            Ok(found(client.get_ip_reservation(id).await)?.map(|ip| {
                let state = ip.state.clone();
                Observed::new(ip, state)
            }))
        })
        .await
}

/// Wait until every device of a spot market request is `active`
///
/// The request reports `done` once its device list is non-empty and all of
/// them are active, `not_done` otherwise. A freshly created request can be
/// invisible for a while, so up to 600 consecutive 404s are tolerated.
pub async fn wait_for_spot_market_devices<C>(
    client: &C,
    id: &str,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Result<SpotMarketRequest, WaitError<MetalError>>
where
    C: MetalClientTrait + ?Sized,
{
    StateWaiter::new(format!("spot market request {}", id))
        .pending(["not_done"])
        .target(["done"])
        .timeout(timeout)
        .initial_delay(Duration::from_secs(3))
        .min_poll_interval(Duration::from_secs(5))
        .not_found_tolerance(600)
        .cancel_on(cancel.clone())
        .wait(|| async move {
            let Some(request) = found(client.get_spot_market_request(id).await)? else {
                return Ok(None);
            };
            let mut done = !request.devices.is_empty();
            for device in &request.devices {
                if client.get_device(&device.id).await?.state != "active" {
                    done = false;
                    break;
                }
            }
            let status = if done { "done" } else { "not_done" };
            Ok(Some(Observed::new(request, status)))
        })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::fixtures;
    use crate::mock::{MockCall, MockMetalClient};

    fn gateway(state: &str) -> Option<Gateway> {
        Some(Gateway {
            id: "gw-1".to_string(),
            state: state.to_string(),
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_batch_wait_completes_after_progress() {
        let client = MockMetalClient::new("http://mock");
        client.add_port(fixtures::bond_port("p-1", NetworkType::Layer2Bonded, true));
        client.script_next_batch(
            vec![BatchState::Queued, BatchState::InProgress, BatchState::Completed],
            Vec::new(),
        );
        let request = VlanAssignmentBatchCreateRequest {
            vlan_assignments: vec![VlanAssignmentCreateRequest {
                vlan: "1001".to_string(),
                state: VlanAssignmentState::Assigned,
                native: Some(false),
            }],
        };
        let batch = client.create_vlan_assignment_batch("p-1", &request).await.unwrap();
        assert_eq!(batch.state, BatchState::Queued);

        let done = wait_for_vlan_batch(
            &client,
            "p-1",
            &batch.id,
            BatchPolling::default(),
            Duration::from_secs(60),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(done.state, BatchState::Completed);
        assert_eq!(client.port("p-1").unwrap().attached_vxlans().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_batch_carries_error_messages() {
        let client = MockMetalClient::new("http://mock");
        client.add_port(fixtures::bond_port("p-1", NetworkType::Layer2Bonded, true));
        client.script_next_batch(
            vec![BatchState::Queued, BatchState::Failed],
            vec!["vlan 1001 not in metro".to_string(), "quota exceeded".to_string()],
        );
        let request = VlanAssignmentBatchCreateRequest {
            vlan_assignments: vec![VlanAssignmentCreateRequest {
                vlan: "1001".to_string(),
                state: VlanAssignmentState::Assigned,
                native: None,
            }],
        };
        let batch = client.create_vlan_assignment_batch("p-1", &request).await.unwrap();

        let err = wait_for_vlan_batch(
            &client,
            "p-1",
            &batch.id,
            BatchPolling::default(),
            Duration::from_secs(60),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

        match err {
            WaitError::UnexpectedState { status, messages, .. } => {
                assert_eq!(status, "failed");
                assert_eq!(messages.len(), 2);
            }
            other => panic!("expected UnexpectedState, got {other:?}"),
        }
        assert!(client.port("p-1").unwrap().virtual_networks.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_gateway_ready() {
        let client = MockMetalClient::new("http://mock");
        client.script_gateway("gw-1", vec![gateway("provisioning"), gateway("provisioning"), gateway("ready")]);

        let gw = wait_for_gateway_state(&client, "gw-1", Duration::from_secs(300), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(gw.state, "ready");
    }

    #[tokio::test(start_paused = true)]
    async fn test_gateway_deletion_treats_404_as_done() {
        let client = MockMetalClient::new("http://mock");
        client.script_gateway("gw-1", vec![gateway("deleting"), None]);

        wait_for_gateway_deletion(&client, "gw-1", Duration::from_secs(300), &CancellationToken::new())
            .await
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_virtual_circuit_unexpected_status() {
        let client = MockMetalClient::new("http://mock");
        client.script_virtual_circuit(
            "vc-1",
            vec![Some(VirtualCircuit {
                id: "vc-1".to_string(),
                status: "activation_failed".to_string(),
                vnid: None,
            })],
        );

        let err = wait_for_virtual_circuit_status(&client, "vc-1", Duration::from_secs(300), &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.last_status(), Some("activation_failed"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ip_reservation_accepts_extra_state() {
        let client = MockMetalClient::new("http://mock");
        let reservation = |state: &str| {
            Some(IpReservation {
                id: "ip-1".to_string(),
                state: state.to_string(),
                address: None,
                cidr: Some(29),
            })
        };
        client.script_ip_reservation("ip-1", vec![reservation("pending"), reservation("denied")]);

        let ip = wait_for_ip_reservation_state(
            &client,
            "ip-1",
            Some("denied"),
            Duration::from_secs(600),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
        assert_eq!(ip.state, "denied");
    }

    #[tokio::test(start_paused = true)]
    async fn test_spot_market_waits_for_all_devices() {
        let client = MockMetalClient::new("http://mock");
        let request = SpotMarketRequest {
            id: "smr-1".to_string(),
            devices: vec![DeviceRef {
                id: "d-1".to_string(),
                href: None,
            }],
        };
        client.script_spot_market_request("smr-1", vec![None, Some(request.clone())]);
        let mut device = fixtures::device("d-1", Vec::new());
        device.state = "active".to_string();
        client.add_device(device);

        let done = wait_for_spot_market_devices(&client, "smr-1", Duration::from_secs(600), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(done, request);
        assert!(client.calls().contains(&MockCall::GetDevice { id: "d-1".to_string() }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_errors_are_not_retried() {
        let client = MockMetalClient::new("http://mock");
        client.script_gateway("gw-1", vec![gateway("provisioning")]);
        client.fail(crate::mock::MockOperation::GetGateway, 500, "boom");

        let err = wait_for_gateway_state(&client, "gw-1", Duration::from_secs(300), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, WaitError::Refresh { source: MetalError::Api(_), .. }));
        assert_eq!(client.calls().len(), 1);
    }
}
