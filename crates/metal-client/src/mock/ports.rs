//! Port operations for MockMetalClient
//!
//! Simulates how the API moves a port between bonding and network modes and
//! how VLAN assignment batches change its attachments.

use super::{error_for_status, BatchPlan, BatchRecord, MockMetalClient};
use crate::error::MetalError;
use crate::models::*;
use std::collections::VecDeque;

/// Apply `change` to a stored port and return the updated copy
fn update_port<F>(client: &MockMetalClient, id: &str, change: F) -> Result<Port, MetalError>
where
    F: FnOnce(&mut Port) -> Result<(), MetalError>,
{
    let mut ports = client.ports.lock().unwrap();
    let port = ports
        .get_mut(id)
        .ok_or_else(|| MetalError::NotFound(format!("Port {} not found", id)))?;
    change(port)?;
    Ok(port.clone())
}

fn matches_reference(vlan: &VirtualNetwork, reference: &str) -> bool {
    vlan.id == reference || vlan.vxlan.is_some_and(|vxlan| vxlan.to_string() == reference)
}

/// Look a VLAN up by UUID or VXLAN number, inventing one for unknown references
fn resolve_vlan(client: &MockMetalClient, reference: &str) -> VirtualNetwork {
    client
        .vlans
        .lock()
        .unwrap()
        .values()
        .find(|vlan| matches_reference(vlan, reference))
        .cloned()
        .unwrap_or_else(|| VirtualNetwork {
            id: reference.to_string(),
            vxlan: reference.parse().ok(),
            description: None,
            href: None,
        })
}

pub fn get_port(client: &MockMetalClient, id: &str) -> Result<Port, MetalError> {
    client
        .port(id)
        .ok_or_else(|| MetalError::NotFound(format!("Port {} not found", id)))
}

pub fn bond_port(client: &MockMetalClient, id: &str) -> Result<Port, MetalError> {
    update_port(client, id, |port| {
        port.data.bonded = true;
        port.network_type = match port.network_type {
            Some(NetworkType::Layer2Individual) => Some(NetworkType::Layer2Bonded),
            Some(NetworkType::Hybrid) => Some(NetworkType::HybridBonded),
            other => other,
        };
        Ok(())
    })
}

pub fn disbond_port(client: &MockMetalClient, id: &str) -> Result<Port, MetalError> {
    update_port(client, id, |port| {
        if !port.disbond_operation_supported {
            return Err(error_for_status(422, "Port does not support disbonding"));
        }
        port.data.bonded = false;
        port.network_type = match port.network_type {
            Some(NetworkType::Layer2Bonded) => Some(NetworkType::Layer2Individual),
            Some(NetworkType::Layer3 | NetworkType::HybridBonded) => Some(NetworkType::Hybrid),
            other => other,
        };
        Ok(())
    })
}

pub fn convert_to_layer2(client: &MockMetalClient, id: &str) -> Result<Port, MetalError> {
    update_port(client, id, |port| {
        if !port.is_bond_port() {
            return Err(error_for_status(422, "Only bond ports can be converted to layer 2"));
        }
        port.network_type = Some(if port.data.bonded {
            NetworkType::Layer2Bonded
        } else {
            NetworkType::Layer2Individual
        });
        Ok(())
    })
}

/// Layer3 conversion also re-bonds the port
pub fn convert_to_layer3(client: &MockMetalClient, id: &str) -> Result<Port, MetalError> {
    update_port(client, id, |port| {
        if !port.is_bond_port() {
            return Err(error_for_status(422, "Only bond ports can be converted to layer 3"));
        }
        port.network_type = Some(NetworkType::Layer3);
        port.data.bonded = true;
        Ok(())
    })
}

pub fn assign_native_vlan(client: &MockMetalClient, id: &str, vnid: &str) -> Result<Port, MetalError> {
    update_port(client, id, |port| {
        let vlan = port
            .virtual_networks
            .iter()
            .find(|vlan| matches_reference(vlan, vnid))
            .cloned()
            .ok_or_else(|| {
                error_for_status(422, &format!("VLAN {} is not assigned to port {}", vnid, port.id))
            })?;
        port.native_virtual_network = Some(vlan);
        Ok(())
    })
}

pub fn unassign_native_vlan(client: &MockMetalClient, id: &str) -> Result<Port, MetalError> {
    update_port(client, id, |port| {
        port.native_virtual_network = None;
        Ok(())
    })
}

pub fn get_device(client: &MockMetalClient, id: &str) -> Result<Device, MetalError> {
    let mut device = client
        .devices
        .lock()
        .unwrap()
        .get(id)
        .cloned()
        .ok_or_else(|| MetalError::NotFound(format!("Device {} not found", id)))?;
    let ports = client.ports.lock().unwrap();
    for port in &mut device.network_ports {
        if let Some(current) = ports.get(&port.id) {
            *port = current.clone();
        }
    }
    Ok(device)
}

pub fn create_batch(
    client: &MockMetalClient,
    port_id: &str,
    request: &VlanAssignmentBatchCreateRequest,
) -> Result<VlanAssignmentBatch, MetalError> {
    get_port(client, port_id)?;
    if request.is_empty() {
        return Err(error_for_status(422, "vlan_assignments must not be empty"));
    }

    let plan = client.batch_plans.lock().unwrap().pop_front().unwrap_or_else(|| BatchPlan {
        states: vec![BatchState::Completed],
        error_messages: Vec::new(),
    });
    let mut upcoming: VecDeque<BatchState> = plan.states.into();
    let first = upcoming.pop_front().unwrap_or(BatchState::Completed);

    let id = client.next_id("batch");
    let mut record = BatchRecord {
        port_id: port_id.to_string(),
        batch: VlanAssignmentBatch {
            id: id.clone(),
            state: BatchState::Queued,
            error_messages: Vec::new(),
            vlan_assignments: Vec::new(),
            created_at: Some(chrono::Utc::now()),
        },
        request: request.clone(),
        upcoming,
        failure_messages: plan.error_messages,
        applied: false,
    };
    transition(client, &mut record, first)?;

    let batch = record.batch.clone();
    client.batches.lock().unwrap().insert(id, record);
    Ok(batch)
}

pub fn get_batch(client: &MockMetalClient, port_id: &str, batch_id: &str) -> Result<VlanAssignmentBatch, MetalError> {
    let mut record = client
        .batches
        .lock()
        .unwrap()
        .get(batch_id)
        .filter(|record| record.port_id == port_id)
        .cloned()
        .ok_or_else(|| MetalError::NotFound(format!("Batch {} not found on port {}", batch_id, port_id)))?;

    if let Some(state) = record.upcoming.pop_front() {
        transition(client, &mut record, state)?;
    }

    let batch = record.batch.clone();
    client.batches.lock().unwrap().insert(batch_id.to_string(), record);
    Ok(batch)
}

fn transition(client: &MockMetalClient, record: &mut BatchRecord, state: BatchState) -> Result<(), MetalError> {
    record.batch.state = state;
    match state {
        BatchState::Completed if !record.applied => {
            apply_batch(client, &record.port_id, &record.request)?;
            record.applied = true;
        }
        BatchState::Failed => {
            record.batch.error_messages = record.failure_messages.clone();
        }
        _ => {}
    }
    Ok(())
}

fn apply_batch(
    client: &MockMetalClient,
    port_id: &str,
    request: &VlanAssignmentBatchCreateRequest,
) -> Result<(), MetalError> {
    let resolved: Vec<(VirtualNetwork, &VlanAssignmentCreateRequest)> = request
        .vlan_assignments
        .iter()
        .map(|entry| (resolve_vlan(client, &entry.vlan), entry))
        .collect();

    update_port(client, port_id, |port| {
        for (vlan, entry) in resolved {
            match entry.state {
                VlanAssignmentState::Unassigned => {
                    let detached = |attached: &VirtualNetwork| {
                        attached.id == vlan.id || matches_reference(attached, &entry.vlan)
                    };
                    port.virtual_networks.retain(|attached| !detached(attached));
                    if port.native_virtual_network.as_ref().is_some_and(detached) {
                        port.native_virtual_network = None;
                    }
                }
                VlanAssignmentState::Assigned => {
                    let already = port
                        .virtual_networks
                        .iter()
                        .any(|attached| attached.id == vlan.id || matches_reference(attached, &entry.vlan));
                    if !already {
                        port.virtual_networks.push(vlan.clone());
                    }
                    if entry.native == Some(true) {
                        port.native_virtual_network = Some(vlan);
                    }
                }
            }
        }
        Ok(())
    })
    .map(|_| ())
}
