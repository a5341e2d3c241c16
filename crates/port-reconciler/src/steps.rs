//! Pipeline steps
//!
//! Each step takes the port as last observed and returns the port as it is
//! after the step. A step only calls the API when the observed state differs
//! from the spec, so running the pipeline twice is a no-op the second time.

use crate::budget::OperationBudget;
use crate::error::{ReconcileError, Step};
use crate::settings::ReconcilerSettings;
use crate::spec::{attached_vlans, current_native, PortSpec};
use metal_client::waiters::wait_for_vlan_batch;
use metal_client::{
    MetalClientTrait, MetalError, Port, VlanAssignmentBatchCreateRequest, VlanAssignmentCreateRequest,
    VlanAssignmentState,
};
use std::future::Future;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Runs steps against one port with a shared budget and cancellation token
pub(crate) struct StepRunner<'a, C: ?Sized> {
    pub(crate) client: &'a C,
    pub(crate) settings: &'a ReconcilerSettings,
    pub(crate) budget: &'a OperationBudget,
    pub(crate) cancel: &'a CancellationToken,
    /// Bound every remote call by the remaining budget, not just batch waits
    pub(crate) bounded: bool,
}

impl<C> StepRunner<'_, C>
where
    C: MetalClientTrait + ?Sized,
{
    /// Await a client call, aborting on cancellation (and on budget exhaustion when bounded)
    async fn remote<T, F>(&self, step: Step, call: F) -> Result<T, ReconcileError>
    where
        F: Future<Output = Result<T, MetalError>>,
    {
        let deadline = async {
            if self.bounded {
                tokio::time::sleep(self.budget.remaining()).await;
            } else {
                std::future::pending::<()>().await;
            }
        };

        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(ReconcileError::Cancelled { step }),
            () = deadline => Err(ReconcileError::Timeout { step, last_status: None }),
            result = call => result.map_err(|e| {
                error!("{} failed: {}", step, e);
                ReconcileError::remote(step, e)
            }),
        }
    }

    /// Fetch the port with its VLAN associations
    pub(crate) async fn fetch(&self, step: Step, port_id: &str) -> Result<Port, ReconcileError> {
        self.remote(step, self.client.get_port(port_id)).await
    }

    /// Submit one batch, wait for it, then re-fetch the port
    async fn run_batch(
        &self,
        step: Step,
        port: Port,
        request: VlanAssignmentBatchCreateRequest,
    ) -> Result<Port, ReconcileError> {
        let batch = self
            .remote(step, self.client.create_vlan_assignment_batch(&port.id, &request))
            .await?;
        debug!("Submitted VLAN assignment batch {} for port {}", batch.id, port.id);

        wait_for_vlan_batch(
            self.client,
            &port.id,
            &batch.id,
            self.settings.batch_polling,
            self.budget.remaining(),
            self.cancel,
        )
        .await
        .map_err(|e| {
            error!("VLAN assignment batch {} on port {} did not complete: {}", batch.id, port.id, e);
            ReconcileError::batch_wait(step, &batch.id, e)
        })?;

        self.fetch(step, &port.id).await
    }

    /// Step 2: detach everything attached but not desired
    pub(crate) async fn detach_removed_vlans(&self, port: Port, spec: &PortSpec) -> Result<Port, ReconcileError> {
        let to_remove: Vec<String> = attached_vlans(&port, spec.addressing())
            .difference(&spec.desired_vlans())
            .cloned()
            .collect();
        if to_remove.is_empty() {
            debug!("Port {}: no VLANs to detach", port.id);
            return Ok(port);
        }

        info!("Port {}: detaching VLANs {:?}", port.id, to_remove);
        let request = VlanAssignmentBatchCreateRequest {
            vlan_assignments: to_remove
                .into_iter()
                .map(|vlan| VlanAssignmentCreateRequest {
                    vlan,
                    state: VlanAssignmentState::Unassigned,
                    native: None,
                })
                .collect(),
        };
        self.run_batch(Step::DetachRemovedVlans, port, request).await
    }

    /// Step 3
    pub(crate) async fn disbond(&self, port: Port, spec: &PortSpec) -> Result<Port, ReconcileError> {
        if spec.bonded || !port.is_bonded() {
            debug!("Port {}: disbond not needed", port.id);
            return Ok(port);
        }

        info!("Port {}: disbonding", port.id);
        let disbonded = self
            .remote(Step::Disbond, self.client.disbond_port(&port.id, false))
            .await?;
        self.fetch(Step::Disbond, &disbonded.id).await
    }

    /// Step 4
    pub(crate) async fn convert_to_layer2(&self, port: Port, spec: &PortSpec) -> Result<Port, ReconcileError> {
        if spec.layer2 != Some(true) || !port.is_bond_port() || port.is_layer2() {
            debug!("Port {}: Layer2 conversion not needed", port.id);
            return Ok(port);
        }

        info!("Port {}: converting to Layer2", port.id);
        self.remote(Step::ConvertToLayer2, self.client.convert_to_layer2(&port.id))
            .await
    }

    /// Step 5
    pub(crate) async fn bond(&self, port: Port, spec: &PortSpec) -> Result<Port, ReconcileError> {
        if !spec.bonded || port.is_bonded() {
            debug!("Port {}: bond not needed", port.id);
            return Ok(port);
        }

        info!("Port {}: bonding", port.id);
        let bonded = self
            .remote(Step::Bond, self.client.bond_port(&port.id, false))
            .await?;
        self.fetch(Step::Bond, &bonded.id).await
    }

    /// Step 6
    pub(crate) async fn convert_to_layer3(&self, port: Port, spec: &PortSpec) -> Result<Port, ReconcileError> {
        if spec.layer2 != Some(false) || !port.is_bond_port() || !port.is_layer2() {
            debug!("Port {}: Layer3 conversion not needed", port.id);
            return Ok(port);
        }

        info!("Port {}: converting to Layer3", port.id);
        let converted = self
            .remote(
                Step::ConvertToLayer3,
                self.client
                    .convert_to_layer3(&port.id, &self.settings.layer3_ip_requests),
            )
            .await?;
        self.fetch(Step::ConvertToLayer3, &converted.id).await
    }

    /// Step 7: attach everything desired but not attached
    ///
    /// An entry is flagged native when it equals the native VLAN the port
    /// had before this step; step 8 then settles the desired native.
    pub(crate) async fn attach_added_vlans(&self, port: Port, spec: &PortSpec) -> Result<Port, ReconcileError> {
        let addressing = spec.addressing();
        let native_before = current_native(&port, addressing);
        let to_assign: Vec<String> = spec
            .desired_vlans()
            .difference(&attached_vlans(&port, addressing))
            .cloned()
            .collect();
        if to_assign.is_empty() {
            debug!("Port {}: no VLANs to attach", port.id);
            return Ok(port);
        }

        info!("Port {}: attaching VLANs {:?}", port.id, to_assign);
        let request = VlanAssignmentBatchCreateRequest {
            vlan_assignments: to_assign
                .into_iter()
                .map(|vlan| {
                    let native = native_before.as_deref() == Some(vlan.as_str());
                    VlanAssignmentCreateRequest {
                        vlan,
                        state: VlanAssignmentState::Assigned,
                        native: Some(native),
                    }
                })
                .collect(),
        };
        self.run_batch(Step::AttachAddedVlans, port, request).await
    }

    /// Step 8
    pub(crate) async fn update_native_vlan(&self, port: Port, spec: &PortSpec) -> Result<Port, ReconcileError> {
        let desired = spec.desired_native();
        let current = current_native(&port, spec.addressing());
        if desired == current.as_deref() {
            debug!("Port {}: native VLAN already {:?}", port.id, current);
            return Ok(port);
        }

        let updated = match desired {
            None => {
                info!("Port {}: removing native VLAN {:?}", port.id, current);
                self.remote(Step::UpdateNativeVlan, self.client.unassign_native_vlan(&port.id))
                    .await?
            }
            Some(native) => {
                info!("Port {}: setting native VLAN to {}", port.id, native);
                self.remote(
                    Step::UpdateNativeVlan,
                    self.client.assign_native_vlan(&port.id, native),
                )
                .await?
            }
        };
        self.fetch(Step::UpdateNativeVlan, &updated.id).await
    }

    /// Steps 2 to 8, without the sanity check
    pub(crate) async fn converge(&self, port: Port, spec: &PortSpec) -> Result<Port, ReconcileError> {
        let port = self.detach_removed_vlans(port, spec).await?;
        let port = self.disbond(port, spec).await?;
        let port = self.convert_to_layer2(port, spec).await?;
        let port = self.bond(port, spec).await?;
        let port = self.convert_to_layer3(port, spec).await?;
        let port = self.attach_added_vlans(port, spec).await?;
        self.update_native_vlan(port, spec).await
    }
}
