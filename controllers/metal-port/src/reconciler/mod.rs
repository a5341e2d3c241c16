//! Reconciliation logic for MetalPort resources.
//!
//! `apply` converges the remote port to the resource's spec and writes the
//! observed state back to its status. `cleanup` runs from the finalizer and
//! resets the port when the resource asks for it.

pub mod status;

use crate::backoff::{BackoffTracker, FibonacciBackoff};
use crate::config::ControllerConfig;
use crate::error::ControllerError;
use crds::{MetalPort, MetalPortStatus};
use kube::api::{Patch, PatchParams};
use kube::{Api, Client, ResourceExt};
use kube_runtime::controller::Action;
use metal_client::MetalClientTrait;
use port_reconciler::{PortReconciler, ReconcileError, ResetOutcome};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Reconciles MetalPort resources against the Metal API.
pub struct Reconciler {
    kube_client: Client,
    ports: PortReconciler<dyn MetalClientTrait>,
    timeout: Duration,
    pub(crate) backoff: BackoffTracker,
    shutdown: CancellationToken,
}

/// `namespace/name` of a resource
pub fn object_key(port: &MetalPort) -> String {
    format!("{}/{}", port.namespace().unwrap_or_default(), port.name_any())
}

impl Reconciler {
    pub fn new(
        kube_client: Client,
        metal_client: Arc<dyn MetalClientTrait>,
        config: &ControllerConfig,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            kube_client,
            ports: PortReconciler::new(metal_client, config.reconciler_settings()),
            timeout: config.reconcile_timeout,
            backoff: BackoffTracker::new(FibonacciBackoff::new(1, 10)),
            shutdown,
        }
    }

    /// Namespaced API for the resource's own namespace
    pub fn api_for(&self, port: &MetalPort) -> Api<MetalPort> {
        Api::namespaced(self.kube_client.clone(), &port.namespace().unwrap_or_default())
    }

    async fn patch_status(&self, port: &MetalPort, desired: &MetalPortStatus) -> Result<(), ControllerError> {
        if !status::status_needs_update(port.status.as_ref(), desired) {
            debug!("MetalPort {} status unchanged", object_key(port));
            return Ok(());
        }
        self.api_for(port)
            .patch_status(&port.name_any(), &PatchParams::default(), &Patch::Merge(&status::status_patch(desired)))
            .await?;
        Ok(())
    }

    /// Converge the remote port to the resource's spec
    pub async fn apply(&self, port: &MetalPort) -> Result<Action, ControllerError> {
        let key = object_key(port);
        let generation = port.metadata.generation;

        let spec = match status::port_spec(port) {
            Ok(spec) => spec,
            Err(e) => {
                error!("MetalPort {} has an invalid spec: {}", key, e);
                self.patch_status(port, &status::invalid(port.status.as_ref(), &e, generation))
                    .await?;
                return Err(e.into());
            }
        };

        debug!("Reconciling MetalPort {} ({})", key, spec.identity);
        let budget = self.ports.budget(self.timeout);
        let result = async {
            let current = self.ports.lookup(&spec.identity, &self.shutdown).await?;
            let planned = self.ports.plan(&current, &spec);
            if !planned.is_empty() {
                info!(
                    "MetalPort {}: {} operation(s) planned: {}",
                    key,
                    planned.len(),
                    planned.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
                );
            }
            let remote = self.ports.reconcile(&spec, &budget, &self.shutdown).await?;
            Ok::<_, ReconcileError>((remote, planned.len()))
        }
        .await;

        match result {
            Ok((remote, planned)) => {
                self.patch_status(port, &status::converged(&remote, planned, generation))
                    .await?;
                self.backoff.reset(&key);
                info!("MetalPort {} converged on port {}", key, remote.id);
                Ok(Action::await_change())
            }
            Err(e) => {
                let desired = status::failed(port.status.as_ref(), &e, generation);
                if let Err(patch_error) = self.patch_status(port, &desired).await {
                    warn!("Failed to record error status for MetalPort {}: {}", key, patch_error);
                }
                Err(e.into())
            }
        }
    }

    /// Reset the remote port before the resource goes away
    pub async fn cleanup(&self, port: &MetalPort) -> Result<Action, ControllerError> {
        let key = object_key(port);
        if !port.spec.reset_on_delete {
            info!("MetalPort {} deleted; port left as is", key);
            return Ok(Action::await_change());
        }

        let identity = match status::port_identity(&port.spec) {
            Ok(identity) => identity,
            Err(e) => {
                warn!("MetalPort {} names no usable port, skipping reset: {}", key, e);
                return Ok(Action::await_change());
            }
        };

        if let Err(e) = self.patch_status(port, &status::resetting(port.status.as_ref())).await {
            debug!("Could not mark MetalPort {} as resetting: {}", key, e);
        }

        let budget = self.ports.budget(self.timeout);
        match self.ports.reset(&identity, &budget, &self.shutdown).await? {
            ResetOutcome::AlreadyGone => info!("MetalPort {}: {} already gone", key, identity),
            ResetOutcome::Reset { port: remote, warnings } if warnings.is_empty() => {
                info!("MetalPort {}: port {} reset", key, remote.id)
            }
            ResetOutcome::Reset { port: remote, warnings } => {
                warn!("MetalPort {}: port {} reset with warnings: {}", key, remote.id, warnings.join(" "))
            }
        }
        self.backoff.reset(&key);
        Ok(Action::await_change())
    }
}
