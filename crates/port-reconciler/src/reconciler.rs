//! Port reconciler
//!
//! Entry points for converging a port to a spec and for resetting it on
//! deletion. Both fetch the port fresh, run the steps in a fixed order and
//! fetch it again at the end; nothing is cached between calls.

use crate::budget::OperationBudget;
use crate::error::{ReconcileError, Step};
use crate::plan::{plan, PlannedOperation};
use crate::reset::{verify_reset, ResetOutcome};
use crate::sanity::sanity_check;
use crate::settings::ReconcilerSettings;
use crate::spec::{PortIdentity, PortSpec};
use crate::steps::StepRunner;
use metal_client::{MetalClientTrait, MetalError, Port};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Converges remote ports to their specs
#[derive(Debug)]
pub struct PortReconciler<C: ?Sized> {
    client: Arc<C>,
    settings: ReconcilerSettings,
}

impl<C: ?Sized> Clone for PortReconciler<C> {
    fn clone(&self) -> Self {
        Self {
            client: Arc::clone(&self.client),
            settings: self.settings.clone(),
        }
    }
}

impl<C> PortReconciler<C>
where
    C: MetalClientTrait + ?Sized,
{
    pub fn new(client: Arc<C>, settings: ReconcilerSettings) -> Self {
        Self { client, settings }
    }

    pub fn settings(&self) -> &ReconcilerSettings {
        &self.settings
    }

    /// Start a budget of `total` with the configured safety margin
    pub fn budget(&self, total: std::time::Duration) -> OperationBudget {
        OperationBudget::start(total, self.settings.safety_margin)
    }

    fn runner<'a>(
        &'a self,
        budget: &'a OperationBudget,
        cancel: &'a CancellationToken,
        bounded: bool,
    ) -> StepRunner<'a, C> {
        StepRunner {
            client: self.client.as_ref(),
            settings: &self.settings,
            budget,
            cancel,
            bounded,
        }
    }

    async fn fetch_identity(&self, identity: &PortIdentity) -> Result<Port, MetalError> {
        match identity {
            PortIdentity::Id(id) => self.client.get_port(id).await,
            PortIdentity::DeviceName { device_id, name } => {
                let device = self.client.get_device(device_id).await?;
                device.port_by_name(name).cloned().ok_or_else(|| {
                    MetalError::NotFound(format!("Device {} has no port named {}", device_id, name))
                })
            }
        }
    }

    /// Fetch the port an identity refers to
    pub async fn lookup(
        &self,
        identity: &PortIdentity,
        cancel: &CancellationToken,
    ) -> Result<Port, ReconcileError> {
        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(ReconcileError::Cancelled { step: Step::Fetch }),
            result = self.fetch_identity(identity) => result.map_err(|e| ReconcileError::remote(Step::Fetch, e)),
        }
    }

    /// Converge the port named by `spec.identity` to `spec`
    ///
    /// Returns the port as re-fetched after the last step. The first failing
    /// step aborts the run; there is no rollback, running again resumes.
    pub async fn reconcile(
        &self,
        spec: &PortSpec,
        budget: &OperationBudget,
        cancel: &CancellationToken,
    ) -> Result<Port, ReconcileError> {
        let port = self.lookup(&spec.identity, cancel).await?;
        sanity_check(&port, spec)?;

        let ops = plan(&port, spec);
        if ops.is_empty() {
            debug!("Port {} already converged", port.id);
        } else {
            info!(
                "Port {}: planned {}",
                port.id,
                ops.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
            );
        }

        let runner = self.runner(budget, cancel, false);
        let port = runner.converge(port, spec).await?;
        runner.fetch(Step::Fetch, &port.id).await
    }

    /// Pipeline steps 2 to 8 without the sanity check
    ///
    /// For driving the pipeline from a known state in tests and tools.
    pub async fn converge(
        &self,
        port: Port,
        spec: &PortSpec,
        budget: &OperationBudget,
        cancel: &CancellationToken,
    ) -> Result<Port, ReconcileError> {
        self.runner(budget, cancel, false).converge(port, spec).await
    }

    /// Reset the port to bonded Layer3 with nothing attached
    ///
    /// A port that is already gone (404 or 403 on the first fetch) is a
    /// successful no-op. Unmet post-conditions come back as warnings.
    pub async fn reset(
        &self,
        identity: &PortIdentity,
        budget: &OperationBudget,
        cancel: &CancellationToken,
    ) -> Result<ResetOutcome, ReconcileError> {
        let port = match self.lookup(identity, cancel).await {
            Ok(port) => port,
            Err(e) if e.is_missing_port() => {
                info!("{} is gone, nothing to reset: {}", identity, e);
                return Ok(ResetOutcome::AlreadyGone);
            }
            Err(e) => return Err(e),
        };

        let spec = PortSpec::reset(identity.clone());
        let runner = self.runner(budget, cancel, true);
        let port = runner.detach_removed_vlans(port, &spec).await?;
        let port = runner.bond(port, &spec).await?;
        let port = runner.convert_to_layer3(port, &spec).await?;
        let port = runner.fetch(Step::Fetch, &port.id).await?;

        let warnings = verify_reset(&port);
        if !warnings.is_empty() {
            warn!("Port {} not fully reset: {}", port.id, warnings.join(" "));
        }
        Ok(ResetOutcome::Reset { port, warnings })
    }

    /// Operations `reconcile` would issue for `spec` against `port`
    pub fn plan(&self, port: &Port, spec: &PortSpec) -> Vec<PlannedOperation> {
        plan(port, spec)
    }
}
