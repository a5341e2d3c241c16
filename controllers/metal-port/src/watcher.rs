//! Kubernetes resource watcher.
//!
//! Runs a kube_runtime::Controller over MetalPort resources. Every object
//! goes through the finalizer helper, so a deleted MetalPort is only
//! released after its cleanup (the optional port reset) succeeded.

use crate::error::ControllerError;
use crate::reconciler::{object_key, Reconciler};
use crds::{MetalPort, METAL_PORT_FINALIZER};
use futures::StreamExt;
use kube::Api;
use kube_runtime::controller::{Action, Config as RuntimeConfig};
use kube_runtime::finalizer::{finalizer, Event as Finalizer};
use kube_runtime::{watcher, Controller};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

async fn reconcile(port: Arc<MetalPort>, ctx: Arc<Reconciler>) -> Result<Action, ControllerError> {
    let api = ctx.api_for(&port);
    finalizer(&api, METAL_PORT_FINALIZER, port, |event| async move {
        match event {
            Finalizer::Apply(port) => ctx.apply(&port).await,
            Finalizer::Cleanup(port) => ctx.cleanup(&port).await,
        }
    })
    .await
    .map_err(|e| ControllerError::Finalizer(Box::new(e)))
}

/// Requeue with the object's Fibonacci backoff; errors retrying cannot fix wait the maximum
fn error_policy(port: Arc<MetalPort>, error: &ControllerError, ctx: Arc<Reconciler>) -> Action {
    let key = object_key(&port);
    let delay = if error.is_retryable() {
        ctx.backoff.next_delay(&key)
    } else {
        ctx.backoff.max()
    };
    error!("Reconciliation error for MetalPort {}: {} (retrying in {:?})", key, error, delay);
    Action::requeue(delay)
}

/// Watch MetalPort resources until `shutdown` is cancelled
pub async fn watch_metal_ports(
    api: Api<MetalPort>,
    reconciler: Arc<Reconciler>,
    shutdown: CancellationToken,
) -> Result<(), ControllerError> {
    info!("Starting MetalPort watcher");

    // One reconcile per object at a time; a port is never mutated concurrently
    let config = RuntimeConfig::default()
        .debounce(Duration::from_secs(5))
        .concurrency(3);

    Controller::new(api, watcher::Config::default())
        .with_config(config)
        .graceful_shutdown_on(shutdown.cancelled_owned())
        .run(reconcile, error_policy, reconciler)
        .for_each(|res| async move {
            match res {
                Ok((obj, _)) => debug!("Reconciled MetalPort {}", obj),
                Err(e) => error!("Controller error for MetalPort: {}", e),
            }
        })
        .await;

    info!("MetalPort watcher stopped");
    Ok(())
}
