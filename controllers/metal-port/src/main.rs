//! Metal Port Controller
//!
//! Watches MetalPort resources and converges the bare-metal server ports
//! they name: bonding, Layer2/Layer3 mode, attached VLANs and the native
//! VLAN. With `resetOnDelete` a deleted MetalPort puts its port back to
//! bonded Layer3 before the resource is released.

mod backoff;
mod config;
mod controller;
mod error;
mod reconciler;
mod watcher;

use crate::config::ControllerConfig;
use crate::error::ControllerError;
use controller::Controller;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), ControllerError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // kube and reqwest both pull in rustls; pick the provider once for the process
    if rustls::crypto::ring::default_provider().install_default().is_err() {
        debug!("rustls crypto provider already installed");
    }

    info!("Starting metal port controller");

    let config = ControllerConfig::from_env()?;
    info!("Configuration:");
    info!("  Metal API URL: {}", config.metal_api_url);
    info!("  Namespace: {}", config.namespace.as_deref().unwrap_or("all namespaces"));
    info!("  Reconcile timeout: {:?}", config.reconcile_timeout);
    info!("  Batch poll interval: {:?}", config.batch_poll_interval);

    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Shutdown requested, cancelling in-flight port operations");
                shutdown.cancel();
            }
        });
    }

    let controller = Controller::new(config, shutdown).await?;
    controller.run().await
}
