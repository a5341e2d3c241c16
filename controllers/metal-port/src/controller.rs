//! Main controller implementation.
//!
//! Builds the Kubernetes and Metal API clients, then runs the MetalPort
//! watcher in a background task.

use crate::config::ControllerConfig;
use crate::error::ControllerError;
use crate::reconciler::Reconciler;
use crate::watcher::watch_metal_ports;
use crds::MetalPort;
use kube::{Api, Client};
use metal_client::MetalClient;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Main controller for MetalPort resources.
pub struct Controller {
    port_watcher: JoinHandle<Result<(), ControllerError>>,
}

impl Controller {
    /// Creates a new controller instance.
    pub async fn new(config: ControllerConfig, shutdown: CancellationToken) -> Result<Self, ControllerError> {
        info!("Initializing metal port controller");

        let kube_client = Client::try_default().await?;
        let metal_client = MetalClient::new(config.metal_api_url.clone(), config.metal_auth_token.clone())?;

        let reconciler = Arc::new(Reconciler::new(
            kube_client.clone(),
            Arc::new(metal_client),
            &config,
            shutdown.clone(),
        ));

        let api: Api<MetalPort> = match &config.namespace {
            Some(ns) => Api::namespaced(kube_client, ns),
            None => Api::all(kube_client),
        };
        let port_watcher = tokio::spawn(watch_metal_ports(api, reconciler, shutdown));

        Ok(Self { port_watcher })
    }

    /// Runs the controller until shutdown.
    pub async fn run(self) -> Result<(), ControllerError> {
        info!("Metal port controller running");
        self.port_watcher
            .await
            .map_err(|e| ControllerError::Watch(format!("MetalPort watcher panicked: {}", e)))?
    }
}
