//! Controller-specific error types.

use kube::Error as KubeError;
use kube_runtime::finalizer::Error as FinalizerError;
use metal_client::MetalError;
use port_reconciler::{ReconcileError, SanityError};
use thiserror::Error;

/// Errors that can occur in the metal port controller.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Kubernetes API error
    #[error("Kubernetes error: {0}")]
    Kube(#[from] KubeError),

    /// Metal API client error
    #[error("Metal API error: {0}")]
    Metal(#[from] MetalError),

    /// Port reconcile or reset failed
    #[error("Port reconciliation failed: {0}")]
    Reconcile(#[from] ReconcileError),

    /// The MetalPort spec does not name a port correctly
    #[error("Invalid MetalPort spec: {0}")]
    InvalidSpec(#[from] SanityError),

    /// Finalizer bookkeeping or the wrapped apply/cleanup failed
    #[error("Finalizer error: {0}")]
    Finalizer(#[source] Box<FinalizerError<ControllerError>>),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Status patch could not be built
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Resource watch failed
    #[error("Resource watch failed: {0}")]
    Watch(String),
}

impl ControllerError {
    /// Whether requeueing with backoff can help
    pub fn is_retryable(&self) -> bool {
        match self {
            ControllerError::Reconcile(e) => e.is_retryable(),
            ControllerError::InvalidSpec(_) | ControllerError::InvalidConfig(_) => false,
            ControllerError::Finalizer(e) => match e.as_ref() {
                FinalizerError::ApplyFailed(inner) | FinalizerError::CleanupFailed(inner) => inner.is_retryable(),
                _ => true,
            },
            _ => true,
        }
    }
}
