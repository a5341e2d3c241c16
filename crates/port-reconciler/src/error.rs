//! Reconciliation errors

use crate::sanity::SanityError;
use metal_client::MetalError;
use state_waiter::WaitError;
use thiserror::Error;

/// Pipeline step, named in every error it produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    /// Fetching (or looking up) the port
    Fetch,
    SanityCheck,
    DetachRemovedVlans,
    Disbond,
    ConvertToLayer2,
    Bond,
    ConvertToLayer3,
    AttachAddedVlans,
    UpdateNativeVlan,
}

impl Step {
    pub fn as_str(self) -> &'static str {
        match self {
            Step::Fetch => "fetch",
            Step::SanityCheck => "sanity-check",
            Step::DetachRemovedVlans => "detach-removed-vlans",
            Step::Disbond => "disbond",
            Step::ConvertToLayer2 => "convert-to-layer2",
            Step::Bond => "bond",
            Step::ConvertToLayer3 => "convert-to-layer3",
            Step::AttachAddedVlans => "attach-added-vlans",
            Step::UpdateNativeVlan => "update-native-vlan",
        }
    }
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors returned by the port reconciler
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// The spec cannot be applied; retrying will not help
    #[error("invalid port spec: {0}")]
    Validation(#[from] SanityError),

    #[error("{step}: not found: {message}")]
    NotFound { step: Step, message: String },

    #[error("{step}: forbidden: {message}")]
    Forbidden { step: Step, message: String },

    #[error("{step}: remote operation failed: {source}")]
    RemoteOperationFailed {
        step: Step,
        #[source]
        source: MetalError,
    },

    #[error("vlan assignment batch {batch_id} provisioning failed: {}", .messages.join("; "))]
    BatchFailed {
        step: Step,
        batch_id: String,
        messages: Vec<String>,
    },

    #[error(
        "{step}: timed out (last status: {})",
        .last_status.as_deref().unwrap_or("unknown")
    )]
    Timeout { step: Step, last_status: Option<String> },

    #[error("{step}: cancelled")]
    Cancelled { step: Step },
}

impl ReconcileError {
    /// Map a client error raised during `step`
    pub fn remote(step: Step, error: MetalError) -> Self {
        match error {
            MetalError::NotFound(message) => ReconcileError::NotFound { step, message },
            MetalError::Forbidden(message) => ReconcileError::Forbidden { step, message },
            source => ReconcileError::RemoteOperationFailed { step, source },
        }
    }

    /// Map a failed batch wait raised during `step`
    pub fn batch_wait(step: Step, batch_id: &str, error: WaitError<MetalError>) -> Self {
        match error {
            WaitError::UnexpectedState { messages, .. } => ReconcileError::BatchFailed {
                step,
                batch_id: batch_id.to_string(),
                messages,
            },
            WaitError::Timeout { last_status, .. } => ReconcileError::Timeout { step, last_status },
            WaitError::Cancelled { .. } => ReconcileError::Cancelled { step },
            WaitError::NotFound { resource, checks } => ReconcileError::NotFound {
                step,
                message: format!("{} not found after {} checks", resource, checks),
            },
            WaitError::Refresh { source, .. } => ReconcileError::remote(step, source),
        }
    }

    /// Step that failed
    pub fn step(&self) -> Step {
        match self {
            ReconcileError::Validation(_) => Step::SanityCheck,
            ReconcileError::NotFound { step, .. }
            | ReconcileError::Forbidden { step, .. }
            | ReconcileError::RemoteOperationFailed { step, .. }
            | ReconcileError::BatchFailed { step, .. }
            | ReconcileError::Timeout { step, .. }
            | ReconcileError::Cancelled { step } => *step,
        }
    }

    /// Whether running the same spec again might succeed
    pub fn is_retryable(&self) -> bool {
        !matches!(self, ReconcileError::Validation(_))
    }

    /// True when the port itself is gone or hidden from this token
    pub fn is_missing_port(&self) -> bool {
        matches!(
            self,
            ReconcileError::NotFound { step: Step::Fetch, .. } | ReconcileError::Forbidden { step: Step::Fetch, .. }
        )
    }
}
