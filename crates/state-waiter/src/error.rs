//! Waiter errors

use std::time::Duration;
use thiserror::Error;

/// Errors that end a wait without reaching the target state
///
/// `E` is the refresh closure's own error type, carried unchanged in
/// [`WaitError::Refresh`].
#[derive(Debug, Error)]
pub enum WaitError<E>
where
    E: std::error::Error + 'static,
{
    /// The timeout elapsed while the resource was still pending
    #[error(
        "timed out after {elapsed:?} waiting for {resource} (last status: {})",
        .last_status.as_deref().unwrap_or("unknown")
    )]
    Timeout {
        resource: String,
        last_status: Option<String>,
        elapsed: Duration,
    },

    /// The resource reported a status that is neither pending nor a target
    #[error(
        "{resource} reached unexpected state '{status}', expected one of {expected:?}: {}",
        .messages.join("; ")
    )]
    UnexpectedState {
        resource: String,
        status: String,
        expected: Vec<String>,
        messages: Vec<String>,
    },

    /// The resource kept coming back as not found
    #[error("{resource} not found after {checks} consecutive checks")]
    NotFound { resource: String, checks: u32 },

    /// The refresh closure itself failed
    #[error("failed to refresh {resource}: {source}")]
    Refresh {
        resource: String,
        #[source]
        source: E,
    },

    /// The cancellation token fired
    #[error("wait for {resource} was cancelled")]
    Cancelled { resource: String },
}

impl<E> WaitError<E>
where
    E: std::error::Error + 'static,
{
    /// Name of the resource being waited on
    pub fn resource(&self) -> &str {
        match self {
            WaitError::Timeout { resource, .. }
            | WaitError::UnexpectedState { resource, .. }
            | WaitError::NotFound { resource, .. }
            | WaitError::Refresh { resource, .. }
            | WaitError::Cancelled { resource } => resource,
        }
    }

    /// Last status observed before the wait ended, if any
    pub fn last_status(&self) -> Option<&str> {
        match self {
            WaitError::Timeout { last_status, .. } => last_status.as_deref(),
            WaitError::UnexpectedState { status, .. } => Some(status),
            _ => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, WaitError::Timeout { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, WaitError::Cancelled { .. })
    }
}
