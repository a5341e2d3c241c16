//! Metal client errors

use thiserror::Error;

/// Errors that can occur when interacting with the Metal API
#[derive(Debug, Error)]
pub enum MetalError {
    /// HTTP request/response error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Metal API returned an error
    #[error("Metal API error: {0}")]
    Api(String),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Authentication failed (missing or revoked token)
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// The token is valid but not allowed to see the resource
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid request (e.g., a port name missing from its device)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl MetalError {
    /// True for 404s
    pub fn is_not_found(&self) -> bool {
        matches!(self, MetalError::NotFound(_))
    }

    /// True for 403s
    pub fn is_forbidden(&self) -> bool {
        matches!(self, MetalError::Forbidden(_))
    }
}
