//! Error types for the acquisition bridge.

use health_provider_client::{PermissionSet, ProviderError};
use thiserror::Error;

use crate::outcome::FailureReason;

/// Startup and configuration errors.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("configuration error: {0}")]
    Config(String),
}

/// Reasons an acquisition stops short of producing data.
#[derive(Debug, Error)]
pub enum AcquisitionError {
    #[error("provider connection failed: {0}")]
    Connection(#[source] ProviderError),

    #[error("required permissions not granted: missing {missing}")]
    PermissionDenied { missing: PermissionSet },

    #[error("no usable records in the requested window")]
    NoData,
}

impl AcquisitionError {
    /// Caller-visible reason. Connection and permission failures share a code.
    pub fn reason(&self) -> FailureReason {
        match self {
            AcquisitionError::Connection(_) | AcquisitionError::PermissionDenied { .. } => {
                FailureReason::ConnectFailed
            }
            AcquisitionError::NoData => FailureReason::NoData,
        }
    }
}

/// Result type alias for bridge operations.
pub type BridgeResult<T> = Result<T, BridgeError>;
