//! Health metrics acquisition bridge.
//!
//! Negotiates read access with a [`HealthProvider`], reads the latest body
//! composition snapshot and strength-training session inside a trailing
//! window, and hands back one flat key/value outcome per call.

use health_provider_client::{AccessMode, DataCategory, PermissionScope, PermissionSet};

pub mod aggregator;
pub mod channel;
pub mod config;
pub mod error;
pub mod http;
pub mod negotiator;
pub mod observability;
pub mod orchestrator;
pub mod outcome;
mod test_utils;

pub use aggregator::MetricsAggregator;
pub use channel::{MethodCall, MethodChannel, MethodResponse};
pub use config::{AcquisitionConfig, BridgeConfig};
pub use error::{AcquisitionError, BridgeError, BridgeResult};
pub use health_provider_client::HealthProvider;
pub use negotiator::PermissionNegotiator;
pub use orchestrator::{AcquisitionScope, Orchestrator, Reply};
pub use outcome::{AggregateResult, FailureReason, Outcome};

/// Read access to body composition and exercise records.
pub fn required_scopes() -> PermissionSet {
    [
        PermissionScope::of(DataCategory::BodyComposition, AccessMode::Read),
        PermissionScope::of(DataCategory::Exercise, AccessMode::Read),
    ]
    .into_iter()
    .collect()
}
