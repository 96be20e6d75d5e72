use health_provider_client::DataCategory;
use tracing_subscriber::EnvFilter;

use crate::orchestrator::AcquisitionScope;
use crate::outcome::Outcome;

pub const ACQUISITIONS_TOTAL: &str = "health_bridge_acquisitions_total";
pub const QUERY_FAILURES_TOTAL: &str = "health_bridge_query_failures_total";
pub const PERMISSION_REQUESTS_TOTAL: &str = "health_bridge_permission_requests_total";

pub fn record_outcome(outcome: &Outcome) {
    metrics::counter!(ACQUISITIONS_TOTAL, "outcome" => outcome.label()).increment(1);
}

pub fn record_abandoned() {
    metrics::counter!(ACQUISITIONS_TOTAL, "outcome" => "abandoned").increment(1);
}

pub fn record_query_failure(category: DataCategory) {
    let label = match category {
        DataCategory::BodyComposition => "body_composition",
        DataCategory::Exercise => "exercise",
    };
    metrics::counter!(QUERY_FAILURES_TOTAL, "category" => label).increment(1);
}

pub fn record_permission_request() {
    metrics::counter!(PERMISSION_REQUESTS_TOTAL).increment(1);
}

/// Parses `directives`, falling back to `info` when they are malformed.
pub fn env_filter(directives: &str) -> EnvFilter {
    EnvFilter::try_new(directives).unwrap_or_else(|_| EnvFilter::new("info"))
}

pub struct Health {
    pub ready: bool,
}

impl Health {
    /// Ready until the acquisition scope has been torn down.
    pub fn readiness(scope: &AcquisitionScope) -> Self {
        Self {
            ready: !scope.is_cancelled(),
        }
    }
}
