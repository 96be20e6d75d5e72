//! Reads both record categories for one window and merges what it finds.

use std::sync::Arc;

use health_provider_client::{
    BodyCompositionRecord, DataCategory, ExerciseRecord, ExerciseSession, HealthProvider,
    ProviderError, ReadRequest, TimeWindow,
};
use tracing::{debug, warn};

use crate::observability;
use crate::outcome::AggregateResult;

pub struct MetricsAggregator {
    provider: Arc<dyn HealthProvider>,
}

impl MetricsAggregator {
    pub fn new(provider: Arc<dyn HealthProvider>) -> Self {
        Self { provider }
    }

    /// Run both reads over `window` and merge them. Never fails: a failed
    /// read leaves its category absent.
    pub async fn collect(&self, window: &TimeWindow) -> AggregateResult {
        let request = ReadRequest::latest_first(*window);
        let (body, session) = tokio::join!(
            self.latest_body_composition(&request),
            self.latest_weight_session(&request)
        );
        merge(body, session)
    }

    pub async fn latest_body_composition(
        &self,
        request: &ReadRequest,
    ) -> Result<Option<BodyCompositionRecord>, ProviderError> {
        let records = self.provider.read_body_composition(request).await?;
        debug!(count = records.len(), "body composition records read");
        Ok(records.into_iter().next())
    }

    pub async fn latest_weight_session(
        &self,
        request: &ReadRequest,
    ) -> Result<Option<ExerciseSession>, ProviderError> {
        let records = self.provider.read_exercise(request).await?;
        debug!(count = records.len(), "exercise records read");
        Ok(select_session(records))
    }
}

/// First session of the first weight-training record, in provider order.
/// Later eligible records are not consulted when the first has no sessions.
pub fn select_session(records: Vec<ExerciseRecord>) -> Option<ExerciseSession> {
    let record = records
        .into_iter()
        .find(|r| r.exercise_type.is_weight_training())?;
    debug!(start_time = %record.start_time, sessions = record.sessions.len(), "weight training record selected");
    record.sessions.into_iter().next()
}

/// Downgrades a failed read to "absent" for that category only.
pub fn merge(
    body: Result<Option<BodyCompositionRecord>, ProviderError>,
    session: Result<Option<ExerciseSession>, ProviderError>,
) -> AggregateResult {
    AggregateResult {
        body_composition: absent_on_error(DataCategory::BodyComposition, body),
        session: absent_on_error(DataCategory::Exercise, session),
    }
}

fn absent_on_error<T>(category: DataCategory, res: Result<Option<T>, ProviderError>) -> Option<T> {
    match res {
        Ok(v) => v,
        Err(e) => {
            warn!(?category, error = %e, "read failed; treating category as absent");
            observability::record_query_failure(category);
            None
        }
    }
}
