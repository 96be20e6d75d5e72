//! Makes sure the required read scopes are granted before any query runs.

use std::sync::Arc;
use std::time::Duration;

use health_provider_client::{HealthProvider, PermissionSet};
use tracing::{debug, info, warn};

use crate::error::AcquisitionError;
use crate::observability;

pub struct PermissionNegotiator {
    provider: Arc<dyn HealthProvider>,
    consent_timeout: Duration,
}

impl PermissionNegotiator {
    pub fn new(provider: Arc<dyn HealthProvider>, consent_timeout: Duration) -> Self {
        Self {
            provider,
            consent_timeout,
        }
    }

    /// Returns `Ok(())` once every scope in `required` is granted.
    ///
    /// Already-granted scopes short-circuit without prompting. Otherwise one
    /// interactive request is issued for the whole `required` set and the
    /// set it resolves to is checked again. The prompt is bounded by the
    /// consent timeout; expiry counts as a denial.
    pub async fn ensure(&self, required: &PermissionSet) -> Result<(), AcquisitionError> {
        self.provider
            .connect()
            .await
            .map_err(AcquisitionError::Connection)?;

        let granted = self
            .provider
            .get_granted_permissions(required)
            .await
            .map_err(AcquisitionError::Connection)?;
        debug!(%granted, "currently granted permissions");
        if granted.is_superset_of(required) {
            return Ok(());
        }

        info!(missing = %granted.missing_from(required), "requesting permissions");
        observability::record_permission_request();
        let after = tokio::time::timeout(
            self.consent_timeout,
            self.provider.request_permissions(required),
        )
        .await;
        let after = match after {
            Ok(res) => res.map_err(AcquisitionError::Connection)?,
            Err(_) => {
                warn!(timeout = ?self.consent_timeout, "permission prompt expired");
                return Err(AcquisitionError::PermissionDenied {
                    missing: granted.missing_from(required),
                });
            }
        };

        if after.is_superset_of(required) {
            Ok(())
        } else {
            let missing = after.missing_from(required);
            warn!(%missing, "permissions still missing after request");
            Err(AcquisitionError::PermissionDenied { missing })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{FakeProvider, full_access};
    use health_provider_client::{AccessMode, DataCategory, PermissionScope};

    fn body_only() -> PermissionSet {
        [PermissionScope::of(DataCategory::BodyComposition, AccessMode::Read)]
            .into_iter()
            .collect()
    }

    fn negotiator(fake: Arc<FakeProvider>) -> PermissionNegotiator {
        PermissionNegotiator::new(fake, Duration::from_secs(5))
    }

    #[tokio::test]
    async fn granted_superset_skips_interactive_request() {
        let mut fake = FakeProvider::default();
        let mut granted = full_access();
        granted.insert(PermissionScope::of(DataCategory::Exercise, AccessMode::Write));
        fake.granted = granted;
        let fake = Arc::new(fake);

        negotiator(fake.clone()).ensure(&full_access()).await.expect("granted");
        let calls = fake.calls.lock().unwrap();
        assert!(calls.requested.is_empty());
        assert_eq!(calls.granted.len(), 1);
    }

    #[tokio::test]
    async fn partial_grant_requests_full_required_set_once() {
        let fake = Arc::new(FakeProvider {
            granted: body_only(),
            ..FakeProvider::default()
        });

        negotiator(fake.clone()).ensure(&full_access()).await.expect("granted");
        let calls = fake.calls.lock().unwrap();
        assert_eq!(calls.requested.len(), 1);
        assert_eq!(calls.requested[0], full_access());
    }

    #[tokio::test]
    async fn still_missing_after_request_is_denied() {
        let fake = Arc::new(FakeProvider {
            granted: PermissionSet::new(),
            granted_after_request: body_only(),
            ..FakeProvider::default()
        });

        let err = negotiator(fake).ensure(&full_access()).await.unwrap_err();
        match err {
            AcquisitionError::PermissionDenied { missing } => {
                assert!(missing.contains(&PermissionScope::of(
                    DataCategory::Exercise,
                    AccessMode::Read
                )));
                assert_eq!(missing.len(), 1);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn connect_failure_is_connection_error_without_permission_calls() {
        let fake = Arc::new(FakeProvider {
            connect_fails: true,
            ..FakeProvider::default()
        });

        let err = negotiator(fake.clone()).ensure(&full_access()).await.unwrap_err();
        assert!(matches!(err, AcquisitionError::Connection(_)));
        assert!(fake.calls.lock().unwrap().granted.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn unanswered_prompt_times_out_as_denied() {
        let fake = Arc::new(FakeProvider {
            granted: PermissionSet::new(),
            request_delay: Duration::from_secs(600),
            ..FakeProvider::default()
        });

        let err = negotiator(fake).ensure(&full_access()).await.unwrap_err();
        assert!(matches!(err, AcquisitionError::PermissionDenied { .. }));
    }
}
