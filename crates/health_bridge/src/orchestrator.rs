//! Top-level acquisition: negotiate, collect, deliver exactly one outcome.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use health_provider_client::{HealthProvider, PermissionSet, TimeWindow};
use tokio::sync::{oneshot, watch};
use tracing::{Instrument, debug, error, info, info_span};
use uuid::Uuid;

use crate::aggregator::MetricsAggregator;
use crate::config::AcquisitionConfig;
use crate::error::AcquisitionError;
use crate::negotiator::PermissionNegotiator;
use crate::observability;
use crate::outcome::{FailureReason, Outcome};
use crate::required_scopes;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AcquisitionState {
    Idle,
    Negotiating,
    Aggregating,
    Delivered,
    Failed,
}

/// Lifetime of the component that owns acquisitions. Cancelling it
/// abandons every in-flight acquisition without delivering to its caller.
#[derive(Clone)]
pub struct AcquisitionScope {
    cancel_tx: Arc<watch::Sender<bool>>,
}

impl Default for AcquisitionScope {
    fn default() -> Self {
        Self::new()
    }
}

impl AcquisitionScope {
    pub fn new() -> Self {
        let (cancel_tx, _) = watch::channel(false);
        Self {
            cancel_tx: Arc::new(cancel_tx),
        }
    }

    pub fn cancel(&self) {
        self.cancel_tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancel_tx.borrow()
    }

    /// Resolves once the scope is cancelled.
    pub async fn cancelled(&self) {
        let mut rx = self.cancel_tx.subscribe();
        // The sender lives in `self`, so `wait_for` cannot observe a closed channel.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

/// Caller-side handle for one acquisition's outcome. Consumed on delivery.
pub struct Reply {
    tx: oneshot::Sender<Outcome>,
}

impl Reply {
    pub fn channel() -> (Self, oneshot::Receiver<Outcome>) {
        let (tx, rx) = oneshot::channel();
        (Self { tx }, rx)
    }

    pub fn deliver(self, outcome: Outcome) {
        if self.tx.send(outcome).is_err() {
            debug!("caller stopped waiting before delivery");
        }
    }
}

pub struct Orchestrator {
    negotiator: PermissionNegotiator,
    aggregator: MetricsAggregator,
    config: AcquisitionConfig,
    scope: AcquisitionScope,
}

impl Orchestrator {
    pub fn new(
        provider: Arc<dyn HealthProvider>,
        config: AcquisitionConfig,
        scope: AcquisitionScope,
    ) -> Arc<Self> {
        Arc::new(Self {
            negotiator: PermissionNegotiator::new(provider.clone(), config.consent_timeout),
            aggregator: MetricsAggregator::new(provider),
            config,
            scope,
        })
    }

    pub fn scope(&self) -> &AcquisitionScope {
        &self.scope
    }

    /// Start an acquisition in the background and return the receiver the
    /// caller awaits on its own task. The receiver yields exactly one
    /// outcome, or an error if the scope was torn down first.
    pub fn get_body_composition_and_exercise_data(
        self: &Arc<Self>,
    ) -> oneshot::Receiver<Outcome> {
        let (reply, rx) = Reply::channel();
        self.spawn(reply);
        rx
    }

    pub fn spawn(self: &Arc<Self>, reply: Reply) {
        let this = Arc::clone(self);
        let span = info_span!("acquisition", id = %Uuid::new_v4());
        tokio::spawn(
            async move {
                if this.scope.is_cancelled() {
                    debug!("scope already torn down; dropping acquisition");
                    observability::record_abandoned();
                    return;
                }
                tokio::select! {
                    biased;
                    _ = this.scope.cancelled() => {
                        info!("scope torn down; acquisition abandoned");
                        observability::record_abandoned();
                    }
                    outcome = this.acquire() => {
                        observability::record_outcome(&outcome);
                        reply.deliver(outcome);
                    }
                }
            }
            .instrument(span),
        );
    }

    /// Run one acquisition to its terminal outcome.
    pub async fn acquire(&self) -> Outcome {
        let mut state = AcquisitionState::Idle;
        let required: PermissionSet = required_scopes();

        transition(&mut state, AcquisitionState::Negotiating);
        let negotiated = AssertUnwindSafe(self.negotiator.ensure(&required))
            .catch_unwind()
            .await;
        match negotiated {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                info!(error = %e, "negotiation failed");
                transition(&mut state, AcquisitionState::Failed);
                return Outcome::Failure(e.reason());
            }
            Err(_) => {
                error!("provider panicked during permission negotiation");
                transition(&mut state, AcquisitionState::Failed);
                return Outcome::Failure(FailureReason::ConnectFailed);
            }
        }

        transition(&mut state, AcquisitionState::Aggregating);
        let Some(window) = TimeWindow::trailing(
            chrono::Local::now().naive_local(),
            self.config.window_hours,
        ) else {
            error!(window_hours = self.config.window_hours, "acquisition window out of range");
            transition(&mut state, AcquisitionState::Failed);
            return Outcome::Failure(FailureReason::NoData);
        };
        debug!(since = %window.since, "acquisition window");
        let collected = AssertUnwindSafe(self.aggregator.collect(&window))
            .catch_unwind()
            .await;
        match collected {
            Ok(result) if !result.is_empty() => {
                transition(&mut state, AcquisitionState::Delivered);
                Outcome::Success(result)
            }
            Ok(_) => {
                info!(error = %AcquisitionError::NoData, "nothing to deliver");
                transition(&mut state, AcquisitionState::Delivered);
                Outcome::Failure(AcquisitionError::NoData.reason())
            }
            Err(_) => {
                error!("unexpected panic while collecting metrics");
                transition(&mut state, AcquisitionState::Failed);
                Outcome::Failure(FailureReason::NoData)
            }
        }
    }
}

fn transition(state: &mut AcquisitionState, next: AcquisitionState) {
    debug!(from = ?*state, to = ?next, "acquisition state");
    *state = next;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{FakeProvider, Script, body_record, exercise_record, session};
    use health_provider_client::ExerciseType;
    use std::time::Duration;

    fn now_minus(hours: i64) -> chrono::NaiveDateTime {
        chrono::Local::now().naive_local() - chrono::Duration::hours(hours)
    }

    fn orchestrator(fake: FakeProvider) -> Arc<Orchestrator> {
        Orchestrator::new(Arc::new(fake), AcquisitionConfig::default(), AcquisitionScope::new())
    }

    #[tokio::test]
    async fn delivers_flattened_body_and_session_fields() {
        let fake = FakeProvider::with_records(
            vec![body_record(now_minus(1), 70.5, 32.1)],
            vec![exercise_record(
                now_minus(2),
                ExerciseType::WeightMachine,
                vec![session(300.0, 45, 150.0, 120.0)],
            )],
        );
        let outcome = orchestrator(fake)
            .get_body_composition_and_exercise_data()
            .await
            .expect("delivered");
        let Outcome::Success(result) = outcome else {
            panic!("expected success");
        };
        let map = result.to_flat_map();
        assert_eq!(map["weight"], "70.5");
        assert_eq!(map["skeletal_muscle_mass"], "32.1");
        assert_eq!(map["calories"], "300");
        assert_eq!(map["duration"], "45");
        assert_eq!(map["maxHeartRate"], "150");
        assert_eq!(map["meanHeartRate"], "120");
        assert_eq!(map.len(), 11);
    }

    #[tokio::test]
    async fn empty_reads_fail_with_no_data() {
        let outcome = orchestrator(FakeProvider::default()).acquire().await;
        assert_eq!(outcome, Outcome::Failure(FailureReason::NoData));
    }

    #[tokio::test]
    async fn both_reads_failing_is_no_data() {
        let fake = FakeProvider {
            body: Script::Fail,
            exercise: Script::Fail,
            ..FakeProvider::default()
        };
        assert_eq!(
            orchestrator(fake).acquire().await,
            Outcome::Failure(FailureReason::NoData)
        );
    }

    #[tokio::test]
    async fn denied_permissions_fail_with_connect_failed_and_skip_reads() {
        let fake = Arc::new(FakeProvider {
            granted: PermissionSet::new(),
            granted_after_request: PermissionSet::new(),
            ..FakeProvider::default()
        });
        let orch = Orchestrator::new(
            fake.clone(),
            AcquisitionConfig::default(),
            AcquisitionScope::new(),
        );
        assert_eq!(orch.acquire().await, Outcome::Failure(FailureReason::ConnectFailed));
        assert!(fake.calls.lock().unwrap().reads.is_empty());
    }

    #[tokio::test]
    async fn panicking_read_is_no_data() {
        let fake = FakeProvider {
            exercise: Script::Panic,
            ..FakeProvider::default()
        };
        assert_eq!(
            orchestrator(fake).acquire().await,
            Outcome::Failure(FailureReason::NoData)
        );
    }

    #[tokio::test]
    async fn panicking_negotiation_is_connect_failed() {
        let fake = Arc::new(FakeProvider {
            negotiation_panics: true,
            ..FakeProvider::default()
        });
        let orch = Orchestrator::new(
            fake.clone(),
            AcquisitionConfig::default(),
            AcquisitionScope::new(),
        );
        let outcome = orch
            .get_body_composition_and_exercise_data()
            .await
            .expect("delivered");
        assert_eq!(outcome, Outcome::Failure(FailureReason::ConnectFailed));
        assert!(fake.calls.lock().unwrap().reads.is_empty());
    }

    #[tokio::test]
    async fn unrepresentable_window_still_delivers_no_data() {
        let fake = Arc::new(FakeProvider::default());
        let config = AcquisitionConfig {
            window_hours: u32::MAX,
            ..AcquisitionConfig::default()
        };
        let orch = Orchestrator::new(fake.clone(), config, AcquisitionScope::new());
        let outcome = orch
            .get_body_composition_and_exercise_data()
            .await
            .expect("delivered");
        assert_eq!(outcome, Outcome::Failure(FailureReason::NoData));
        assert!(fake.calls.lock().unwrap().reads.is_empty());
    }

    #[tokio::test]
    async fn single_window_is_shared_by_both_reads() {
        let fake = Arc::new(FakeProvider::default());
        let orch = Orchestrator::new(
            fake.clone(),
            AcquisitionConfig::default(),
            AcquisitionScope::new(),
        );
        orch.acquire().await;
        let calls = fake.calls.lock().unwrap();
        assert_eq!(calls.reads.len(), 2);
        assert_eq!(calls.reads[0].1.window, calls.reads[1].1.window);
    }

    #[tokio::test(start_paused = true)]
    async fn teardown_abandons_in_flight_acquisition() {
        let fake = FakeProvider {
            read_delay: Duration::from_secs(10),
            body: Script::Records(vec![body_record(now_minus(1), 70.0, 30.0)]),
            ..FakeProvider::default()
        };
        let orch = orchestrator(fake);
        let rx = orch.get_body_composition_and_exercise_data();
        tokio::time::sleep(Duration::from_secs(1)).await;
        orch.scope().cancel();
        assert!(rx.await.is_err());
    }

    #[tokio::test]
    async fn cancelled_scope_never_delivers() {
        let orch = orchestrator(FakeProvider::default());
        orch.scope().cancel();
        let rx = orch.get_body_composition_and_exercise_data();
        assert!(rx.await.is_err());
    }
}
