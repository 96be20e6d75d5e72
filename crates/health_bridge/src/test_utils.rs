//! Scriptable in-memory `HealthProvider` used by unit tests.
#![cfg(test)]

use async_trait::async_trait;
use chrono::NaiveDateTime;
use std::sync::Mutex;
use std::time::Duration;

use health_provider_client::{
    AccessMode, BodyCompositionRecord, DataCategory, ExerciseRecord, ExerciseSession,
    ExerciseType, HealthProvider, PermissionScope, PermissionSet, ProviderError, ReadRequest,
};

pub fn ts(day: u32, hour: u32) -> NaiveDateTime {
    chrono::NaiveDate::from_ymd_opt(2025, 3, day)
        .unwrap()
        .and_hms_opt(hour, 0, 0)
        .unwrap()
}

pub fn full_access() -> PermissionSet {
    [
        PermissionScope::of(DataCategory::BodyComposition, AccessMode::Read),
        PermissionScope::of(DataCategory::Exercise, AccessMode::Read),
    ]
    .into_iter()
    .collect()
}

pub fn body_record(at: NaiveDateTime, weight: f64, muscle: f64) -> BodyCompositionRecord {
    BodyCompositionRecord {
        start_time: at,
        basal_metabolic_rate: Some(1650.0),
        body_fat: Some(18.2),
        body_fat_mass: Some(12.8),
        fat_free_mass: Some(57.7),
        skeletal_muscle_mass: Some(muscle),
        total_body_water: Some(42.3),
        weight: Some(weight),
    }
}

pub fn session(calories: f64, duration: i64, max_hr: f64, mean_hr: f64) -> ExerciseSession {
    ExerciseSession {
        calories,
        duration,
        max_heart_rate: max_hr,
        mean_heart_rate: mean_hr,
    }
}

pub fn exercise_record(
    at: NaiveDateTime,
    exercise_type: ExerciseType,
    sessions: Vec<ExerciseSession>,
) -> ExerciseRecord {
    ExerciseRecord {
        start_time: at,
        exercise_type,
        sessions,
    }
}

#[derive(Clone, Debug)]
pub enum Script<T> {
    Records(Vec<T>),
    Fail,
    Panic,
}

#[derive(Default)]
pub struct Calls {
    pub connect: usize,
    pub granted: Vec<PermissionSet>,
    pub requested: Vec<PermissionSet>,
    pub reads: Vec<(DataCategory, ReadRequest)>,
}

/// Records are returned verbatim, so fixtures must already be ordered the
/// way the request asks for.
pub struct FakeProvider {
    pub connect_fails: bool,
    /// Panic from inside the granted-permissions lookup.
    pub negotiation_panics: bool,
    pub granted: PermissionSet,
    pub granted_after_request: PermissionSet,
    pub request_delay: Duration,
    pub read_delay: Duration,
    pub body: Script<BodyCompositionRecord>,
    pub exercise: Script<ExerciseRecord>,
    pub calls: Mutex<Calls>,
}

impl Default for FakeProvider {
    fn default() -> Self {
        Self {
            connect_fails: false,
            negotiation_panics: false,
            granted: full_access(),
            granted_after_request: full_access(),
            request_delay: Duration::ZERO,
            read_delay: Duration::ZERO,
            body: Script::Records(vec![]),
            exercise: Script::Records(vec![]),
            calls: Mutex::new(Calls::default()),
        }
    }
}

impl FakeProvider {
    pub fn with_records(body: Vec<BodyCompositionRecord>, exercise: Vec<ExerciseRecord>) -> Self {
        Self {
            body: Script::Records(body),
            exercise: Script::Records(exercise),
            ..Self::default()
        }
    }

    fn play<T: Clone>(script: &Script<T>) -> Result<Vec<T>, ProviderError> {
        match script {
            Script::Records(r) => Ok(r.clone()),
            Script::Fail => Err(ProviderError::Unavailable("scripted read failure".into())),
            Script::Panic => panic!("scripted provider panic"),
        }
    }
}

#[async_trait]
impl HealthProvider for FakeProvider {
    async fn connect(&self) -> Result<(), ProviderError> {
        self.calls.lock().unwrap().connect += 1;
        if self.connect_fails {
            return Err(ProviderError::Unavailable("not initialized".into()));
        }
        Ok(())
    }

    async fn get_granted_permissions(
        &self,
        scopes: &PermissionSet,
    ) -> Result<PermissionSet, ProviderError> {
        self.calls.lock().unwrap().granted.push(scopes.clone());
        if self.negotiation_panics {
            panic!("scripted permission lookup panic");
        }
        Ok(self.granted.clone())
    }

    async fn request_permissions(
        &self,
        scopes: &PermissionSet,
    ) -> Result<PermissionSet, ProviderError> {
        self.calls.lock().unwrap().requested.push(scopes.clone());
        tokio::time::sleep(self.request_delay).await;
        Ok(self.granted_after_request.clone())
    }

    async fn read_body_composition(
        &self,
        request: &ReadRequest,
    ) -> Result<Vec<BodyCompositionRecord>, ProviderError> {
        self.calls
            .lock()
            .unwrap()
            .reads
            .push((DataCategory::BodyComposition, *request));
        tokio::time::sleep(self.read_delay).await;
        Self::play(&self.body)
    }

    async fn read_exercise(
        &self,
        request: &ReadRequest,
    ) -> Result<Vec<ExerciseRecord>, ProviderError> {
        self.calls
            .lock()
            .unwrap()
            .reads
            .push((DataCategory::Exercise, *request));
        tokio::time::sleep(self.read_delay).await;
        Self::play(&self.exercise)
    }
}
