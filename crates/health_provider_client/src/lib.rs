//! `HealthProvider` trait, record types and a reqwest-based gateway adapter.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

pub mod config;
pub mod http_client;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("provider unavailable: {0}")]
    Unavailable(String),
    #[error("authentication error: {0}")]
    Auth(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("decode error: {0}")]
    Decode(String),
    #[error("configuration error: {0}")]
    Config(String),
}

impl ProviderError {
    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            401 | 403 => ProviderError::Auth(body),
            404 => ProviderError::NotFound(body),
            503 => ProviderError::Unavailable(body),
            _ => ProviderError::Status { status, body },
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataCategory {
    BodyComposition,
    Exercise,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccessMode {
    Read,
    Write,
}

/// A (data category, access mode) permission unit.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PermissionScope {
    pub category: DataCategory,
    pub access: AccessMode,
}

impl PermissionScope {
    pub const fn of(category: DataCategory, access: AccessMode) -> Self {
        Self { category, access }
    }
}

impl std::fmt::Display for PermissionScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}:{:?}", self.category, self.access)
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct PermissionSet(BTreeSet<PermissionScope>);

impl PermissionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, scope: &PermissionScope) -> bool {
        self.0.contains(scope)
    }

    pub fn insert(&mut self, scope: PermissionScope) -> bool {
        self.0.insert(scope)
    }

    pub fn is_superset_of(&self, other: &PermissionSet) -> bool {
        self.0.is_superset(&other.0)
    }

    /// Scopes of `required` that are not in `self`.
    pub fn missing_from(&self, required: &PermissionSet) -> PermissionSet {
        PermissionSet(required.0.difference(&self.0).copied().collect())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PermissionScope> {
        self.0.iter()
    }
}

impl FromIterator<PermissionScope> for PermissionSet {
    fn from_iter<I: IntoIterator<Item = PermissionScope>>(iter: I) -> Self {
        PermissionSet(iter.into_iter().collect())
    }
}

impl std::fmt::Display for PermissionSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self.0.iter().map(ToString::to_string).collect();
        write!(f, "[{}]", parts.join(", "))
    }
}

/// Half-open local-time window `[since, ..)`.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimeWindow {
    pub since: NaiveDateTime,
}

impl TimeWindow {
    pub fn since(since: NaiveDateTime) -> Self {
        Self { since }
    }

    /// Window covering the `hours` preceding `now`, or `None` when the start
    /// falls outside the representable date range.
    pub fn trailing(now: NaiveDateTime, hours: u32) -> Option<Self> {
        now.checked_sub_signed(chrono::Duration::hours(i64::from(hours)))
            .map(Self::since)
    }

    pub fn contains(&self, at: NaiveDateTime) -> bool {
        at >= self.since
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum Ordering {
    #[serde(rename = "ASC")]
    Ascending,
    #[serde(rename = "DESC")]
    Descending,
}

impl Ordering {
    pub fn as_query(&self) -> &'static str {
        match self {
            Ordering::Ascending => "ASC",
            Ordering::Descending => "DESC",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReadRequest {
    pub window: TimeWindow,
    pub ordering: Ordering,
}

impl ReadRequest {
    pub fn latest_first(window: TimeWindow) -> Self {
        Self {
            window,
            ordering: Ordering::Descending,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct BodyCompositionRecord {
    pub start_time: NaiveDateTime,
    #[serde(default)]
    pub basal_metabolic_rate: Option<f64>,
    #[serde(default)]
    pub body_fat: Option<f64>,
    #[serde(default)]
    pub body_fat_mass: Option<f64>,
    #[serde(default)]
    pub fat_free_mass: Option<f64>,
    #[serde(default)]
    pub skeletal_muscle_mass: Option<f64>,
    #[serde(default)]
    pub total_body_water: Option<f64>,
    #[serde(default)]
    pub weight: Option<f64>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExerciseType {
    WeightMachine,
    Running,
    Walking,
    Cycling,
    Swimming,
    Hiking,
    Yoga,
    Elliptical,
    Rowing,
    Other,
    #[serde(other)]
    Unknown,
}

impl ExerciseType {
    pub fn is_weight_training(&self) -> bool {
        matches!(self, ExerciseType::WeightMachine)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ExerciseSession {
    pub calories: f64,
    /// Provider-native duration units, carried verbatim.
    pub duration: i64,
    pub max_heart_rate: f64,
    pub mean_heart_rate: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ExerciseRecord {
    pub start_time: NaiveDateTime,
    pub exercise_type: ExerciseType,
    #[serde(default)]
    pub sessions: Vec<ExerciseSession>,
}

#[async_trait]
pub trait HealthProvider: Send + Sync + 'static {
    /// Establish (or verify) the connection to the data source.
    async fn connect(&self) -> Result<(), ProviderError>;

    /// Which of `scopes` are currently granted.
    async fn get_granted_permissions(
        &self,
        scopes: &PermissionSet,
    ) -> Result<PermissionSet, ProviderError>;

    /// Ask the user to grant `scopes`. Resolves once the user has decided,
    /// returning the scopes granted afterwards.
    async fn request_permissions(
        &self,
        scopes: &PermissionSet,
    ) -> Result<PermissionSet, ProviderError>;

    async fn read_body_composition(
        &self,
        request: &ReadRequest,
    ) -> Result<Vec<BodyCompositionRecord>, ProviderError>;

    async fn read_exercise(
        &self,
        request: &ReadRequest,
    ) -> Result<Vec<ExerciseRecord>, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn at(h: u32) -> NaiveDateTime {
        chrono::NaiveDate::from_ymd_opt(2025, 3, 1)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    #[test]
    fn permission_set_superset_and_missing() {
        let body = PermissionScope::of(DataCategory::BodyComposition, AccessMode::Read);
        let exercise = PermissionScope::of(DataCategory::Exercise, AccessMode::Read);
        let required: PermissionSet = [body, exercise].into_iter().collect();
        let granted: PermissionSet = [body].into_iter().collect();

        assert!(!granted.is_superset_of(&required));
        let missing = granted.missing_from(&required);
        assert_eq!(missing.len(), 1);
        assert!(missing.contains(&exercise));
        assert!(required.is_superset_of(&granted));
    }

    #[test]
    fn trailing_window_is_half_open() {
        let w = TimeWindow::trailing(at(20), 12).expect("window");
        assert_eq!(w.since, at(8));
        assert!(w.contains(at(8)));
        assert!(w.contains(at(23)));
        assert!(!w.contains(at(7)));
    }

    #[test]
    fn trailing_window_out_of_range_is_none() {
        assert!(TimeWindow::trailing(at(20), u32::MAX).is_none());
    }

    #[test]
    fn exercise_type_unknown_maps_to_unknown() {
        let payload = json!({"start_time": "2025-03-01T10:00:00", "exercise_type": "AERIAL_SILKS"});
        let rec: ExerciseRecord = serde_json::from_value(payload).expect("deserialize");
        assert_eq!(rec.exercise_type, ExerciseType::Unknown);
        assert!(rec.sessions.is_empty());
        assert!(!rec.exercise_type.is_weight_training());
    }

    #[test]
    fn session_fields_use_snake_case_on_the_wire() {
        let payload = json!({
            "start_time": "2025-03-01T10:00:00",
            "exercise_type": "WEIGHT_MACHINE",
            "sessions": [{"calories": 300.0, "duration": 45, "max_heart_rate": 150.0, "mean_heart_rate": 120.0}]
        });
        let rec: ExerciseRecord = serde_json::from_value(payload).expect("deserialize");
        assert_eq!(rec.sessions[0].max_heart_rate, 150.0);
        let back = serde_json::to_value(&rec.sessions[0]).unwrap();
        assert!(back.get("mean_heart_rate").is_some());
        assert!(back.get("meanHeartRate").is_none());
    }

    #[test]
    fn scope_serializes_as_screaming_snake() {
        let s = PermissionScope::of(DataCategory::BodyComposition, AccessMode::Read);
        let v = serde_json::to_value(s).unwrap();
        assert_eq!(v, json!({"category": "BODY_COMPOSITION", "access": "READ"}));
    }

    #[test]
    fn from_status_maps_known_codes() {
        assert!(matches!(ProviderError::from_status(403, String::new()), ProviderError::Auth(_)));
        assert!(matches!(ProviderError::from_status(503, String::new()), ProviderError::Unavailable(_)));
        assert!(matches!(
            ProviderError::from_status(500, "x".into()),
            ProviderError::Status { status: 500, .. }
        ));
    }
}
