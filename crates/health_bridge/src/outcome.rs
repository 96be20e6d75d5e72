//! Acquisition results and their flat, caller-facing form.

use health_provider_client::{BodyCompositionRecord, ExerciseSession};
use serde::Serialize;
use std::collections::BTreeMap;

/// Stable output keys. The widget layer reads these, so renaming one is a
/// breaking change.
pub mod keys {
    pub const BASAL_METABOLIC_RATE: &str = "basal_metabolic_rate";
    pub const BODY_FAT: &str = "body_fat";
    pub const BODY_FAT_MASS: &str = "body_fat_mass";
    pub const FAT_FREE_MASS: &str = "fat_free_mass";
    pub const SKELETAL_MUSCLE_MASS: &str = "skeletal_muscle_mass";
    pub const TOTAL_BODY_WATER: &str = "total_body_water";
    pub const WEIGHT: &str = "weight";

    pub const CALORIES: &str = "calories";
    pub const DURATION: &str = "duration";
    pub const MAX_HEART_RATE: &str = "maxHeartRate";
    pub const MEAN_HEART_RATE: &str = "meanHeartRate";
}

pub type FlatMap = BTreeMap<String, String>;

/// Most recent body-composition snapshot plus the most recent
/// strength-training session, either of which may be missing.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AggregateResult {
    pub body_composition: Option<BodyCompositionRecord>,
    pub session: Option<ExerciseSession>,
}

impl AggregateResult {
    pub fn is_empty(&self) -> bool {
        self.to_flat_map().is_empty()
    }

    /// Flatten into string values. Absent sources and absent fields are
    /// omitted; numbers keep the provider's value without rounding.
    pub fn to_flat_map(&self) -> FlatMap {
        let mut out = FlatMap::new();
        if let Some(body) = &self.body_composition {
            let fields = [
                (keys::BASAL_METABOLIC_RATE, body.basal_metabolic_rate),
                (keys::BODY_FAT, body.body_fat),
                (keys::BODY_FAT_MASS, body.body_fat_mass),
                (keys::FAT_FREE_MASS, body.fat_free_mass),
                (keys::SKELETAL_MUSCLE_MASS, body.skeletal_muscle_mass),
                (keys::TOTAL_BODY_WATER, body.total_body_water),
                (keys::WEIGHT, body.weight),
            ];
            for (key, value) in fields {
                if let Some(v) = value {
                    out.insert(key.to_string(), v.to_string());
                }
            }
        }
        if let Some(session) = &self.session {
            out.insert(keys::CALORIES.into(), session.calories.to_string());
            out.insert(keys::DURATION.into(), session.duration.to_string());
            out.insert(keys::MAX_HEART_RATE.into(), session.max_heart_rate.to_string());
            out.insert(keys::MEAN_HEART_RATE.into(), session.mean_heart_rate.to_string());
        }
        out
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureReason {
    ConnectFailed,
    NoData,
}

impl FailureReason {
    pub fn code(&self) -> &'static str {
        match self {
            FailureReason::ConnectFailed => "CONNECT_FAILED",
            FailureReason::NoData => "NO_DATA",
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            FailureReason::ConnectFailed => "Failed to connect to the health data provider",
            FailureReason::NoData => "No body composition data available",
        }
    }
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// The single terminal result of one acquisition.
#[derive(Clone, Debug, PartialEq)]
pub enum Outcome {
    Success(AggregateResult),
    Failure(FailureReason),
}

impl Outcome {
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Success(_) => "success",
            Outcome::Failure(FailureReason::ConnectFailed) => "connect_failed",
            Outcome::Failure(FailureReason::NoData) => "no_data",
        }
    }
}
