//! Inbound method-call dispatch and the response contract seen by callers.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::orchestrator::Orchestrator;
use crate::outcome::{FlatMap, Outcome};

pub const GET_BODY_COMPOSITION_AND_EXERCISE_DATA: &str = "getBodyCompositionAndExerciseData";

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct MethodCall {
    pub method: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MethodResponse {
    Success { data: FlatMap },
    Error { code: String, message: String },
    NotImplemented { method: String },
}

impl From<Outcome> for MethodResponse {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Success(result) => MethodResponse::Success {
                data: result.to_flat_map(),
            },
            Outcome::Failure(reason) => MethodResponse::Error {
                code: reason.code().to_string(),
                message: reason.message().to_string(),
            },
        }
    }
}

/// The acquisition was torn down before an outcome was produced.
#[derive(Debug, thiserror::Error)]
#[error("acquisition abandoned during teardown")]
pub struct Abandoned;

#[derive(Clone)]
pub struct MethodChannel {
    orchestrator: Arc<Orchestrator>,
}

impl MethodChannel {
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self { orchestrator }
    }

    pub async fn handle(&self, call: &MethodCall) -> Result<MethodResponse, Abandoned> {
        match call.method.as_str() {
            GET_BODY_COMPOSITION_AND_EXERCISE_DATA => {
                let rx = self.orchestrator.get_body_composition_and_exercise_data();
                rx.await.map(MethodResponse::from).map_err(|_| Abandoned)
            }
            other => {
                warn!(method = other, "unknown method");
                Ok(MethodResponse::NotImplemented {
                    method: other.to_string(),
                })
            }
        }
    }
}
