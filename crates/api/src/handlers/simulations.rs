//! Handler for the demo simulation endpoint.
//!
//! Runs an [`ExecutionSimulator`] to completion server-side and returns the
//! final state. Each request gets its own simulator.

use axum::Json;
use geohub_core::job::JobType;
use geohub_core::simulator::{
    ExecutionSimulator, SimulationOutcome, SimulationScript, SimulationStep, SimulatorState,
};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationRequest {
    /// Replay the canned sequence for this job type.
    pub job_type: Option<String>,
    /// Replay these steps instead. Takes precedence over `job_type`.
    pub steps: Option<Vec<SimulationStep>>,
}

#[derive(Debug, Serialize)]
pub struct SimulationResponse {
    pub outcome: SimulationOutcome,
    #[serde(flatten)]
    pub state: SimulatorState,
}

/// POST /api/v1/simulations
pub async fn run_simulation(
    Json(input): Json<SimulationRequest>,
) -> AppResult<Json<DataResponse<SimulationResponse>>> {
    let steps = match (input.steps, input.job_type) {
        (Some(steps), _) if !steps.is_empty() => steps,
        (_, Some(job_type)) => SimulationScript::for_job_type(job_type.parse::<JobType>()?),
        _ => {
            return Err(AppError::BadRequest(
                "Provide a jobType or a non-empty steps list".to_string(),
            ))
        }
    };

    let simulator = ExecutionSimulator::new();
    let outcome = simulator.execute(steps).await;
    let state = simulator.snapshot();

    tracing::debug!(?outcome, log_count = state.logs.len(), "Simulation finished");

    Ok(Json(DataResponse {
        data: SimulationResponse { outcome, state },
    }))
}
