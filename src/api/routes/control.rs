//! Auto/manual actuator control endpoints

use axum::{Json, extract::State};
use tracing::instrument;

use crate::{
    actors::actuator::{DispatchOutcome, RejectReason},
    api::{
        error::{ApiError, ApiResult},
        state::ApiState,
        types::{AutoControlRequest, ControlResponse, EvaluationResponse, ManualControlRequest},
    },
};

/// POST /api/v1/ac/auto-control
///
/// Enabling auto mode clears the manual command and re-evaluates the cluster
/// right away, so the actuator follows the rule without waiting for the next
/// periodic pass.
#[instrument(skip(state))]
pub async fn set_auto_control(
    State(state): State<ApiState>,
    Json(request): Json<AutoControlRequest>,
) -> ApiResult<Json<ControlResponse>> {
    let mode = state
        .gate
        .set_auto_mode(&request.cluster_id, request.enabled)
        .await?;

    if !request.enabled {
        return Ok(Json(ControlResponse::new(mode, None)));
    }

    let evaluation = state
        .aggregator
        .evaluate_cluster(request.cluster_id.clone())
        .await?;

    let mut response = ControlResponse::new(mode, evaluation.dispatch);
    response.evaluation = EvaluationResponse::from_evaluation(&evaluation);

    Ok(Json(response))
}

/// POST /api/v1/ac/manual-control
///
/// `409 Conflict` while the cluster is in auto mode
#[instrument(skip(state))]
pub async fn set_manual_control(
    State(state): State<ApiState>,
    Json(request): Json<ManualControlRequest>,
) -> ApiResult<Json<ControlResponse>> {
    let on = match request.ac {
        0 => false,
        1 => true,
        other => {
            return Err(ApiError::InvalidRequest(format!(
                "ac must be 0 or 1, got {other}"
            )));
        }
    };

    let outcome = state.gate.manual_command(&request.cluster_id, on).await?;

    if outcome == DispatchOutcome::Rejected(RejectReason::ManualWhileAuto) {
        return Err(ApiError::Conflict(format!(
            "cluster '{}' is in auto mode; disable auto control first",
            request.cluster_id
        )));
    }

    let mode = state.gate.mode(&request.cluster_id).await?;
    Ok(Json(ControlResponse::new(mode, Some(outcome))))
}
