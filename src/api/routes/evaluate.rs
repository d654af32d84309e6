//! On-demand aggregation endpoints

use axum::{
    Json,
    extract::{Path, State},
};
use tracing::instrument;

use crate::{
    ClusterId, RackId,
    actors::aggregator::Evaluation,
    api::{
        error::{ApiError, ApiResult},
        state::ApiState,
        types::EvaluationResponse,
    },
};

/// POST /api/v1/clusters/:id/evaluate
///
/// Aggregate one cluster and, in auto mode, dispatch the result
#[instrument(skip(state))]
pub async fn evaluate_cluster(
    State(state): State<ApiState>,
    Path(cluster_id): Path<String>,
) -> ApiResult<Json<EvaluationResponse>> {
    let evaluation = state
        .aggregator
        .evaluate_cluster(ClusterId::new(cluster_id.clone()))
        .await?;

    respond(evaluation, || format!("cluster '{cluster_id}' not found"))
}

/// POST /api/v1/racks/:id/evaluate
///
/// Aggregate the cluster owning a rack
#[instrument(skip(state))]
pub async fn evaluate_rack(
    State(state): State<ApiState>,
    Path(rack_id): Path<String>,
) -> ApiResult<Json<EvaluationResponse>> {
    let evaluation = state
        .aggregator
        .evaluate_rack(RackId::new(rack_id.clone()))
        .await?;

    respond(evaluation, || format!("rack '{rack_id}' is not a member of any cluster"))
}

fn respond(
    evaluation: Evaluation,
    not_found: impl FnOnce() -> String,
) -> ApiResult<Json<EvaluationResponse>> {
    EvaluationResponse::from_evaluation(&evaluation)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(not_found()))
}
