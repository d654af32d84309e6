//! Health check endpoint

use axum::{Json, extract::State};

use crate::api::{error::ApiResult, state::ApiState, types::HealthResponse};

/// GET /api/v1/health
///
/// Reports catalog health and how many clusters have a controller attached
pub async fn health_check(State(state): State<ApiState>) -> ApiResult<Json<HealthResponse>> {
    let catalog = state.catalog.health_check().await?;

    Ok(Json(HealthResponse {
        status: if catalog.healthy { "ok" } else { "degraded" }.to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        catalog: catalog.message,
        connected_actuators: state.registry().len(),
    }))
}
