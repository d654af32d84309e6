//! Read-only alert views

use axum::{
    Json,
    extract::{Path, State},
};

use crate::{
    ClusterId, DataCenterId,
    api::{
        error::{ApiError, ApiResult},
        state::ApiState,
        types::{ClusterAlertsResponse, DataCenterAlertsResponse, RackAlertView},
    },
};

/// GET /api/v1/alerts/by-rack-cluster/:id
pub async fn alerts_by_cluster(
    State(state): State<ApiState>,
    Path(cluster_id): Path<String>,
) -> ApiResult<Json<ClusterAlertsResponse>> {
    let cluster_id = ClusterId::new(cluster_id);

    let cluster = state
        .catalog
        .get_cluster(&cluster_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("rack cluster '{cluster_id}' not found")))?;

    let racks: Vec<RackAlertView> = state
        .catalog
        .get_racks(&cluster.rack_ids)
        .await?
        .iter()
        .map(RackAlertView::from)
        .collect();

    Ok(Json(ClusterAlertsResponse {
        rack_cluster_id: cluster.id,
        rack_cluster_name: cluster.name,
        data_center_id: cluster.data_center_id,
        mean_temperature: cluster.mean_temperature,
        mean_humidity: cluster.mean_humidity,
        desired_actuator_state: cluster.desired_actuator_state,
        actual_actuator_state: cluster.actual_actuator_state,
        total_racks: racks.len(),
        total_alerts: racks.iter().map(|rack| rack.total_alerts).sum(),
        racks,
    }))
}

/// GET /api/v1/alerts/by-data-center/:id
pub async fn alerts_by_data_center(
    State(state): State<ApiState>,
    Path(data_center_id): Path<String>,
) -> ApiResult<Json<DataCenterAlertsResponse>> {
    let data_center_id = DataCenterId::new(data_center_id);

    let racks: Vec<RackAlertView> = state
        .catalog
        .list_racks_in_data_center(&data_center_id)
        .await?
        .iter()
        .map(RackAlertView::from)
        .collect();

    if racks.is_empty() {
        return Err(ApiError::NotFound(format!(
            "no racks found for data center '{data_center_id}'"
        )));
    }

    Ok(Json(DataCenterAlertsResponse {
        data_center_id,
        total_racks: racks.len(),
        total_alerts: racks.iter().map(|rack| rack.total_alerts).sum(),
        racks,
    }))
}
