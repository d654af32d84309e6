//! Wire types of the socket channels and the REST API
//!
//! Socket frames keep the field names the hub and controller firmware speak
//! (`hubId`, `tempA`, `AC_STATUS_ACK`, ...). REST bodies use camelCase.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    ClusterId, DataCenterId, HubId, RackId, RuleId,
    actors::{
        actuator::DispatchOutcome,
        aggregator::{Aggregation, Evaluation},
        rack_state::RackUpdate,
    },
    catalog::{ActuatorMode, Rack},
};

// ============================================================================
// Telemetry channel (/ws/alerts)
// ============================================================================

/// One sensor reading sent by a hub
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryFrame {
    pub hub_id: HubId,
    pub sensor_name: String,
    pub temperature: f64,
    pub humidity: f64,
}

/// Reply to an applied reading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryAck {
    pub status: String,
    pub rack: String,
    pub dominant_sensor: Option<String>,
    pub values: Option<ReadingValues>,
    pub alerts: AlertFlags,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReadingValues {
    pub temperature: f64,
    pub humidity: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlertFlags {
    #[serde(rename = "tempA")]
    pub temp_a: bool,
    #[serde(rename = "humiA")]
    pub humi_a: bool,
}

impl From<&RackUpdate> for TelemetryAck {
    fn from(update: &RackUpdate) -> Self {
        let dominant = update.evaluation.dominant.as_ref();

        Self {
            status: "ok".to_string(),
            rack: update.rack_name.clone(),
            dominant_sensor: dominant.map(|d| d.sensor_name.clone()),
            values: dominant.map(|d| ReadingValues {
                temperature: d.temperature,
                humidity: d.humidity,
            }),
            alerts: AlertFlags {
                temp_a: update.evaluation.temperature_alert,
                humi_a: update.evaluation.humidity_alert,
            },
        }
    }
}

// ============================================================================
// Actuator channel (/ws/ac-control)
// ============================================================================

/// Frame sent by an actuator controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ControllerFrame {
    #[serde(rename = "REGISTER", rename_all = "camelCase")]
    Register { cluster_id: ClusterId },

    /// `status` is free text reported by the firmware, logged only
    #[serde(rename = "AC_STATUS_ACK", rename_all = "camelCase")]
    AcStatusAck {
        cluster_id: ClusterId,
        ac: u8,
        #[serde(default)]
        status: Option<String>,
    },
}

// ============================================================================
// REST
// ============================================================================

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub catalog: String,
    pub connected_actuators: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationStatus {
    Computed,
    InsufficientData,
    RuleMissing,
}

/// Result of `POST /api/v1/{clusters,racks}/:id/evaluate`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationResponse {
    pub cluster_id: ClusterId,
    pub status: EvaluationStatus,
    pub mean_temperature: Option<f64>,
    pub mean_humidity: Option<f64>,
    pub desired_actuator_state: Option<bool>,
    /// `dispatched`, `not_connected`, `auto_disabled`, ... or absent
    pub dispatch: Option<String>,
    /// Rule id the cluster points at, when `status` is `rule_missing`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub missing_rule: Option<RuleId>,
}

impl EvaluationResponse {
    /// `None` for [`Aggregation::NotFound`]
    pub fn from_evaluation(evaluation: &Evaluation) -> Option<Self> {
        let dispatch = evaluation.dispatch.as_ref().map(|d| d.label().to_string());

        match &evaluation.aggregation {
            Aggregation::Computed(aggregate) => Some(Self {
                cluster_id: aggregate.cluster_id.clone(),
                status: EvaluationStatus::Computed,
                mean_temperature: Some(aggregate.mean_temperature),
                mean_humidity: Some(aggregate.mean_humidity),
                desired_actuator_state: Some(aggregate.desired_actuator_state),
                dispatch,
                missing_rule: None,
            }),
            Aggregation::InsufficientData(cluster_id) => Some(Self {
                cluster_id: cluster_id.clone(),
                status: EvaluationStatus::InsufficientData,
                mean_temperature: None,
                mean_humidity: None,
                desired_actuator_state: None,
                dispatch,
                missing_rule: None,
            }),
            Aggregation::RuleMissing {
                cluster_id,
                rule_id,
            } => Some(Self {
                cluster_id: cluster_id.clone(),
                status: EvaluationStatus::RuleMissing,
                mean_temperature: None,
                mean_humidity: None,
                desired_actuator_state: None,
                dispatch,
                missing_rule: Some(rule_id.clone()),
            }),
            Aggregation::NotFound => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoControlRequest {
    pub cluster_id: ClusterId,
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManualControlRequest {
    pub cluster_id: ClusterId,
    /// `0` or `1`
    pub ac: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlResponse {
    pub mode: ActuatorMode,
    pub dispatch: Option<String>,
    /// Present when enabling auto mode re-evaluated the cluster
    pub evaluation: Option<EvaluationResponse>,
}

impl ControlResponse {
    pub fn new(mode: ActuatorMode, dispatch: Option<DispatchOutcome>) -> Self {
        Self {
            mode,
            dispatch: dispatch.map(|d| d.label().to_string()),
            evaluation: None,
        }
    }
}

/// Last reading of one sensor, as listed in the alert views
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorView {
    pub sensor_name: String,
    pub temperature: f64,
    pub humidity: f64,
    pub updated_at: DateTime<Utc>,
}

/// Alert state of one rack
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RackAlertView {
    pub rack_id: RackId,
    pub rack_name: String,
    pub hub_id: HubId,
    pub total_sensors: usize,
    pub total_alerts: usize,
    pub temperature_alert: bool,
    pub temperature_value: Option<f64>,
    pub humidity_alert: bool,
    pub humidity_value: Option<f64>,
    pub dominant_sensor: Option<String>,
    pub sensors: Vec<SensorView>,
}

impl From<&Rack> for RackAlertView {
    fn from(rack: &Rack) -> Self {
        let evaluation = rack.state().evaluation;
        let dominant = evaluation.dominant.as_ref();

        Self {
            rack_id: rack.id.clone(),
            rack_name: rack.name.clone(),
            hub_id: rack.hub_id.clone(),
            total_sensors: rack.sensor_readings.len(),
            total_alerts: evaluation.alert_count(),
            temperature_alert: evaluation.temperature_alert,
            temperature_value: dominant.map(|d| d.temperature),
            humidity_alert: evaluation.humidity_alert,
            humidity_value: dominant.map(|d| d.humidity),
            dominant_sensor: dominant.map(|d| d.sensor_name.clone()),
            sensors: rack
                .sensor_readings
                .values()
                .map(|reading| SensorView {
                    sensor_name: reading.sensor_name.clone(),
                    temperature: reading.temperature,
                    humidity: reading.humidity,
                    updated_at: reading.observed_at,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterAlertsResponse {
    pub rack_cluster_id: ClusterId,
    pub rack_cluster_name: String,
    pub data_center_id: DataCenterId,
    pub mean_temperature: Option<f64>,
    pub mean_humidity: Option<f64>,
    pub desired_actuator_state: bool,
    pub actual_actuator_state: bool,
    pub total_racks: usize,
    pub total_alerts: usize,
    pub racks: Vec<RackAlertView>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataCenterAlertsResponse {
    pub data_center_id: DataCenterId,
    pub total_racks: usize,
    pub total_alerts: usize,
    pub racks: Vec<RackAlertView>,
}
