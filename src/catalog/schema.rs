//! Catalog records
//!
//! The catalog owns the lifecycle of every record below. The core only ever
//! writes a handful of fields:
//!
//! - [`Rack`]: `sensor_readings`, `temperature_alert`, `humidity_alert`, `dominant`
//!   (always together, see [`RackState`])
//! - [`RackCluster`]: the aggregate fields (see [`ClusterAggregate`]) and the
//!   acknowledged actuator state
//! - [`ActuatorMode`]: `auto_enabled`, `manual_command`

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    ClusterId, DataCenterId, DominantReading, HubId, RackId, RuleId, SensorId, SensorReadings,
    ThresholdCondition, monitors::rack::RackEvaluation,
};

use super::error::{CatalogError, CatalogResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hub {
    pub id: HubId,
    pub name: String,
    pub data_center_id: DataCenterId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sensor {
    pub id: SensorId,
    pub name: String,
    pub hub_id: HubId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rack {
    pub id: RackId,
    pub name: String,
    pub data_center_id: DataCenterId,
    pub hub_id: HubId,

    /// Sensors assigned to this rack, in catalog order
    pub sensor_ids: Vec<SensorId>,

    /// Alert conditions evaluated against the dominant reading
    #[serde(default)]
    pub conditions: Vec<ThresholdCondition>,

    // === Maintained by the ingest path ===
    #[serde(default)]
    pub sensor_readings: SensorReadings,

    #[serde(default)]
    pub temperature_alert: bool,

    #[serde(default)]
    pub humidity_alert: bool,

    #[serde(default)]
    pub dominant: Option<DominantReading>,
}

impl Rack {
    pub fn new(
        id: impl Into<RackId>,
        name: impl Into<String>,
        data_center_id: impl Into<DataCenterId>,
        hub_id: impl Into<HubId>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            data_center_id: data_center_id.into(),
            hub_id: hub_id.into(),
            sensor_ids: vec![],
            conditions: vec![],
            sensor_readings: SensorReadings::new(),
            temperature_alert: false,
            humidity_alert: false,
            dominant: None,
        }
    }

    pub fn has_sensor(&self, sensor_id: &SensorId) -> bool {
        self.sensor_ids.contains(sensor_id)
    }

    /// Snapshot of the fields written by the ingest path
    pub fn state(&self) -> RackState {
        RackState {
            sensor_readings: self.sensor_readings.clone(),
            evaluation: RackEvaluation {
                temperature_alert: self.temperature_alert,
                humidity_alert: self.humidity_alert,
                dominant: self.dominant.clone(),
            },
        }
    }

    pub fn apply_state(&mut self, state: RackState) {
        self.sensor_readings = state.sensor_readings;
        self.temperature_alert = state.evaluation.temperature_alert;
        self.humidity_alert = state.evaluation.humidity_alert;
        self.dominant = state.evaluation.dominant;
    }
}

/// Readings plus the flags derived from them.
///
/// Backends persist this as one write so readers never observe readings and
/// flags out of step.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RackState {
    pub sensor_readings: SensorReadings,
    pub evaluation: RackEvaluation,
}

impl RackState {
    pub fn evaluated(sensor_readings: SensorReadings, conditions: &[ThresholdCondition]) -> Self {
        let evaluation = RackEvaluation::evaluate(&sensor_readings, conditions);
        Self {
            sensor_readings,
            evaluation,
        }
    }
}

/// Cluster threshold rule ("ackit")
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThresholdRule {
    pub id: RuleId,
    pub name: String,
    pub data_center_id: DataCenterId,
    pub condition: ThresholdCondition,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RackCluster {
    pub id: ClusterId,
    pub name: String,
    pub data_center_id: DataCenterId,
    pub rack_ids: Vec<RackId>,
    pub rule_id: RuleId,

    // === Maintained by the aggregator ===
    #[serde(default)]
    pub mean_temperature: Option<f64>,

    #[serde(default)]
    pub mean_humidity: Option<f64>,

    #[serde(default)]
    pub desired_actuator_state: bool,

    #[serde(default)]
    pub last_evaluated_at: Option<DateTime<Utc>>,

    // === Maintained by acknowledgements only ===
    #[serde(default)]
    pub actual_actuator_state: bool,

    #[serde(default)]
    pub last_ack_at: Option<DateTime<Utc>>,
}

impl RackCluster {
    pub fn new(
        id: impl Into<ClusterId>,
        name: impl Into<String>,
        data_center_id: impl Into<DataCenterId>,
        rule_id: impl Into<RuleId>,
        rack_ids: Vec<RackId>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            data_center_id: data_center_id.into(),
            rack_ids,
            rule_id: rule_id.into(),
            mean_temperature: None,
            mean_humidity: None,
            desired_actuator_state: false,
            last_evaluated_at: None,
            actual_actuator_state: false,
            last_ack_at: None,
        }
    }
}

/// Result of one aggregation pass, persisted onto the cluster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterAggregate {
    pub cluster_id: ClusterId,
    pub mean_temperature: f64,
    pub mean_humidity: f64,
    pub desired_actuator_state: bool,
    pub evaluated_at: DateTime<Utc>,
}

/// Auto/manual gate of one cluster's actuator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActuatorMode {
    pub cluster_id: ClusterId,

    #[serde(default)]
    pub auto_enabled: bool,

    #[serde(default)]
    pub manual_command: bool,

    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl ActuatorMode {
    /// Mode of a cluster without a stored record: manual, actuator off
    pub fn manual_default(cluster_id: ClusterId) -> Self {
        Self {
            cluster_id,
            auto_enabled: false,
            manual_command: false,
            updated_at: Utc::now(),
        }
    }
}

/// Topology document used to populate a catalog.
///
/// This is the only write path for topology records. It refuses a rack
/// listed in more than one cluster.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogSeed {
    #[serde(default)]
    pub hubs: Vec<Hub>,
    #[serde(default)]
    pub sensors: Vec<Sensor>,
    #[serde(default)]
    pub racks: Vec<Rack>,
    #[serde(default)]
    pub rules: Vec<ThresholdRule>,
    #[serde(default)]
    pub clusters: Vec<RackCluster>,
    #[serde(default)]
    pub modes: Vec<ActuatorMode>,
}

impl CatalogSeed {
    /// Rack to cluster mapping, failing on a rack that is listed twice
    pub fn cluster_memberships(&self) -> CatalogResult<HashMap<RackId, ClusterId>> {
        cluster_memberships(&self.clusters)
    }
}

/// Rack to cluster mapping over `clusters`, failing on a rack listed twice anywhere
pub fn cluster_memberships<'a, I>(clusters: I) -> CatalogResult<HashMap<RackId, ClusterId>>
where
    I: IntoIterator<Item = &'a RackCluster>,
{
    let mut memberships = HashMap::new();

    for cluster in clusters {
        for rack_id in &cluster.rack_ids {
            match memberships.insert(rack_id.clone(), cluster.id.clone()) {
                None => {}
                Some(existing) if existing == cluster.id => {
                    return Err(CatalogError::Conflict(format!(
                        "rack {rack_id} is listed more than once in cluster {existing}"
                    )));
                }
                Some(existing) => {
                    return Err(CatalogError::Conflict(format!(
                        "rack {rack_id} is a member of both cluster {existing} and cluster {}",
                        cluster.id
                    )));
                }
            }
        }
    }

    Ok(memberships)
}
