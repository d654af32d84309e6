//! Rack state cache - the telemetry ingest path
//!
//! Every telemetry frame is self-describing (`hubId` + `sensorName`), so the
//! path from frame to rack is a chain of catalog lookups:
//!
//! ```text
//! hubId ──► Hub ──► Sensor (by name under hub) ──► Rack (by assigned sensor)
//! ```
//!
//! The read-modify-write of a rack's readings runs under a per-rack lock and
//! re-reads the rack inside it, so two sensors of one rack reporting at the same
//! time both land. Racks never wait on each other.

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::{
    HubId, RackId, SensorId, SensorReading,
    catalog::{CatalogError, CatalogStore, RackState},
    monitors::rack::RackEvaluation,
    util::KeyedLocks,
};

/// Reasons a telemetry frame is dropped
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("unknown hub '{0}'")]
    UnknownHub(HubId),

    #[error("no sensor named '{sensor_name}' on hub '{hub_id}'")]
    UnknownSensor { hub_id: HubId, sensor_name: String },

    #[error("sensor '{sensor_id}' of hub '{hub_id}' is not assigned to any rack")]
    UnassignedSensor { hub_id: HubId, sensor_id: SensorId },

    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

/// Result of one applied reading
#[derive(Debug, Clone, PartialEq)]
pub struct RackUpdate {
    pub rack_id: RackId,
    pub rack_name: String,
    pub evaluation: RackEvaluation,
}

pub struct RackStateCache {
    catalog: Arc<dyn CatalogStore>,
    locks: KeyedLocks<RackId>,
}

impl RackStateCache {
    pub fn new(catalog: Arc<dyn CatalogStore>) -> Self {
        Self {
            catalog,
            locks: KeyedLocks::new(),
        }
    }

    /// Apply one sensor reading and re-evaluate the owning rack
    #[instrument(skip(self, temperature, humidity), fields(hub = %hub_id))]
    pub async fn ingest(
        &self,
        hub_id: &HubId,
        sensor_name: &str,
        temperature: f64,
        humidity: f64,
    ) -> Result<RackUpdate, IngestError> {
        self.catalog
            .find_hub(hub_id)
            .await?
            .ok_or_else(|| IngestError::UnknownHub(hub_id.clone()))?;

        let sensor = self
            .catalog
            .find_sensor(hub_id, sensor_name)
            .await?
            .ok_or_else(|| IngestError::UnknownSensor {
                hub_id: hub_id.clone(),
                sensor_name: sensor_name.to_string(),
            })?;

        let unassigned = || IngestError::UnassignedSensor {
            hub_id: hub_id.clone(),
            sensor_id: sensor.id.clone(),
        };

        let rack_id = self
            .catalog
            .find_rack_by_sensor(hub_id, &sensor.id)
            .await?
            .ok_or_else(unassigned)?
            .id;

        let _guard = self.locks.lock(&rack_id).await;

        // the assignment may have changed while waiting for the lock
        let rack = self
            .catalog
            .get_rack(&rack_id)
            .await?
            .filter(|rack| rack.has_sensor(&sensor.id))
            .ok_or_else(unassigned)?;

        let mut readings = rack.sensor_readings;
        readings.retain(|sensor_id, _| rack.sensor_ids.contains(sensor_id));
        readings.insert(
            sensor.id.clone(),
            SensorReading {
                sensor_name: sensor.name.clone(),
                temperature,
                humidity,
                observed_at: Utc::now(),
            },
        );

        let state = RackState::evaluated(readings, &rack.conditions);
        self.catalog.save_rack_state(&rack.id, &state).await?;

        debug!(
            "rack {} updated from sensor {} ({} readings, alerts: temp={} humi={})",
            rack.id,
            sensor.name,
            state.sensor_readings.len(),
            state.evaluation.temperature_alert,
            state.evaluation.humidity_alert
        );

        Ok(RackUpdate {
            rack_id: rack.id,
            rack_name: rack.name,
            evaluation: state.evaluation,
        })
    }
}
