//! In-memory catalog backend (no persistence)
//!
//! Each record type lives in its own `DashMap`, so lookups on different racks
//! or clusters never contend on a shared lock. Useful for:
//! - Testing without database dependencies
//! - Small deployments whose topology comes entirely from the config file
//!
//! ## Limitations
//!
//! - **No persistence**: readings and cluster state are lost on restart

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tracing::debug;

use crate::{ClusterId, DataCenterId, HubId, RackId, RuleId, SensorId};

use super::backend::{CatalogStore, HealthStatus};
use super::error::{CatalogError, CatalogResult};
use super::schema::{
    ActuatorMode, CatalogSeed, ClusterAggregate, Hub, Rack, RackCluster, RackState, Sensor,
    ThresholdRule, cluster_memberships,
};

#[derive(Default)]
pub struct MemoryCatalog {
    hubs: DashMap<HubId, Hub>,
    sensors: DashMap<SensorId, Sensor>,
    racks: DashMap<RackId, Rack>,
    rules: DashMap<RuleId, ThresholdRule>,
    clusters: DashMap<ClusterId, RackCluster>,
    modes: DashMap<ClusterId, ActuatorMode>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a catalog populated from `seed`
    pub async fn with_seed(seed: CatalogSeed) -> CatalogResult<Self> {
        let catalog = Self::new();
        catalog.import(seed).await?;
        Ok(catalog)
    }
}

#[async_trait]
impl CatalogStore for MemoryCatalog {
    async fn import(&self, seed: CatalogSeed) -> CatalogResult<()> {
        // membership is checked across the clusters that survive the import
        let kept: Vec<RackCluster> = self
            .clusters
            .iter()
            .filter(|entry| !seed.clusters.iter().any(|c| &c.id == entry.key()))
            .map(|entry| entry.value().clone())
            .collect();
        cluster_memberships(kept.iter().chain(seed.clusters.iter()))?;

        debug!(
            "importing {} hubs, {} sensors, {} racks, {} rules, {} clusters, {} modes",
            seed.hubs.len(),
            seed.sensors.len(),
            seed.racks.len(),
            seed.rules.len(),
            seed.clusters.len(),
            seed.modes.len()
        );

        for hub in seed.hubs {
            self.hubs.insert(hub.id.clone(), hub);
        }
        for sensor in seed.sensors {
            self.sensors.insert(sensor.id.clone(), sensor);
        }
        for rack in seed.racks {
            self.racks.insert(rack.id.clone(), rack);
        }
        for rule in seed.rules {
            self.rules.insert(rule.id.clone(), rule);
        }
        for cluster in seed.clusters {
            self.clusters.insert(cluster.id.clone(), cluster);
        }
        for mode in seed.modes {
            self.modes.insert(mode.cluster_id.clone(), mode);
        }

        Ok(())
    }

    async fn find_hub(&self, hub_id: &HubId) -> CatalogResult<Option<Hub>> {
        Ok(self.hubs.get(hub_id).map(|hub| hub.value().clone()))
    }

    async fn find_sensor(&self, hub_id: &HubId, name: &str) -> CatalogResult<Option<Sensor>> {
        Ok(self
            .sensors
            .iter()
            .find(|sensor| &sensor.hub_id == hub_id && sensor.name == name)
            .map(|sensor| sensor.value().clone()))
    }

    async fn find_rack_by_sensor(
        &self,
        hub_id: &HubId,
        sensor_id: &SensorId,
    ) -> CatalogResult<Option<Rack>> {
        Ok(self
            .racks
            .iter()
            .find(|rack| &rack.hub_id == hub_id && rack.has_sensor(sensor_id))
            .map(|rack| rack.value().clone()))
    }

    async fn get_rack(&self, rack_id: &RackId) -> CatalogResult<Option<Rack>> {
        Ok(self.racks.get(rack_id).map(|rack| rack.value().clone()))
    }

    async fn get_racks(&self, rack_ids: &[RackId]) -> CatalogResult<Vec<Rack>> {
        Ok(rack_ids
            .iter()
            .filter_map(|id| self.racks.get(id).map(|rack| rack.value().clone()))
            .collect())
    }

    async fn list_racks_in_data_center(
        &self,
        data_center_id: &DataCenterId,
    ) -> CatalogResult<Vec<Rack>> {
        let mut racks: Vec<Rack> = self
            .racks
            .iter()
            .filter(|rack| &rack.data_center_id == data_center_id)
            .map(|rack| rack.value().clone())
            .collect();
        racks.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(racks)
    }

    async fn save_rack_state(&self, rack_id: &RackId, state: &RackState) -> CatalogResult<()> {
        let mut rack = self
            .racks
            .get_mut(rack_id)
            .ok_or_else(|| CatalogError::NotFound(format!("rack {rack_id}")))?;
        rack.apply_state(state.clone());
        Ok(())
    }

    async fn get_cluster(&self, cluster_id: &ClusterId) -> CatalogResult<Option<RackCluster>> {
        Ok(self.clusters.get(cluster_id).map(|cluster| cluster.value().clone()))
    }

    async fn find_clusters_containing(&self, rack_id: &RackId) -> CatalogResult<Vec<RackCluster>> {
        Ok(self
            .clusters
            .iter()
            .filter(|cluster| cluster.rack_ids.contains(rack_id))
            .map(|cluster| cluster.value().clone())
            .collect())
    }

    async fn list_clusters(&self) -> CatalogResult<Vec<RackCluster>> {
        let mut clusters: Vec<RackCluster> =
            self.clusters.iter().map(|cluster| cluster.value().clone()).collect();
        clusters.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(clusters)
    }

    async fn get_rule(&self, rule_id: &RuleId) -> CatalogResult<Option<ThresholdRule>> {
        Ok(self.rules.get(rule_id).map(|rule| rule.value().clone()))
    }

    async fn save_cluster_aggregate(&self, aggregate: &ClusterAggregate) -> CatalogResult<()> {
        let mut cluster = self
            .clusters
            .get_mut(&aggregate.cluster_id)
            .ok_or_else(|| CatalogError::NotFound(format!("cluster {}", aggregate.cluster_id)))?;
        cluster.mean_temperature = Some(aggregate.mean_temperature);
        cluster.mean_humidity = Some(aggregate.mean_humidity);
        cluster.desired_actuator_state = aggregate.desired_actuator_state;
        cluster.last_evaluated_at = Some(aggregate.evaluated_at);
        Ok(())
    }

    async fn save_actual_actuator_state(
        &self,
        cluster_id: &ClusterId,
        on: bool,
        at: DateTime<Utc>,
    ) -> CatalogResult<bool> {
        let Some(mut cluster) = self.clusters.get_mut(cluster_id) else {
            return Ok(false);
        };
        cluster.actual_actuator_state = on;
        cluster.last_ack_at = Some(at);
        Ok(true)
    }

    async fn get_actuator_mode(&self, cluster_id: &ClusterId) -> CatalogResult<Option<ActuatorMode>> {
        Ok(self.modes.get(cluster_id).map(|mode| mode.value().clone()))
    }

    async fn save_actuator_mode(&self, mode: &ActuatorMode) -> CatalogResult<()> {
        self.modes.insert(mode.cluster_id.clone(), mode.clone());
        Ok(())
    }

    async fn health_check(&self) -> CatalogResult<HealthStatus> {
        Ok(HealthStatus {
            healthy: true,
            message: "In-memory catalog operational".to_string(),
            metadata: HashMap::from([
                ("backend".to_string(), "memory".to_string()),
                ("racks".to_string(), self.racks.len().to_string()),
                ("clusters".to_string(), self.clusters.len().to_string()),
            ]),
        })
    }

    async fn close(&self) -> CatalogResult<()> {
        debug!("closing in-memory catalog (no-op)");
        Ok(())
    }
}
