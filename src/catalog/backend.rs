//! Catalog store trait definition
//!
//! This module defines the `CatalogStore` trait that every catalog backend
//! implements. It is deliberately narrow: lookups the ingest and aggregation
//! paths need, plus writes for the handful of fields the core maintains.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{ClusterId, DataCenterId, HubId, RackId, RuleId, SensorId};

use super::error::CatalogResult;
use super::schema::{
    ActuatorMode, CatalogSeed, ClusterAggregate, Hub, Rack, RackCluster, RackState, Sensor,
    ThresholdRule,
};

/// Health status of the catalog backend
#[derive(Debug, Clone)]
pub struct HealthStatus {
    /// Is the backend operational?
    pub healthy: bool,

    /// Human-readable status message
    pub message: String,

    /// Additional backend-specific metadata
    pub metadata: HashMap<String, String>,
}

/// Trait for catalog backends
///
/// Implementations must be `Send + Sync`; they are shared across the socket
/// handlers and the aggregation actor as `Arc<dyn CatalogStore>`.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Insert or replace every record in `seed`.
    ///
    /// Fails with `CatalogError::Conflict` if a rack would end up in more
    /// than one cluster.
    async fn import(&self, seed: CatalogSeed) -> CatalogResult<()>;

    async fn find_hub(&self, hub_id: &HubId) -> CatalogResult<Option<Hub>>;

    /// Sensor registered under `hub_id` with the given name
    async fn find_sensor(&self, hub_id: &HubId, name: &str) -> CatalogResult<Option<Sensor>>;

    /// Rack of `hub_id` that currently has `sensor_id` assigned
    async fn find_rack_by_sensor(
        &self,
        hub_id: &HubId,
        sensor_id: &SensorId,
    ) -> CatalogResult<Option<Rack>>;

    async fn get_rack(&self, rack_id: &RackId) -> CatalogResult<Option<Rack>>;

    /// Racks with the given ids, in the order given; unknown ids are skipped
    async fn get_racks(&self, rack_ids: &[RackId]) -> CatalogResult<Vec<Rack>>;

    async fn list_racks_in_data_center(
        &self,
        data_center_id: &DataCenterId,
    ) -> CatalogResult<Vec<Rack>>;

    /// Persist readings and derived flags of a rack in a single write
    async fn save_rack_state(&self, rack_id: &RackId, state: &RackState) -> CatalogResult<()>;

    async fn get_cluster(&self, cluster_id: &ClusterId) -> CatalogResult<Option<RackCluster>>;

    /// Every cluster listing `rack_id` as a member.
    ///
    /// With a consistent catalog this holds at most one entry.
    async fn find_clusters_containing(&self, rack_id: &RackId) -> CatalogResult<Vec<RackCluster>>;

    async fn list_clusters(&self) -> CatalogResult<Vec<RackCluster>>;

    async fn get_rule(&self, rule_id: &RuleId) -> CatalogResult<Option<ThresholdRule>>;

    /// Persist means and desired state; leaves the acknowledged state alone
    async fn save_cluster_aggregate(&self, aggregate: &ClusterAggregate) -> CatalogResult<()>;

    /// Persist the actuator state acknowledged by the controller.
    ///
    /// Returns `false` if the cluster does not exist.
    async fn save_actual_actuator_state(
        &self,
        cluster_id: &ClusterId,
        on: bool,
        at: DateTime<Utc>,
    ) -> CatalogResult<bool>;

    async fn get_actuator_mode(&self, cluster_id: &ClusterId) -> CatalogResult<Option<ActuatorMode>>;

    async fn save_actuator_mode(&self, mode: &ActuatorMode) -> CatalogResult<()>;

    /// Check backend health
    async fn health_check(&self) -> CatalogResult<HealthStatus>;

    /// Close the backend and release resources
    async fn close(&self) -> CatalogResult<()>;
}
