//! API shared state containing the core handles

use std::sync::Arc;
use std::time::Duration;

use crate::{
    actors::{
        actuator::{ActuatorRegistry, ControlGate},
        aggregator::{AggregatorHandle, ClusterAggregator},
        rack_state::RackStateCache,
    },
    catalog::CatalogStore,
};

/// Shared state passed to all handlers
#[derive(Clone)]
pub struct ApiState {
    /// Catalog for the read-only views
    pub catalog: Arc<dyn CatalogStore>,

    /// Telemetry ingest path
    pub racks: Arc<RackStateCache>,

    /// Auto/manual gate and the actuator registry behind it
    pub gate: ControlGate,

    /// Handle to the aggregation actor
    pub aggregator: AggregatorHandle,

    /// Sockets silent for longer than this are closed
    pub idle_timeout: Option<Duration>,
}

impl ApiState {
    /// Build the core around `catalog` and spawn the aggregation actor
    pub fn new(
        catalog: Arc<dyn CatalogStore>,
        aggregation_period: Option<Duration>,
        idle_timeout: Option<Duration>,
    ) -> Self {
        let gate = ControlGate::new(catalog.clone(), ActuatorRegistry::new());
        let aggregator = AggregatorHandle::spawn(
            ClusterAggregator::new(catalog.clone()),
            gate.clone(),
            aggregation_period,
        );

        Self {
            racks: Arc::new(RackStateCache::new(catalog.clone())),
            catalog,
            gate,
            aggregator,
            idle_timeout,
        }
    }

    pub fn registry(&self) -> &ActuatorRegistry {
        self.gate.registry()
    }
}
