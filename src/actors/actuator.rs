//! Actuator dispatch channel and the auto/manual control gate
//!
//! ## Registry
//!
//! One outbound link per cluster. A controller's socket registers its writer
//! queue under the cluster id it announced; a newer registration replaces an
//! older one, and a close only unregisters the link it created.
//!
//! ```text
//! UNREGISTERED ──REGISTER──► REGISTERED ──close──► UNREGISTERED
//! ```
//!
//! ## Gate
//!
//! Every command reaching an actuator goes through [`ControlGate`]:
//!
//! - **Auto dispatch**: aggregation results are forwarded only while
//!   `auto_enabled` is set
//! - **Manual dispatch**: accepted only while `auto_enabled` is clear
//! - **Acknowledgement**: the only writer of the actual actuator state
//!
//! Sending never queues for an absent controller. The next aggregation pass
//! re-sends the current desired state.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use dashmap::DashMap;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};

use crate::{
    ClusterId,
    catalog::{ActuatorMode, CatalogError, CatalogStore, ClusterAggregate},
    util::KeyedLocks,
};

use super::messages::ControlFrame;

/// Outcome of one attempt to command an actuator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome", content = "reason")]
pub enum DispatchOutcome {
    /// Handed to the controller's socket
    Dispatched,
    /// Nothing was sent; not an error
    Skipped(SkipReason),
    /// Refused by the gate
    Rejected(RejectReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// No controller registered for the cluster, or its socket is gone
    NotConnected,
    /// Aggregation result while the cluster is in manual mode
    AutoDisabled,
    /// The controller's socket is not draining its queue
    Congested,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    ManualWhileAuto,
}

impl DispatchOutcome {
    /// Short machine-readable label, e.g. `not_connected`
    pub fn label(&self) -> &'static str {
        match self {
            DispatchOutcome::Dispatched => "dispatched",
            DispatchOutcome::Skipped(SkipReason::NotConnected) => "not_connected",
            DispatchOutcome::Skipped(SkipReason::AutoDisabled) => "auto_disabled",
            DispatchOutcome::Skipped(SkipReason::Congested) => "congested",
            DispatchOutcome::Rejected(RejectReason::ManualWhileAuto) => "manual_while_auto",
        }
    }
}

#[derive(Debug, Error)]
pub enum ControlError {
    #[error("unknown cluster '{0}'")]
    UnknownCluster(ClusterId),

    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

/// Identifies one controller socket
pub type ConnectionId = u64;

#[derive(Debug, Clone)]
struct ActuatorLink {
    conn_id: ConnectionId,
    sender: mpsc::Sender<ControlFrame>,
}

/// Cluster id to controller socket
#[derive(Clone, Default)]
pub struct ActuatorRegistry {
    links: Arc<DashMap<ClusterId, ActuatorLink>>,
    next_conn_id: Arc<AtomicU64>,
}

impl ActuatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_connection_id(&self) -> ConnectionId {
        self.next_conn_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Route commands for `cluster_id` to `sender`, replacing any earlier link.
    ///
    /// Returns `true` if an earlier link was replaced.
    pub fn register(
        &self,
        cluster_id: ClusterId,
        conn_id: ConnectionId,
        sender: mpsc::Sender<ControlFrame>,
    ) -> bool {
        let previous = self
            .links
            .insert(cluster_id, ActuatorLink { conn_id, sender });

        previous.is_some_and(|link| link.conn_id != conn_id)
    }

    /// Drop the link of `cluster_id` if it still belongs to `conn_id`
    pub fn unregister(&self, cluster_id: &ClusterId, conn_id: ConnectionId) -> bool {
        self.links
            .remove_if(cluster_id, |_, link| link.conn_id == conn_id)
            .is_some()
    }

    pub fn is_registered(&self, cluster_id: &ClusterId) -> bool {
        self.links.contains_key(cluster_id)
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// Queue `frame` on the cluster's socket without waiting
    pub fn send(&self, cluster_id: &ClusterId, frame: ControlFrame) -> Result<(), SkipReason> {
        // the map guard must be gone before remove_if below touches the same shard
        let attempt = match self.links.get(cluster_id) {
            Some(link) => (link.conn_id, link.sender.try_send(frame)),
            None => return Err(SkipReason::NotConnected),
        };

        match attempt {
            (_, Ok(())) => Ok(()),
            (_, Err(mpsc::error::TrySendError::Full(_))) => Err(SkipReason::Congested),
            (conn_id, Err(mpsc::error::TrySendError::Closed(_))) => {
                self.unregister(cluster_id, conn_id);
                Err(SkipReason::NotConnected)
            }
        }
    }
}

/// Auto/manual gate in front of the actuator registry
#[derive(Clone)]
pub struct ControlGate {
    catalog: Arc<dyn CatalogStore>,
    registry: ActuatorRegistry,
    locks: Arc<KeyedLocks<ClusterId>>,
}

impl ControlGate {
    pub fn new(catalog: Arc<dyn CatalogStore>, registry: ActuatorRegistry) -> Self {
        Self {
            catalog,
            registry,
            locks: Arc::new(KeyedLocks::new()),
        }
    }

    pub fn registry(&self) -> &ActuatorRegistry {
        &self.registry
    }

    /// Current mode; a cluster without a record is manual with the actuator off
    pub async fn mode(&self, cluster_id: &ClusterId) -> Result<ActuatorMode, ControlError> {
        Ok(self
            .catalog
            .get_actuator_mode(cluster_id)
            .await?
            .unwrap_or_else(|| ActuatorMode::manual_default(cluster_id.clone())))
    }

    /// Forward an aggregation result if the cluster is in auto mode
    #[instrument(skip(self, aggregate), fields(cluster_id = %aggregate.cluster_id))]
    pub async fn auto_dispatch(
        &self,
        aggregate: &ClusterAggregate,
    ) -> Result<DispatchOutcome, ControlError> {
        let _guard = self.locks.lock(&aggregate.cluster_id).await;

        let mode = self.mode(&aggregate.cluster_id).await?;
        if !mode.auto_enabled {
            debug!("auto mode disabled, not dispatching");
            return Ok(DispatchOutcome::Skipped(SkipReason::AutoDisabled));
        }

        let frame = ControlFrame::ac_control(
            aggregate.desired_actuator_state,
            Some(aggregate.mean_temperature),
        );

        Ok(self.dispatch(&aggregate.cluster_id, frame))
    }

    /// Operator command; refused while the cluster is in auto mode
    #[instrument(skip(self))]
    pub async fn manual_command(
        &self,
        cluster_id: &ClusterId,
        on: bool,
    ) -> Result<DispatchOutcome, ControlError> {
        self.ensure_cluster(cluster_id).await?;

        let _guard = self.locks.lock(cluster_id).await;

        let mut mode = self.mode(cluster_id).await?;
        if mode.auto_enabled {
            warn!("manual command rejected, auto mode is enabled");
            return Ok(DispatchOutcome::Rejected(RejectReason::ManualWhileAuto));
        }

        mode.manual_command = on;
        mode.updated_at = Utc::now();
        self.catalog.save_actuator_mode(&mode).await?;

        Ok(self.dispatch(cluster_id, ControlFrame::ac_control(on, None)))
    }

    /// Switch auto mode; enabling it discards any pending manual command
    #[instrument(skip(self))]
    pub async fn set_auto_mode(
        &self,
        cluster_id: &ClusterId,
        enabled: bool,
    ) -> Result<ActuatorMode, ControlError> {
        self.ensure_cluster(cluster_id).await?;

        let _guard = self.locks.lock(cluster_id).await;

        let mut mode = self.mode(cluster_id).await?;
        mode.auto_enabled = enabled;
        if enabled {
            mode.manual_command = false;
        }
        mode.updated_at = Utc::now();
        self.catalog.save_actuator_mode(&mode).await?;

        info!("auto mode {}", if enabled { "enabled" } else { "disabled" });
        Ok(mode)
    }

    /// Record the state a controller reports for its actuator
    #[instrument(skip(self))]
    pub async fn acknowledge(&self, cluster_id: &ClusterId, on: bool) -> Result<(), ControlError> {
        if !self
            .catalog
            .save_actual_actuator_state(cluster_id, on, Utc::now())
            .await?
        {
            return Err(ControlError::UnknownCluster(cluster_id.clone()));
        }

        debug!("actuator reports {}", if on { "on" } else { "off" });
        Ok(())
    }

    fn dispatch(&self, cluster_id: &ClusterId, frame: ControlFrame) -> DispatchOutcome {
        match self.registry.send(cluster_id, frame.clone()) {
            Ok(()) => {
                debug!("dispatched {frame:?} to cluster {cluster_id}");
                DispatchOutcome::Dispatched
            }
            Err(reason) => {
                warn!("actuator for cluster {cluster_id} not reachable ({reason:?}), command dropped");
                DispatchOutcome::Skipped(reason)
            }
        }
    }

    async fn ensure_cluster(&self, cluster_id: &ClusterId) -> Result<(), ControlError> {
        match self.catalog.get_cluster(cluster_id).await? {
            Some(_) => Ok(()),
            None => Err(ControlError::UnknownCluster(cluster_id.clone())),
        }
    }
}
