//! Cluster aggregation and the AggregatorActor
//!
//! [`ClusterAggregator`] recomputes one cluster from its member racks:
//!
//! ```text
//! member racks ──► every sensor reading ──► means (2 dp) ──► rule ──► desired state
//! ```
//!
//! It runs on demand, never from the telemetry path. [`AggregatorActor`] owns
//! the aggregator and the control gate, serves evaluation requests, and
//! optionally re-evaluates every cluster on a fixed interval so that auto-mode
//! actuators converge even after a missed command.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at};
use tracing::{debug, error, info, instrument, warn};

use crate::{
    ClusterId, RackId, RuleId,
    catalog::{CatalogError, CatalogStore, ClusterAggregate, RackCluster},
    monitors::cluster::ClusterMeans,
};

use super::actuator::{ControlError, ControlGate, DispatchOutcome};
use super::messages::AggregatorCommand;

/// Outcome of aggregating one cluster
#[derive(Debug, Clone, PartialEq)]
pub enum Aggregation {
    /// Means and desired state computed and persisted
    Computed(ClusterAggregate),
    /// No member rack has a sensor reading; nothing was persisted
    InsufficientData(ClusterId),
    /// The cluster's threshold rule is not in the catalog; nothing was persisted
    RuleMissing { cluster_id: ClusterId, rule_id: RuleId },
    /// The cluster (or, for a rack request, any owning cluster) does not exist
    NotFound,
}

#[derive(Debug, Error)]
pub enum AggregationError {
    #[error("rack '{rack_id}' belongs to several clusters: {clusters:?}")]
    AmbiguousMembership {
        rack_id: RackId,
        clusters: Vec<ClusterId>,
    },

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Control(#[from] ControlError),

    #[error("aggregator unavailable: {0}")]
    Unavailable(String),
}

/// Aggregation plus what happened to its result at the gate
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub aggregation: Aggregation,
    /// `None` unless a result was computed
    pub dispatch: Option<DispatchOutcome>,
}

#[derive(Clone)]
pub struct ClusterAggregator {
    catalog: Arc<dyn CatalogStore>,
}

impl ClusterAggregator {
    pub fn new(catalog: Arc<dyn CatalogStore>) -> Self {
        Self { catalog }
    }

    /// Aggregate the cluster that contains `rack_id`
    #[instrument(skip(self))]
    pub async fn aggregate_rack(&self, rack_id: &RackId) -> Result<Aggregation, AggregationError> {
        let mut clusters = self.catalog.find_clusters_containing(rack_id).await?;

        match clusters.len() {
            0 => {
                debug!("rack is not a member of any cluster");
                Ok(Aggregation::NotFound)
            }
            1 => self.aggregate(clusters.remove(0)).await,
            _ => Err(AggregationError::AmbiguousMembership {
                rack_id: rack_id.clone(),
                clusters: clusters.into_iter().map(|cluster| cluster.id).collect(),
            }),
        }
    }

    #[instrument(skip(self))]
    pub async fn aggregate_cluster(
        &self,
        cluster_id: &ClusterId,
    ) -> Result<Aggregation, AggregationError> {
        match self.catalog.get_cluster(cluster_id).await? {
            Some(cluster) => self.aggregate(cluster).await,
            None => Ok(Aggregation::NotFound),
        }
    }

    async fn aggregate(&self, cluster: RackCluster) -> Result<Aggregation, AggregationError> {
        let racks = self.catalog.get_racks(&cluster.rack_ids).await?;

        let Some(means) = ClusterMeans::compute(racks.iter().map(|rack| &rack.sensor_readings))
        else {
            info!("cluster {}: no sensors reporting, nothing persisted", cluster.id);
            return Ok(Aggregation::InsufficientData(cluster.id));
        };

        let Some(rule) = self.catalog.get_rule(&cluster.rule_id).await? else {
            warn!(
                "cluster {}: rule '{}' not found, nothing persisted",
                cluster.id, cluster.rule_id
            );
            return Ok(Aggregation::RuleMissing {
                cluster_id: cluster.id,
                rule_id: cluster.rule_id,
            });
        };

        let aggregate = ClusterAggregate {
            cluster_id: cluster.id,
            mean_temperature: means.mean_temperature,
            mean_humidity: means.mean_humidity,
            desired_actuator_state: means.desired_state(&rule.condition),
            evaluated_at: Utc::now(),
        };

        self.catalog.save_cluster_aggregate(&aggregate).await?;

        debug!(
            "cluster {}: {} samples, mean {:.2} C / {:.2} %, {} -> desired {}",
            aggregate.cluster_id,
            means.samples,
            aggregate.mean_temperature,
            aggregate.mean_humidity,
            rule.condition,
            aggregate.desired_actuator_state
        );

        Ok(Aggregation::Computed(aggregate))
    }
}

/// Actor that aggregates clusters and hands results to the control gate
pub struct AggregatorActor {
    aggregator: ClusterAggregator,
    gate: ControlGate,
    command_rx: mpsc::Receiver<AggregatorCommand>,
    /// `None` disables the periodic pass
    period: Option<Duration>,
}

impl AggregatorActor {
    pub fn new(
        aggregator: ClusterAggregator,
        gate: ControlGate,
        command_rx: mpsc::Receiver<AggregatorCommand>,
        period: Option<Duration>,
    ) -> Self {
        Self {
            aggregator,
            gate,
            command_rx,
            period,
        }
    }

    /// Run the actor's main loop
    ///
    /// This runs until:
    /// - A Shutdown command is received
    /// - The command channel is closed
    #[instrument(skip(self))]
    pub async fn run(mut self) {
        debug!("starting aggregator actor");

        let mut ticker = self.period.map(|period| {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker
        });

        loop {
            tokio::select! {
                _ = next_tick(&mut ticker) => {
                    if let Err(e) = self.evaluate_all().await {
                        error!("periodic aggregation failed: {e}");
                    }
                }

                cmd = self.command_rx.recv() => {
                    match cmd {
                        Some(AggregatorCommand::EvaluateRack { rack_id, respond_to }) => {
                            let result = match self.aggregator.aggregate_rack(&rack_id).await {
                                Ok(aggregation) => self.dispatch(aggregation).await,
                                Err(e) => Err(e),
                            };
                            let _ = respond_to.send(result);
                        }

                        Some(AggregatorCommand::EvaluateCluster { cluster_id, respond_to }) => {
                            let result = self.evaluate_cluster(&cluster_id).await;
                            let _ = respond_to.send(result);
                        }

                        Some(AggregatorCommand::EvaluateAll { respond_to }) => {
                            let _ = respond_to.send(self.evaluate_all().await);
                        }

                        Some(AggregatorCommand::Shutdown) => {
                            debug!("received shutdown command");
                            break;
                        }

                        None => {
                            warn!("command channel closed, shutting down");
                            break;
                        }
                    }
                }
            }
        }

        debug!("aggregator actor stopped");
    }

    async fn evaluate_cluster(&self, cluster_id: &ClusterId) -> Result<Evaluation, AggregationError> {
        let aggregation = self.aggregator.aggregate_cluster(cluster_id).await?;
        self.dispatch(aggregation).await
    }

    async fn dispatch(&self, aggregation: Aggregation) -> Result<Evaluation, AggregationError> {
        let dispatch = match &aggregation {
            Aggregation::Computed(aggregate) => Some(self.gate.auto_dispatch(aggregate).await?),
            Aggregation::InsufficientData(_)
            | Aggregation::RuleMissing { .. }
            | Aggregation::NotFound => None,
        };

        Ok(Evaluation {
            aggregation,
            dispatch,
        })
    }

    /// Evaluate every cluster; one failing cluster does not stop the pass
    async fn evaluate_all(&self) -> Result<usize, AggregationError> {
        let clusters = self.aggregator.catalog.list_clusters().await?;
        let mut computed = 0;

        for cluster in &clusters {
            match self.evaluate_cluster(&cluster.id).await {
                Ok(Evaluation {
                    aggregation: Aggregation::Computed(_),
                    ..
                }) => computed += 1,
                Ok(_) => {}
                Err(e) => warn!("cluster {}: evaluation failed: {e}", cluster.id),
            }
        }

        debug!("evaluated {} clusters, {computed} with results", clusters.len());
        Ok(computed)
    }
}

async fn next_tick(ticker: &mut Option<Interval>) -> Instant {
    match ticker {
        Some(ticker) => ticker.tick().await,
        None => std::future::pending().await,
    }
}

/// Handle for controlling the AggregatorActor
///
/// Cheap to clone and shared by the API handlers.
#[derive(Clone)]
pub struct AggregatorHandle {
    sender: mpsc::Sender<AggregatorCommand>,
}

impl AggregatorHandle {
    /// Spawn the aggregator actor
    pub fn spawn(aggregator: ClusterAggregator, gate: ControlGate, period: Option<Duration>) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(32);

        let actor = AggregatorActor::new(aggregator, gate, cmd_rx, period);

        tokio::spawn(actor.run());

        Self { sender: cmd_tx }
    }

    /// Aggregate one cluster and auto-dispatch the result
    pub async fn evaluate_cluster(&self, cluster_id: ClusterId) -> Result<Evaluation, AggregationError> {
        self.request(|respond_to| AggregatorCommand::EvaluateCluster {
            cluster_id,
            respond_to,
        })
        .await?
    }

    /// Aggregate the cluster owning `rack_id` and auto-dispatch the result
    pub async fn evaluate_rack(&self, rack_id: RackId) -> Result<Evaluation, AggregationError> {
        self.request(|respond_to| AggregatorCommand::EvaluateRack {
            rack_id,
            respond_to,
        })
        .await?
    }

    /// Evaluate every cluster now; returns how many produced a result
    pub async fn evaluate_all(&self) -> Result<usize, AggregationError> {
        self.request(|respond_to| AggregatorCommand::EvaluateAll { respond_to })
            .await?
    }

    /// Gracefully shut down the aggregator
    pub async fn shutdown(&self) -> anyhow::Result<()> {
        self.sender
            .send(AggregatorCommand::Shutdown)
            .await
            .context("failed to send Shutdown command")?;
        Ok(())
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> AggregatorCommand,
    ) -> Result<T, AggregationError> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(command(tx))
            .await
            .map_err(|_| AggregationError::Unavailable("failed to send command".to_string()))?;

        rx.await
            .map_err(|_| AggregationError::Unavailable("failed to receive response".to_string()))
    }
}
