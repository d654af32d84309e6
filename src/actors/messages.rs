//! Message types for actor communication
//!
//! ## Design Principles
//!
//! 1. **Commands**: Request/response messages sent to the aggregation actor via mpsc
//! 2. **Frames**: Commands pushed to actuator controllers through their socket's writer task

use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use crate::{ClusterId, RackId};

use super::aggregator::{AggregationError, Evaluation};

/// Commands that can be sent to the AggregatorActor
#[derive(Debug)]
pub enum AggregatorCommand {
    /// Aggregate the cluster owning a rack and auto-dispatch the result
    EvaluateRack {
        rack_id: RackId,
        respond_to: oneshot::Sender<Result<Evaluation, AggregationError>>,
    },

    /// Aggregate one cluster and auto-dispatch the result
    EvaluateCluster {
        cluster_id: ClusterId,
        respond_to: oneshot::Sender<Result<Evaluation, AggregationError>>,
    },

    /// Run a full pass over every cluster, as the periodic tick does
    ///
    /// Responds with the number of clusters that produced a result.
    EvaluateAll {
        respond_to: oneshot::Sender<Result<usize, AggregationError>>,
    },

    /// Gracefully shut down the aggregator
    Shutdown,
}

/// Frame sent from the core to an actuator controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ControlFrame {
    /// `{"type": "AC_CONTROL", "ac": 0|1, "meanTemp": <number|null>}`
    #[serde(rename = "AC_CONTROL", rename_all = "camelCase")]
    AcControl { ac: u8, mean_temp: Option<f64> },
}

impl ControlFrame {
    pub fn ac_control(on: bool, mean_temp: Option<f64>) -> Self {
        ControlFrame::AcControl {
            ac: u8::from(on),
            mean_temp,
        }
    }
}
