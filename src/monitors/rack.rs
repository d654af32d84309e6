//! Rack alert evaluation
//!
//! ```text
//! sensor readings ──► dominant reading (max temperature) ──► conditions ──► flags
//! ```
//!
//! A rack may carry several conditions for the same metric. The metric's flag is
//! raised as soon as one of them fires.

use serde::{Deserialize, Serialize};

use crate::{DominantReading, Metric, SensorReadings, ThresholdCondition};

/// Derived alert state of a rack
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RackEvaluation {
    pub temperature_alert: bool,
    pub humidity_alert: bool,
    pub dominant: Option<DominantReading>,
}

impl RackEvaluation {
    pub fn evaluate(readings: &SensorReadings, conditions: &[ThresholdCondition]) -> RackEvaluation {
        let Some(dominant) = dominant_reading(readings) else {
            return RackEvaluation::default();
        };

        let fires = |metric: Metric| {
            conditions
                .iter()
                .filter(|condition| condition.metric == metric)
                .any(|condition| condition.fires_on(dominant.temperature, dominant.humidity))
        };

        RackEvaluation {
            temperature_alert: fires(Metric::Temperature),
            humidity_alert: fires(Metric::Humidity),
            dominant: Some(dominant),
        }
    }

    pub fn alert_count(&self) -> usize {
        usize::from(self.temperature_alert) + usize::from(self.humidity_alert)
    }
}

/// Reading with the highest temperature.
///
/// On a tie the first one in iteration order (lowest sensor id) wins.
pub fn dominant_reading(readings: &SensorReadings) -> Option<DominantReading> {
    let mut dominant: Option<DominantReading> = None;

    for (sensor_id, reading) in readings {
        let higher = dominant
            .as_ref()
            .is_none_or(|current| reading.temperature > current.temperature);

        if higher {
            dominant = Some(DominantReading {
                sensor_id: sensor_id.clone(),
                sensor_name: reading.sensor_name.clone(),
                temperature: reading.temperature,
                humidity: reading.humidity,
            });
        }
    }

    dominant
}
