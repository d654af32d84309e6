//! Cluster aggregation math
//!
//! The mean is taken over every individual sensor reading of every member rack,
//! not over per-rack dominant values or per-rack averages. A rack that has not
//! heard from any sensor yet simply contributes nothing.

use serde::{Deserialize, Serialize};

use crate::{Metric, SensorReadings, ThresholdCondition};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterMeans {
    pub mean_temperature: f64,
    pub mean_humidity: f64,
    /// Number of sensor readings that went into the means
    pub samples: usize,
}

impl ClusterMeans {
    /// `None` when no sensor of any member rack has reported yet
    pub fn compute<'a, I>(racks: I) -> Option<ClusterMeans>
    where
        I: IntoIterator<Item = &'a SensorReadings>,
    {
        let mut temperature_sum = 0.0;
        let mut humidity_sum = 0.0;
        let mut samples = 0usize;

        for reading in racks.into_iter().flat_map(|readings| readings.values()) {
            temperature_sum += reading.temperature;
            humidity_sum += reading.humidity;
            samples += 1;
        }

        if samples == 0 {
            return None;
        }

        Some(ClusterMeans {
            mean_temperature: round2(temperature_sum / samples as f64),
            mean_humidity: round2(humidity_sum / samples as f64),
            samples,
        })
    }

    /// Desired actuator state under `rule`
    pub fn desired_state(&self, rule: &ThresholdCondition) -> bool {
        let value = match rule.metric {
            Metric::Temperature => self.mean_temperature,
            Metric::Humidity => self.mean_humidity,
        };
        rule.fires(value)
    }
}

/// Round to two decimal places
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
