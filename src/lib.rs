pub mod actors;
pub mod api;
pub mod catalog;
pub mod config;
pub mod monitors;
pub mod util;

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

macro_rules! catalog_id {
    ($($(#[$meta:meta])* $name:ident),* $(,)?) => {
        $(
            $(#[$meta])*
            #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
            #[serde(transparent)]
            pub struct $name(pub String);

            impl $name {
                pub fn new(id: impl Into<String>) -> Self {
                    Self(id.into())
                }

                pub fn as_str(&self) -> &str {
                    &self.0
                }
            }

            impl fmt::Display for $name {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.write_str(&self.0)
                }
            }

            impl From<&str> for $name {
                fn from(id: &str) -> Self {
                    Self(id.to_string())
                }
            }
        )*
    };
}

catalog_id!(
    /// Catalog id of a data center
    DataCenterId,
    /// Catalog id of a physical hub
    HubId,
    /// Catalog id of a sensor
    SensorId,
    /// Catalog id of a rack
    RackId,
    /// Catalog id of a rack cluster
    ClusterId,
    /// Catalog id of a cluster threshold rule
    RuleId,
);

/// Metric a threshold applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    #[serde(alias = "temp")]
    Temperature,
    Humidity,
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Metric::Temperature => write!(f, "temperature"),
            Metric::Humidity => write!(f, "humidity"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    #[serde(rename = "<")]
    LessThan,
    #[serde(rename = ">")]
    GreaterThan,
}

impl Operator {
    pub fn symbol(&self) -> &'static str {
        match self {
            Operator::LessThan => "<",
            Operator::GreaterThan => ">",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// `metric operator threshold`, e.g. `temperature > 35`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdCondition {
    pub metric: Metric,
    pub operator: Operator,
    pub threshold: f64,
}

impl ThresholdCondition {
    pub fn new(metric: Metric, operator: Operator, threshold: f64) -> Self {
        Self {
            metric,
            operator,
            threshold,
        }
    }

    /// Whether `value` fires this condition (strict comparison)
    pub fn fires(&self, value: f64) -> bool {
        match self.operator {
            Operator::GreaterThan => value > self.threshold,
            Operator::LessThan => value < self.threshold,
        }
    }

    /// Picks this condition's metric out of a temperature/humidity pair and checks it
    pub fn fires_on(&self, temperature: f64, humidity: f64) -> bool {
        match self.metric {
            Metric::Temperature => self.fires(temperature),
            Metric::Humidity => self.fires(humidity),
        }
    }
}

impl fmt::Display for ThresholdCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.metric, self.operator, self.threshold)
    }
}

/// Last known value reported by one sensor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorReading {
    pub sensor_name: String,
    pub temperature: f64,
    pub humidity: f64,
    pub observed_at: DateTime<Utc>,
}

/// Readings keyed by sensor id, at most one per sensor.
///
/// Iteration is ascending by sensor id, which is what "first encountered"
/// means when two sensors tie for the highest temperature.
pub type SensorReadings = BTreeMap<SensorId, SensorReading>;

/// The reading of the sensor currently reporting the highest temperature on a rack
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DominantReading {
    pub sensor_id: SensorId,
    pub sensor_name: String,
    pub temperature: f64,
    pub humidity: f64,
}
