use serde::{Deserialize, Serialize};
use std::fmt;

/// Position fix from the platform location provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionSample {
    /// Seconds since the Unix epoch
    pub timestamp: f64,
    pub latitude: f64,
    pub longitude: f64,
    /// Meters above sea level
    pub altitude: f64,
    pub horizontal_accuracy: f64,
    #[serde(default)]
    pub vertical_accuracy: f64,
    /// Course over ground in degrees, negative when unknown
    #[serde(default = "unknown_heading")]
    pub heading: f64,
    /// Meters per second, negative when unknown
    #[serde(default)]
    pub speed: f64,
}

fn unknown_heading() -> f64 {
    -1.0
}

impl PositionSample {
    pub fn new(
        timestamp: f64,
        latitude: f64,
        longitude: f64,
        altitude: f64,
        horizontal_accuracy: f64,
        speed: f64,
    ) -> Self {
        Self {
            timestamp,
            latitude,
            longitude,
            altitude,
            horizontal_accuracy,
            vertical_accuracy: horizontal_accuracy,
            heading: unknown_heading(),
            speed,
        }
    }

    pub fn with_heading(mut self, heading: f64) -> Self {
        self.heading = heading;
        self
    }

    pub fn with_vertical_accuracy(mut self, vertical_accuracy: f64) -> Self {
        self.vertical_accuracy = vertical_accuracy;
        self
    }
}

/// Coarse classification of a fix's horizontal accuracy
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityTier {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl QualityTier {
    /// Boundaries are inclusive on the better tier: 8.0 is excellent,
    /// 15.0 good, 25.0 fair. NaN lands in `Poor`.
    pub fn from_accuracy(horizontal_accuracy: f64) -> Self {
        if horizontal_accuracy <= 8.0 {
            QualityTier::Excellent
        } else if horizontal_accuracy <= 15.0 {
            QualityTier::Good
        } else if horizontal_accuracy <= 25.0 {
            QualityTier::Fair
        } else {
            QualityTier::Poor
        }
    }
}

impl fmt::Display for QualityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            QualityTier::Excellent => "excellent",
            QualityTier::Good => "good",
            QualityTier::Fair => "fair",
            QualityTier::Poor => "poor",
        };
        f.write_str(label)
    }
}
