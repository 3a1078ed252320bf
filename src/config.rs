use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{TrackerError, TrackerResult};

/// Sample filter thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Fixes at or above this horizontal accuracy (meters) are dropped
    pub max_horizontal_accuracy_m: f64,
    /// Minimum seconds between two accepted fixes
    pub min_update_interval_secs: f64,
    /// Capacity of the recent-sample window
    pub window_capacity: usize,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            max_horizontal_accuracy_m: 30.0,
            min_update_interval_secs: 2.0,
            window_capacity: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionConfig {
    /// Sample pairs closer than this (meters) do not add distance
    pub min_distance_m: f64,
    /// Grade is clamped to +/- this percentage
    pub grade_limit_percent: f64,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            min_distance_m: 2.0,
            grade_limit_percent: 20.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoPauseConfig {
    pub enabled: bool,
    /// Displacement between consecutive fixes that counts as movement
    pub movement_threshold_m: f64,
    /// Seconds without movement before auto-pausing
    pub pause_after_secs: f64,
    /// Auto-resume once the last movement is more recent than this
    pub resume_within_secs: f64,
    /// Cadence of the periodic auto-pause evaluation
    pub check_interval_secs: f64,
}

impl Default for AutoPauseConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            movement_threshold_m: 5.0,
            pause_after_secs: 30.0,
            resume_within_secs: 10.0,
            check_interval_secs: 2.0,
        }
    }
}

/// Input clamps for the energy model. Values outside are pulled back in
/// before the load-carriage equation is evaluated.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnergyConfig {
    pub min_speed_ms: f64,
    pub max_speed_ms: f64,
    pub min_body_weight_kg: f64,
    pub max_body_weight_kg: f64,
    pub max_load_weight_kg: f64,
}

impl Default for EnergyConfig {
    fn default() -> Self {
        Self {
            min_speed_ms: 0.5,
            max_speed_ms: 4.5,
            min_body_weight_kg: 30.0,
            max_body_weight_kg: 250.0,
            max_load_weight_kg: 100.0,
        }
    }
}

/// Top-level engine configuration
///
/// Every section falls back to its defaults when missing from the JSON
/// document, so a file only needs to name the values it overrides:
///
/// ```
/// use ruck_tracker::config::TrackerConfig;
///
/// let config = TrackerConfig::from_json_str(r#"{ "auto_pause": { "pause_after_secs": 45.0 } }"#).unwrap();
/// assert_eq!(config.auto_pause.pause_after_secs, 45.0);
/// assert_eq!(config.filter.window_capacity, 5);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub filter: FilterConfig,
    pub motion: MotionConfig,
    pub auto_pause: AutoPauseConfig,
    pub energy: EnergyConfig,
    /// Cadence of the metrics-publish timer
    pub publish_interval_secs: f64,
    /// Used when the health collaborator has no body weight
    pub default_body_weight_kg: f64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            filter: FilterConfig::default(),
            motion: MotionConfig::default(),
            auto_pause: AutoPauseConfig::default(),
            energy: EnergyConfig::default(),
            publish_interval_secs: 1.0,
            default_body_weight_kg: 70.0,
        }
    }
}

impl TrackerConfig {
    pub fn from_json_str(json: &str) -> TrackerResult<Self> {
        let config: TrackerConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> TrackerResult<Self> {
        let json = fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Reject configurations the engine cannot run with
    pub fn validate(&self) -> TrackerResult<()> {
        fn positive(name: &str, value: f64) -> TrackerResult<()> {
            if value.is_finite() && value > 0.0 {
                Ok(())
            } else {
                Err(TrackerError::InvalidConfig(format!(
                    "{} must be positive, got {}",
                    name, value
                )))
            }
        }

        positive("filter.max_horizontal_accuracy_m", self.filter.max_horizontal_accuracy_m)?;
        if !(self.filter.min_update_interval_secs >= 0.0) {
            return Err(TrackerError::InvalidConfig(
                "filter.min_update_interval_secs must not be negative".to_string(),
            ));
        }
        if self.filter.window_capacity < 2 {
            return Err(TrackerError::InvalidConfig(
                "filter.window_capacity must hold at least two samples".to_string(),
            ));
        }

        positive("motion.min_distance_m", self.motion.min_distance_m)?;
        positive("motion.grade_limit_percent", self.motion.grade_limit_percent)?;

        positive("auto_pause.movement_threshold_m", self.auto_pause.movement_threshold_m)?;
        positive("auto_pause.pause_after_secs", self.auto_pause.pause_after_secs)?;
        positive("auto_pause.resume_within_secs", self.auto_pause.resume_within_secs)?;
        positive("auto_pause.check_interval_secs", self.auto_pause.check_interval_secs)?;
        if self.auto_pause.resume_within_secs >= self.auto_pause.pause_after_secs {
            return Err(TrackerError::InvalidConfig(
                "auto_pause.resume_within_secs must be below pause_after_secs".to_string(),
            ));
        }

        positive("energy.min_speed_ms", self.energy.min_speed_ms)?;
        if !(self.energy.max_speed_ms > self.energy.min_speed_ms) {
            return Err(TrackerError::InvalidConfig(
                "energy.max_speed_ms must exceed min_speed_ms".to_string(),
            ));
        }
        positive("energy.min_body_weight_kg", self.energy.min_body_weight_kg)?;
        if !(self.energy.max_body_weight_kg > self.energy.min_body_weight_kg) {
            return Err(TrackerError::InvalidConfig(
                "energy.max_body_weight_kg must exceed min_body_weight_kg".to_string(),
            ));
        }
        if !(self.energy.max_load_weight_kg >= 0.0) {
            return Err(TrackerError::InvalidConfig(
                "energy.max_load_weight_kg must not be negative".to_string(),
            ));
        }

        positive("publish_interval_secs", self.publish_interval_secs)?;
        positive("default_body_weight_kg", self.default_body_weight_kg)?;

        Ok(())
    }
}
