use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{HealthError, StoreError};
use crate::sample::PositionSample;

/// Identifier of a persisted session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session_{}", self.0)
    }
}

/// Aggregates written onto the session record
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SessionTotals {
    pub distance_m: f64,
    pub elevation_gain_m: f64,
    pub elevation_loss_m: f64,
    pub energy_kcal: f64,
    pub average_pace_min_per_km: Option<f64>,
    pub average_heart_rate: Option<f64>,
}

/// Session and location-point storage
///
/// Every call names the session it targets so an implementation can refuse
/// calls aimed at a session that has since been completed.
pub trait SessionStore: Send {
    fn create_session(&mut self, load_weight_kg: f64, started_at: f64) -> Result<SessionId, StoreError>;

    fn append_location_point(&mut self, session: SessionId, sample: &PositionSample) -> Result<(), StoreError>;

    /// Annotate the most recently appended point
    fn attach_heart_rate(&mut self, session: SessionId, bpm: f64) -> Result<(), StoreError>;

    fn pause_session(&mut self, session: SessionId) -> Result<(), StoreError>;

    fn resume_session(&mut self, session: SessionId) -> Result<(), StoreError>;

    fn update_totals(&mut self, session: SessionId, totals: &SessionTotals) -> Result<(), StoreError>;

    fn complete_session(&mut self, session: SessionId, ended_at: f64) -> Result<(), StoreError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BodyMetrics {
    pub weight_kg: Option<f64>,
    pub height_m: Option<f64>,
}

/// Body metrics, workout session and heart-rate monitoring. Heart-rate
/// readings themselves arrive as runtime events.
pub trait HealthProvider: Send {
    fn load_body_metrics(&mut self) -> Result<BodyMetrics, HealthError>;

    fn start_workout_session(&mut self) -> Result<(), HealthError>;

    fn end_workout_session(&mut self) -> Result<(), HealthError>;

    fn start_heart_rate_monitoring(&mut self) -> Result<(), HealthError>;

    fn stop_heart_rate_monitoring(&mut self) -> Result<(), HealthError>;
}

/// Accuracy/power profile of the location provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PowerProfile {
    /// Best accuracy, fine distance filter
    Full,
    /// Battery saving while paused or stationary
    Reduced,
}

impl PowerProfile {
    pub fn distance_filter_m(&self) -> f64 {
        match self {
            PowerProfile::Full => 5.0,
            PowerProfile::Reduced => 25.0,
        }
    }
}

/// Control surface of the platform location provider. Fixes are delivered
/// separately through the runtime's event channel.
pub trait LocationProvider: Send {
    fn start_updates(&mut self);

    fn stop_updates(&mut self);

    fn set_power_profile(&mut self, profile: PowerProfile);
}
