use crate::collaborators::{BodyMetrics, HealthProvider};
use crate::error::HealthError;

/// Health collaborator backed by fixed body metrics
///
/// Stands in for the platform health store when replaying recorded tracks
/// or in tests; it records whether a workout and heart-rate monitoring are
/// running so callers can check the controller's bookkeeping.
#[derive(Debug, Clone, Default)]
pub struct StaticHealthProvider {
    metrics: Option<BodyMetrics>,
    workout_running: bool,
    heart_rate_monitoring: bool,
    workouts_started: u32,
}

impl StaticHealthProvider {
    pub fn new(weight_kg: Option<f64>, height_m: Option<f64>) -> Self {
        StaticHealthProvider {
            metrics: Some(BodyMetrics {
                weight_kg,
                height_m,
            }),
            ..Self::default()
        }
    }

    pub fn with_weight(weight_kg: f64) -> Self {
        Self::new(Some(weight_kg), None)
    }

    /// Body metrics cannot be read at all
    pub fn unavailable() -> Self {
        Self::default()
    }

    pub fn is_workout_running(&self) -> bool {
        self.workout_running
    }

    pub fn is_monitoring_heart_rate(&self) -> bool {
        self.heart_rate_monitoring
    }

    pub fn workouts_started(&self) -> u32 {
        self.workouts_started
    }
}

impl HealthProvider for StaticHealthProvider {
    fn load_body_metrics(&mut self) -> Result<BodyMetrics, HealthError> {
        self.metrics
            .ok_or_else(|| HealthError::Unavailable("no body metrics recorded".to_string()))
    }

    fn start_workout_session(&mut self) -> Result<(), HealthError> {
        if self.workout_running {
            return Err(HealthError::WorkoutAlreadyRunning);
        }
        self.workout_running = true;
        self.workouts_started += 1;
        Ok(())
    }

    fn end_workout_session(&mut self) -> Result<(), HealthError> {
        if !self.workout_running {
            return Err(HealthError::NoWorkoutRunning);
        }
        self.workout_running = false;
        Ok(())
    }

    fn start_heart_rate_monitoring(&mut self) -> Result<(), HealthError> {
        self.heart_rate_monitoring = true;
        Ok(())
    }

    fn stop_heart_rate_monitoring(&mut self) -> Result<(), HealthError> {
        self.heart_rate_monitoring = false;
        Ok(())
    }
}
