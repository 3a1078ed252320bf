use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fs;

use crate::collaborators::{SessionId, SessionTotals};
use crate::energy::TerrainBand;
use crate::motion::MetricsDelta;
use crate::sample::QualityTier;

const HEART_RATE_HISTORY: usize = 10;

/// Session state machine states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackingState {
    /// No session; initial and terminal
    Stopped,
    /// Consuming fixes and accumulating metrics
    Tracking,
    /// Explicitly paused by the user
    Paused,
}

/// Running aggregate for one session
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SessionMetrics {
    pub distance_m: f64,
    pub elevation_gain_m: f64,
    pub elevation_loss_m: f64,
    /// Percent, within +/-20
    pub grade_percent: f64,
    pub current_speed_ms: f64,
    /// Minutes per kilometer; 0 until a fix reports speed
    pub current_pace_min_per_km: f64,
    pub average_pace_min_per_km: f64,
    pub energy_kcal: f64,
    /// kcal per minute
    pub metabolic_rate: f64,
    pub heart_rate: Option<f64>,
    /// Mean of the last few heart-rate readings
    pub recent_heart_rate: Option<f64>,
    #[serde(skip)]
    heart_rate_history: VecDeque<f64>,
    #[serde(skip)]
    heart_rate_sum: f64,
    #[serde(skip)]
    heart_rate_count: u64,
}

impl SessionMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Fold a motion delta into the totals
    pub fn apply_motion(&mut self, delta: &MetricsDelta) {
        self.distance_m += delta.counted_distance_m;
        self.elevation_gain_m += delta.elevation_gain_m;
        self.elevation_loss_m += delta.elevation_loss_m;
        if let Some(grade) = delta.grade_percent {
            self.grade_percent = grade;
        }
        // Keep the previous pace when the fix had no speed
        if let Some(pace) = delta.pace_min_per_km {
            self.current_pace_min_per_km = pace;
        }
    }

    pub fn refresh_average_pace(&mut self, elapsed_minutes: f64) {
        if let Some(pace) = crate::motion::average_pace(elapsed_minutes, self.distance_m) {
            self.average_pace_min_per_km = pace;
        }
    }

    pub fn record_heart_rate(&mut self, bpm: f64) {
        self.heart_rate = Some(bpm);
        self.heart_rate_history.push_back(bpm);
        while self.heart_rate_history.len() > HEART_RATE_HISTORY {
            self.heart_rate_history.pop_front();
        }
        let window: f64 = self.heart_rate_history.iter().sum();
        self.recent_heart_rate = Some(window / self.heart_rate_history.len() as f64);
        self.heart_rate_sum += bpm;
        self.heart_rate_count += 1;
    }

    /// Mean over every reading of the session
    pub fn average_heart_rate(&self) -> Option<f64> {
        if self.heart_rate_count == 0 {
            None
        } else {
            Some(self.heart_rate_sum / self.heart_rate_count as f64)
        }
    }

    pub fn totals(&self) -> SessionTotals {
        SessionTotals {
            distance_m: self.distance_m,
            elevation_gain_m: self.elevation_gain_m,
            elevation_loss_m: self.elevation_loss_m,
            energy_kcal: self.energy_kcal,
            average_pace_min_per_km: if self.distance_m > 0.0 {
                Some(self.average_pace_min_per_km)
            } else {
                None
            },
            average_heart_rate: self.average_heart_rate(),
        }
    }
}

/// Read-only view handed to presentation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackerSnapshot {
    pub timestamp: f64,
    pub state: TrackingState,
    pub is_auto_paused: bool,
    pub quality: Option<QualityTier>,
    pub terrain: TerrainBand,
    pub session_id: Option<SessionId>,
    pub elapsed_secs: f64,
    pub metrics: SessionMetrics,
}

impl TrackerSnapshot {
    pub fn idle() -> Self {
        TrackerSnapshot {
            timestamp: 0.0,
            state: TrackingState::Stopped,
            is_auto_paused: false,
            quality: None,
            terrain: TerrainBand::Gentle,
            session_id: None,
            elapsed_secs: 0.0,
            metrics: SessionMetrics::default(),
        }
    }

    pub fn save(&self, path: &str) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_apply_motion_keeps_pace_without_speed() {
        let mut metrics = SessionMetrics::new();
        metrics.apply_motion(&MetricsDelta {
            horizontal_distance_m: 10.0,
            counted_distance_m: 10.0,
            elevation_gain_m: 1.0,
            elevation_loss_m: 0.0,
            grade_percent: Some(10.0),
            pace_min_per_km: Some(12.0),
        });
        metrics.apply_motion(&MetricsDelta {
            horizontal_distance_m: 1.0,
            counted_distance_m: 0.0,
            elevation_gain_m: 0.0,
            elevation_loss_m: 0.5,
            grade_percent: None,
            pace_min_per_km: None,
        });

        assert_relative_eq!(metrics.distance_m, 10.0);
        assert_relative_eq!(metrics.elevation_gain_m, 1.0);
        assert_relative_eq!(metrics.elevation_loss_m, 0.5);
        assert_relative_eq!(metrics.grade_percent, 10.0);
        assert_relative_eq!(metrics.current_pace_min_per_km, 12.0);
    }

    #[test]
    fn test_average_pace_requires_distance() {
        let mut metrics = SessionMetrics::new();
        metrics.refresh_average_pace(5.0);
        assert_eq!(metrics.average_pace_min_per_km, 0.0);

        metrics.distance_m = 500.0;
        metrics.refresh_average_pace(5.0);
        assert_relative_eq!(metrics.average_pace_min_per_km, 10.0);
        assert_eq!(metrics.totals().average_pace_min_per_km, Some(10.0));
    }

    #[test]
    fn test_heart_rate_rolling_and_session_average() {
        let mut metrics = SessionMetrics::new();
        assert!(metrics.average_heart_rate().is_none());

        for bpm in 100..112 {
            metrics.record_heart_rate(bpm as f64);
        }

        assert_eq!(metrics.heart_rate, Some(111.0));
        // last ten: 102..=111
        assert_relative_eq!(metrics.recent_heart_rate.unwrap(), 106.5);
        assert_relative_eq!(metrics.average_heart_rate().unwrap(), 105.5);
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut metrics = SessionMetrics::new();
        metrics.distance_m = 42.0;
        metrics.record_heart_rate(120.0);
        metrics.reset();
        assert_eq!(metrics, SessionMetrics::default());
        assert!(metrics.average_heart_rate().is_none());
    }

    #[test]
    fn test_snapshot_serializes_state_names() {
        let json = serde_json::to_string(&TrackerSnapshot::idle()).unwrap();
        assert!(json.contains("\"state\":\"stopped\""));
        assert!(json.contains("\"terrain\":\"gentle\""));
    }
}
