use crate::config::AutoPauseConfig;

/// Change of the auto-pause flag produced by an evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoPauseTransition {
    /// No qualifying movement for `pause_after_secs`
    Paused,
    /// Movement observed again within `resume_within_secs`
    Resumed,
}

/// Infers "momentarily stationary" from displacement between fixes.
///
/// Only meaningful while the session is tracking; the controller calls
/// [`AutoPauseDetector::clear`] whenever it leaves that state.
pub struct AutoPauseDetector {
    config: AutoPauseConfig,
    last_movement_at: f64,
    is_auto_paused: bool,
}

impl AutoPauseDetector {
    pub fn new(config: AutoPauseConfig) -> Self {
        AutoPauseDetector {
            config,
            last_movement_at: 0.0,
            is_auto_paused: false,
        }
    }

    /// Restart the idle clock from `now` with the flag cleared
    pub fn reset(&mut self, now: f64) {
        self.last_movement_at = now;
        self.is_auto_paused = false;
    }

    /// Drop the flag without touching the idle clock
    pub fn clear(&mut self) {
        self.is_auto_paused = false;
    }

    /// Feed the displacement between the two newest accepted fixes.
    /// Returns true when it counted as movement.
    pub fn record_displacement(&mut self, distance_m: f64, now: f64) -> bool {
        if distance_m > self.config.movement_threshold_m {
            self.last_movement_at = now;
            true
        } else {
            false
        }
    }

    pub fn evaluate(&mut self, now: f64) -> Option<AutoPauseTransition> {
        if !self.config.enabled {
            return None;
        }

        let idle = now - self.last_movement_at;
        if !self.is_auto_paused && idle > self.config.pause_after_secs {
            self.is_auto_paused = true;
            return Some(AutoPauseTransition::Paused);
        }
        if self.is_auto_paused && idle < self.config.resume_within_secs {
            self.is_auto_paused = false;
            return Some(AutoPauseTransition::Resumed);
        }
        None
    }

    pub fn is_auto_paused(&self) -> bool {
        self.is_auto_paused
    }

    pub fn last_movement_at(&self) -> f64 {
        self.last_movement_at
    }

    pub fn check_interval_secs(&self) -> f64 {
        self.config.check_interval_secs
    }
}
