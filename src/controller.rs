use crate::auto_pause::{AutoPauseDetector, AutoPauseTransition};
use crate::collaborators::{HealthProvider, LocationProvider, PowerProfile, SessionId, SessionStore};
use crate::config::TrackerConfig;
use crate::energy::{EnergyModel, TerrainBand};
use crate::error::TrackerResult;
use crate::filter::{FilterOutcome, RejectReason, SampleFilter};
use crate::metrics::{SessionMetrics, TrackerSnapshot, TrackingState};
use crate::motion::{haversine_distance, pace_from_speed, MotionCalculator};
use crate::sample::{PositionSample, QualityTier};

/// What the pipeline did with one fix
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SampleOutcome {
    /// Session is not tracking
    Ignored,
    Rejected(RejectReason),
    Accepted {
        quality: QualityTier,
        auto_paused: bool,
        persisted: bool,
    },
}

/// Tracking session state machine
///
/// Sole owner of the tracking state, the session metrics and the
/// auto-pause flag. Every operation takes the current time explicitly so
/// the caller decides whether it comes from a wall clock or a replay.
///
/// Collaborator failures are logged and swallowed, except a refused
/// session creation which fails [`SessionController::start`].
pub struct SessionController<S, H, L> {
    config: TrackerConfig,
    store: S,
    health: H,
    location: L,

    state: TrackingState,
    session: Option<SessionId>,
    started_at: f64,
    last_update_at: f64,

    filter: SampleFilter,
    motion: MotionCalculator,
    auto_pause: AutoPauseDetector,
    energy: EnergyModel,

    metrics: SessionMetrics,
    quality: Option<QualityTier>,
    last_altitude: f64,

    auto_pause_timer_active: bool,
    publish_timer_active: bool,
}

impl<S, H, L> SessionController<S, H, L>
where
    S: SessionStore,
    H: HealthProvider,
    L: LocationProvider,
{
    pub fn new(config: TrackerConfig, store: S, health: H, location: L) -> Self {
        SessionController {
            filter: SampleFilter::new(config.filter.clone()),
            motion: MotionCalculator::new(config.motion.clone()),
            auto_pause: AutoPauseDetector::new(config.auto_pause.clone()),
            energy: EnergyModel::new(config.energy.clone()),
            config,
            store,
            health,
            location,
            state: TrackingState::Stopped,
            session: None,
            started_at: 0.0,
            last_update_at: 0.0,
            metrics: SessionMetrics::new(),
            quality: None,
            last_altitude: 0.0,
            auto_pause_timer_active: false,
            publish_timer_active: false,
        }
    }

    /// Begin a new session (Stopped → Tracking).
    ///
    /// Returns the running session's id without side effects when a session
    /// is already tracking or paused.
    pub fn start(&mut self, load_weight_kg: f64, now: f64) -> TrackerResult<SessionId> {
        if self.state != TrackingState::Stopped {
            if let Some(id) = self.session {
                log::debug!("start() ignored, {} already {:?}", id, self.state);
                return Ok(id);
            }
        }

        // A refused start keeps the previous session's final metrics
        let id = self.store.create_session(load_weight_kg, now)?;

        self.metrics.reset();
        self.filter.reset();
        self.quality = None;
        self.last_altitude = 0.0;

        let body_weight_kg = match self.health.load_body_metrics() {
            Ok(body) => body
                .weight_kg
                .filter(|w| w.is_finite() && *w > 0.0)
                .unwrap_or(self.config.default_body_weight_kg),
            Err(e) => {
                log::warn!(
                    "Body metrics unavailable ({}), using {} kg",
                    e,
                    self.config.default_body_weight_kg
                );
                self.config.default_body_weight_kg
            }
        };
        if let Err(e) = self.health.start_workout_session() {
            log::warn!("Failed to start workout session: {}", e);
        }
        if let Err(e) = self.health.start_heart_rate_monitoring() {
            log::warn!("Failed to start heart-rate monitoring: {}", e);
        }

        self.location.set_power_profile(PowerProfile::Full);
        self.location.start_updates();

        self.energy.start(body_weight_kg, load_weight_kg, now);
        self.auto_pause.reset(now);
        self.auto_pause_timer_active = true;
        self.publish_timer_active = true;

        self.session = Some(id);
        self.started_at = now;
        self.last_update_at = now;
        self.state = TrackingState::Tracking;

        log::info!(
            "Started {} (body {:.1} kg, load {:.1} kg)",
            id,
            body_weight_kg,
            load_weight_kg
        );
        Ok(id)
    }

    /// Tracking → Paused. Returns false when not tracking.
    pub fn pause(&mut self, now: f64) -> bool {
        if self.state != TrackingState::Tracking {
            return false;
        }

        self.state = TrackingState::Paused;
        self.auto_pause.clear();
        self.location.set_power_profile(PowerProfile::Reduced);
        self.auto_pause_timer_active = false;
        self.publish_timer_active = false;

        self.energy.pause(now);
        self.metrics.energy_kcal = self.energy.total_kcal();
        self.last_update_at = now;

        if let Some(id) = self.session {
            if let Err(e) = self.store.pause_session(id) {
                log::warn!("Failed to mark {} paused: {}", id, e);
            }
            log::info!("Paused {}", id);
        }
        true
    }

    /// Paused → Tracking. Returns false when not paused.
    pub fn resume(&mut self, now: f64) -> bool {
        if self.state != TrackingState::Paused {
            return false;
        }

        self.state = TrackingState::Tracking;
        self.location.set_power_profile(PowerProfile::Full);
        self.auto_pause.reset(now);
        self.auto_pause_timer_active = true;
        self.publish_timer_active = true;

        // Ground covered while explicitly paused does not count
        self.filter.clear_window();
        self.energy.resume(now);
        self.last_update_at = now;

        if let Some(id) = self.session {
            if let Err(e) = self.store.resume_session(id) {
                log::warn!("Failed to mark {} resumed: {}", id, e);
            }
            log::info!("Resumed {}", id);
        }
        true
    }

    /// End the session from Tracking or Paused and return the final
    /// metrics. `None` when already stopped.
    pub fn stop(&mut self, now: f64) -> Option<SessionMetrics> {
        if self.state == TrackingState::Stopped {
            return None;
        }

        self.location.stop_updates();
        self.auto_pause_timer_active = false;
        self.publish_timer_active = false;

        self.metrics.energy_kcal = self.energy.stop(now);
        if self.state == TrackingState::Tracking {
            let elapsed = self.elapsed_minutes(now);
            self.metrics.refresh_average_pace(elapsed);
        }
        self.last_update_at = now;

        if let Some(id) = self.session.take() {
            let totals = self.metrics.totals();
            if let Err(e) = self.store.update_totals(id, &totals) {
                log::warn!("Failed to write final totals for {}: {}", id, e);
            }
            if let Err(e) = self.store.complete_session(id, now) {
                log::warn!("Failed to complete {}: {}", id, e);
            }
            log::info!(
                "Stopped {}: {:.0} m, +{:.0}/-{:.0} m, {:.0} kcal",
                id,
                totals.distance_m,
                totals.elevation_gain_m,
                totals.elevation_loss_m,
                totals.energy_kcal
            );
        }

        if let Err(e) = self.health.end_workout_session() {
            log::warn!("Failed to end workout session: {}", e);
        }
        if let Err(e) = self.health.stop_heart_rate_monitoring() {
            log::warn!("Failed to stop heart-rate monitoring: {}", e);
        }

        self.auto_pause.clear();
        self.state = TrackingState::Stopped;
        Some(self.metrics.clone())
    }

    /// Tracking ↔ Paused; no-op when stopped
    pub fn toggle(&mut self, now: f64) -> bool {
        match self.state {
            TrackingState::Tracking => self.pause(now),
            TrackingState::Paused => self.resume(now),
            TrackingState::Stopped => false,
        }
    }

    /// Run one fix through filter → auto-pause → motion → energy →
    /// persistence
    pub fn handle_sample(&mut self, sample: &PositionSample) -> SampleOutcome {
        if self.state != TrackingState::Tracking {
            return SampleOutcome::Ignored;
        }
        let now = sample.timestamp;

        let quality = match self.filter.accept(sample) {
            FilterOutcome::Accepted(quality) => quality,
            FilterOutcome::Rejected(reason) => {
                log::debug!(
                    "Rejected fix at {:.1} ({:?}, accuracy {:.1} m)",
                    now,
                    reason,
                    sample.horizontal_accuracy
                );
                return SampleOutcome::Rejected(reason);
            }
        };
        self.quality = Some(quality);

        if let Some(previous) = self.filter.window().previous() {
            let displacement = haversine_distance(previous, sample);
            self.auto_pause.record_displacement(displacement, now);
        }
        self.evaluate_auto_pause(now);
        let auto_paused = self.auto_pause.is_auto_paused();

        if !auto_paused {
            match self.filter.window().previous() {
                Some(previous) => {
                    let delta = self.motion.update(previous, sample, auto_paused);
                    self.metrics.apply_motion(&delta);
                    // Jitter pairs below the distance floor leave the band alone
                    if let Some(grade) = delta.grade_percent.filter(|_| delta.counted_distance_m > 0.0) {
                        self.energy.update_terrain_multiplier(grade);
                    }
                }
                None => {
                    if let Some(pace) = pace_from_speed(sample.speed) {
                        self.metrics.current_pace_min_per_km = pace;
                    }
                }
            }
            let elapsed = self.elapsed_minutes(now);
            self.metrics.refresh_average_pace(elapsed);
        }

        self.metrics.current_speed_ms = if sample.speed.is_finite() {
            sample.speed.max(0.0)
        } else {
            0.0
        };
        if sample.altitude.is_finite() {
            self.last_altitude = sample.altitude;
        }
        self.refresh_energy(now);

        let persisted = !auto_paused && self.persist(sample);
        SampleOutcome::Accepted {
            quality,
            auto_paused,
            persisted,
        }
    }

    /// Heart-rate reading from the health collaborator
    pub fn on_heart_rate(&mut self, bpm: f64) {
        if self.session.is_none() || !bpm.is_finite() || bpm <= 0.0 {
            return;
        }
        self.metrics.record_heart_rate(bpm);
    }

    /// Periodic auto-pause evaluation; inert unless tracking
    pub fn on_auto_pause_tick(&mut self, now: f64) -> Option<AutoPauseTransition> {
        if !self.auto_pause_timer_active {
            return None;
        }
        self.evaluate_auto_pause(now)
    }

    /// Periodic refresh of burn rate, energy and average pace between fixes
    pub fn on_publish_tick(&mut self, now: f64) {
        if !self.publish_timer_active || self.state != TrackingState::Tracking {
            return;
        }
        self.refresh_energy(now);
        if !self.auto_pause.is_auto_paused() {
            let elapsed = self.elapsed_minutes(now);
            self.metrics.refresh_average_pace(elapsed);
        }
        self.last_update_at = now;
    }

    fn evaluate_auto_pause(&mut self, now: f64) -> Option<AutoPauseTransition> {
        if self.state != TrackingState::Tracking {
            return None;
        }

        let transition = self.auto_pause.evaluate(now)?;
        match transition {
            AutoPauseTransition::Paused => {
                log::info!(
                    "Auto-paused: no movement for {:.0}s",
                    now - self.auto_pause.last_movement_at()
                );
                self.location.set_power_profile(PowerProfile::Reduced);
                self.energy.pause(now);
                self.metrics.energy_kcal = self.energy.total_kcal();
            }
            AutoPauseTransition::Resumed => {
                log::info!("Auto-resumed: movement detected");
                self.location.set_power_profile(PowerProfile::Full);
                self.energy.resume(now);
            }
        }
        Some(transition)
    }

    fn refresh_energy(&mut self, now: f64) {
        let rate = self.energy.update(
            self.metrics.current_speed_ms,
            self.metrics.grade_percent,
            self.last_altitude,
            now,
        );
        self.metrics.metabolic_rate = rate;
        self.metrics.energy_kcal = self.energy.total_kcal();
        self.last_update_at = now;
    }

    fn persist(&mut self, sample: &PositionSample) -> bool {
        let Some(id) = self.session else {
            return false;
        };

        if let Err(e) = self.store.append_location_point(id, sample) {
            log::warn!("Failed to save location point for {}: {}", id, e);
            return false;
        }
        if let Some(bpm) = self.metrics.heart_rate {
            if let Err(e) = self.store.attach_heart_rate(id, bpm) {
                log::warn!("Failed to attach heart rate for {}: {}", id, e);
            }
        }
        if let Err(e) = self.store.update_totals(id, &self.metrics.totals()) {
            log::warn!("Failed to update totals for {}: {}", id, e);
        }
        true
    }

    fn elapsed_minutes(&self, now: f64) -> f64 {
        ((now - self.started_at) / 60.0).max(0.0)
    }

    pub fn snapshot(&self) -> TrackerSnapshot {
        TrackerSnapshot {
            timestamp: self.last_update_at,
            state: self.state,
            is_auto_paused: self.auto_pause.is_auto_paused(),
            quality: self.quality,
            terrain: self.energy.terrain(),
            session_id: self.session,
            elapsed_secs: if self.session.is_some() {
                (self.last_update_at - self.started_at).max(0.0)
            } else {
                0.0
            },
            metrics: self.metrics.clone(),
        }
    }

    pub fn state(&self) -> TrackingState {
        self.state
    }

    pub fn is_auto_paused(&self) -> bool {
        self.auto_pause.is_auto_paused()
    }

    pub fn quality(&self) -> Option<QualityTier> {
        self.quality
    }

    pub fn terrain(&self) -> TerrainBand {
        self.energy.terrain()
    }

    pub fn metrics(&self) -> &SessionMetrics {
        &self.metrics
    }

    pub fn session_id(&self) -> Option<SessionId> {
        self.session
    }

    pub fn timers_active(&self) -> (bool, bool) {
        (self.auto_pause_timer_active, self.publish_timer_active)
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn health(&self) -> &H {
        &self.health
    }

    pub fn location(&self) -> &L {
        &self.location
    }
}
