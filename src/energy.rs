//! Load-carriage energy expenditure model
//!
//! Base cost is the level-ground Pandolf equation for a walker of body
//! mass W carrying load L at speed V:
//!
//!   M = 1.5 W + 2.0 (W + L)(L / W)^2 + (W + L)(1.5 V^2)      [watts]
//!
//! converted to kcal/min and scaled by three multipliers: grade (piecewise
//! linear over fixed breakpoints), altitude (piecewise linear above 500 m)
//! and terrain band (set explicitly by the controller).
//!
//! All inputs are sanitized before evaluation so the rate is always finite
//! and non-negative.
use serde::{Deserialize, Serialize};

use crate::config::EnergyConfig;

const WATTS_TO_KCAL_PER_MIN: f64 = 60.0 / 4184.0;

/// (grade %, multiplier). Mild descents are slightly cheaper than flat,
/// steeper ones cost more due to eccentric braking.
const GRADE_CURVE: [(f64, f64); 8] = [
    (-20.0, 1.40),
    (-10.0, 1.15),
    (-4.0, 0.92),
    (0.0, 1.00),
    (5.0, 1.45),
    (10.0, 1.95),
    (15.0, 2.55),
    (20.0, 3.20),
];

/// (altitude m, multiplier)
const ALTITUDE_CURVE: [(f64, f64); 6] = [
    (0.0, 1.00),
    (500.0, 1.00),
    (1500.0, 1.04),
    (2500.0, 1.10),
    (3500.0, 1.18),
    (5000.0, 1.32),
];

const GRADE_LIMIT: f64 = 20.0;

/// Linear interpolation over sorted breakpoints, clamped at both ends
fn interpolate(curve: &[(f64, f64)], x: f64) -> f64 {
    let (first_x, first_y) = curve[0];
    let (last_x, last_y) = curve[curve.len() - 1];
    if !(x > first_x) {
        return first_y;
    }
    if x >= last_x {
        return last_y;
    }

    for pair in curve.windows(2) {
        let (x0, y0) = pair[0];
        let (x1, y1) = pair[1];
        if x <= x1 {
            let t = (x - x0) / (x1 - x0);
            return y0 + t * (y1 - y0);
        }
    }
    last_y
}

/// Never panics: a NaN bound is ignored rather than passed to `clamp`
fn sanitize(value: f64, min: f64, max: f64, fallback: f64) -> f64 {
    if value.is_finite() {
        value.max(min).min(max)
    } else {
        fallback
    }
}

pub fn grade_multiplier(grade_percent: f64) -> f64 {
    let grade = sanitize(grade_percent, -GRADE_LIMIT, GRADE_LIMIT, 0.0);
    interpolate(&GRADE_CURVE, grade)
}

pub fn altitude_multiplier(altitude_m: f64) -> f64 {
    let altitude = if altitude_m.is_finite() { altitude_m } else { 0.0 };
    interpolate(&ALTITUDE_CURVE, altitude)
}

/// Terrain difficulty derived from the magnitude of the grade
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerrainBand {
    Gentle,
    Moderate,
    Steep,
}

impl TerrainBand {
    pub fn from_grade(grade_percent: f64) -> Self {
        let magnitude = if grade_percent.is_finite() {
            grade_percent.abs()
        } else {
            0.0
        };
        if magnitude >= 10.0 {
            TerrainBand::Steep
        } else if magnitude >= 5.0 {
            TerrainBand::Moderate
        } else {
            TerrainBand::Gentle
        }
    }

    pub fn multiplier(&self) -> f64 {
        match self {
            TerrainBand::Gentle => 1.0,
            TerrainBand::Moderate => 1.1,
            TerrainBand::Steep => 1.2,
        }
    }
}

pub struct EnergyModel {
    config: EnergyConfig,
    body_weight_kg: f64,
    load_weight_kg: f64,
    terrain: TerrainBand,
    calculating: bool,
    total_kcal: f64,
    current_rate: f64,
    last_update_at: Option<f64>,
}

impl EnergyModel {
    pub fn new(config: EnergyConfig) -> Self {
        let body_weight_kg = config.min_body_weight_kg.max(70.0).min(config.max_body_weight_kg);
        EnergyModel {
            config,
            body_weight_kg,
            load_weight_kg: 0.0,
            terrain: TerrainBand::Gentle,
            calculating: false,
            total_kcal: 0.0,
            current_rate: 0.0,
            last_update_at: None,
        }
    }

    /// Begin accumulating from `now`
    pub fn start(&mut self, body_weight_kg: f64, load_weight_kg: f64, now: f64) {
        self.reset();
        self.body_weight_kg = sanitize(
            body_weight_kg,
            self.config.min_body_weight_kg,
            self.config.max_body_weight_kg,
            self.body_weight_kg,
        );
        self.load_weight_kg = sanitize(load_weight_kg, 0.0, self.config.max_load_weight_kg, 0.0);
        self.calculating = true;
        self.last_update_at = Some(now);
    }

    /// Instantaneous kcal/min for the given conditions and current terrain band
    pub fn metabolic_rate(&self, speed_ms: f64, grade_percent: f64, altitude_m: f64) -> f64 {
        let speed = sanitize(
            speed_ms,
            self.config.min_speed_ms,
            self.config.max_speed_ms,
            self.config.min_speed_ms,
        );
        let w = self.body_weight_kg;
        let l = self.load_weight_kg;
        let total = w + l;

        let load_ratio = l / w;
        let watts = 1.5 * w + 2.0 * total * load_ratio * load_ratio + total * 1.5 * speed * speed;
        let base = watts * WATTS_TO_KCAL_PER_MIN;

        let rate = base
            * grade_multiplier(grade_percent)
            * altitude_multiplier(altitude_m)
            * self.terrain.multiplier();

        if rate.is_finite() {
            rate.max(0.0)
        } else {
            0.0
        }
    }

    /// Recompute the rate and, while calculating, integrate it since the
    /// previous update
    pub fn update(&mut self, speed_ms: f64, grade_percent: f64, altitude_m: f64, now: f64) -> f64 {
        let rate = self.metabolic_rate(speed_ms, grade_percent, altitude_m);
        if self.calculating {
            self.accumulate(now);
        }
        self.current_rate = rate;
        rate
    }

    /// Select the terrain band for `grade_percent`. Returns true when the band
    /// changed.
    pub fn update_terrain_multiplier(&mut self, grade_percent: f64) -> bool {
        let band = TerrainBand::from_grade(grade_percent);
        if band == self.terrain {
            return false;
        }
        log::debug!("Terrain band {:?} -> {:?}", self.terrain, band);
        self.terrain = band;
        true
    }

    /// Freeze accumulation after crediting the interval up to `now`
    pub fn pause(&mut self, now: f64) {
        if self.calculating {
            self.accumulate(now);
            self.calculating = false;
        }
    }

    pub fn resume(&mut self, now: f64) {
        if !self.calculating {
            self.calculating = true;
            self.last_update_at = Some(now);
        }
    }

    /// Stop and return the final total in kcal
    pub fn stop(&mut self, now: f64) -> f64 {
        self.pause(now);
        self.last_update_at = None;
        self.total_kcal
    }

    pub fn reset(&mut self) {
        self.total_kcal = 0.0;
        self.current_rate = 0.0;
        self.calculating = false;
        self.last_update_at = None;
        self.terrain = TerrainBand::Gentle;
    }

    fn accumulate(&mut self, now: f64) {
        match self.last_update_at {
            Some(last) => {
                let elapsed_minutes = (now - last) / 60.0;
                // A clock that steps backwards leaves the anchor where it was
                if elapsed_minutes > 0.0 && elapsed_minutes.is_finite() {
                    self.total_kcal += self.current_rate * elapsed_minutes;
                    self.last_update_at = Some(now);
                }
            }
            None if now.is_finite() => self.last_update_at = Some(now),
            None => {}
        }
    }

    pub fn total_kcal(&self) -> f64 {
        self.total_kcal
    }

    pub fn current_rate(&self) -> f64 {
        self.current_rate
    }

    pub fn is_calculating(&self) -> bool {
        self.calculating
    }

    pub fn terrain(&self) -> TerrainBand {
        self.terrain
    }

    pub fn total_weight_kg(&self) -> f64 {
        self.body_weight_kg + self.load_weight_kg
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn started(body: f64, load: f64) -> EnergyModel {
        let mut model = EnergyModel::new(EnergyConfig::default());
        model.start(body, load, 0.0);
        model
    }

    #[test]
    fn test_total_weight() {
        let model = started(70.0, 20.0);
        assert_relative_eq!(model.total_weight_kg(), 90.0);
    }

    #[test]
    fn test_level_rate_reference_value() {
        let model = started(70.0, 20.0);
        // 105 + 2*90*(20/70)^2 + 90*1.5*4 = 659.69 W
        let expected = (105.0 + 180.0 * (20.0_f64 / 70.0).powi(2) + 540.0) * 60.0 / 4184.0;
        assert_relative_eq!(model.metabolic_rate(2.0, 0.0, 0.0), expected, epsilon = 1e-9);
    }

    #[test]
    fn test_degenerate_speed_gives_finite_non_negative_rate() {
        let model = started(70.0, 20.0);
        for speed in [0.0, -3.0, f64::NAN, f64::INFINITY, f64::NEG_INFINITY, 1e12] {
            let rate = model.metabolic_rate(speed, 0.0, 0.0);
            assert!(rate.is_finite() && rate >= 0.0, "speed {} -> {}", speed, rate);
        }
        assert_relative_eq!(
            model.metabolic_rate(-3.0, 0.0, 0.0),
            model.metabolic_rate(0.5, 0.0, 0.0)
        );
    }

    #[test]
    fn test_degenerate_weights_are_clamped() {
        let mut model = EnergyModel::new(EnergyConfig::default());
        model.start(f64::NAN, -10.0, 0.0);
        let rate = model.metabolic_rate(1.5, 3.0, 200.0);
        assert!(rate.is_finite() && rate > 0.0);

        model.start(0.0, 1e9, 0.0);
        let rate = model.metabolic_rate(1.5, 3.0, 200.0);
        assert!(rate.is_finite() && rate > 0.0);
    }

    #[test]
    fn test_rate_increases_with_speed() {
        let model = started(80.0, 25.0);
        let mut last = 0.0;
        for step in 0..=40 {
            let speed = 0.5 + step as f64 * 0.1;
            let rate = model.metabolic_rate(speed, 0.0, 0.0);
            assert!(rate > last);
            last = rate;
        }
    }

    #[test]
    fn test_uphill_costs_more_than_flat() {
        let model = started(70.0, 20.0);
        let flat = model.metabolic_rate(2.0, 0.0, 0.0);
        let climb = model.metabolic_rate(2.0, 15.0, 0.0);
        assert!(flat > 0.0);
        assert!(flat < climb);
    }

    #[test]
    fn test_grade_multiplier_shape() {
        // Monotonic and continuous on the uphill side
        let mut last = grade_multiplier(0.0);
        for step in 1..=200 {
            let m = grade_multiplier(step as f64 * 0.1);
            assert!(m > last);
            assert!(m - last < 0.02);
            last = m;
        }
        // Steep descents cost more than flat, mild ones slightly less
        assert!(grade_multiplier(-2.0) < 1.0);
        assert!(grade_multiplier(-10.0) > 1.0);
        assert!(grade_multiplier(-20.0) > grade_multiplier(-10.0));
        // Clamped to +/-20
        assert_relative_eq!(grade_multiplier(45.0), grade_multiplier(20.0));
        assert_relative_eq!(grade_multiplier(-45.0), grade_multiplier(-20.0));
        assert_relative_eq!(grade_multiplier(f64::NAN), 1.0);
    }

    #[test]
    fn test_altitude_multiplier_shape() {
        assert_relative_eq!(altitude_multiplier(-50.0), 1.0);
        assert_relative_eq!(altitude_multiplier(400.0), 1.0);
        assert!(altitude_multiplier(1000.0) > 1.0);
        assert!(altitude_multiplier(3000.0) > altitude_multiplier(2000.0));
        assert_relative_eq!(altitude_multiplier(f64::NAN), 1.0);
        assert!(altitude_multiplier(9000.0).is_finite());
    }

    #[test]
    fn test_terrain_band_raises_rate() {
        let mut model = started(70.0, 20.0);
        let gentle = model.metabolic_rate(1.5, 3.0, 0.0);

        assert!(model.update_terrain_multiplier(7.0));
        assert_eq!(model.terrain(), TerrainBand::Moderate);
        let moderate = model.metabolic_rate(1.5, 3.0, 0.0);

        assert!(model.update_terrain_multiplier(-12.0));
        let steep = model.metabolic_rate(1.5, 3.0, 0.0);

        assert!(gentle < moderate && moderate < steep);
        assert!(!model.update_terrain_multiplier(-15.0));
    }

    #[test]
    fn test_accumulates_rate_over_time() {
        let mut model = started(70.0, 20.0);
        let rate = model.update(2.0, 0.0, 0.0, 0.0);
        model.update(2.0, 0.0, 0.0, 60.0);
        assert_relative_eq!(model.total_kcal(), rate, epsilon = 1e-9);
    }

    #[test]
    fn test_pause_freezes_total_but_keeps_rate() {
        let mut model = started(70.0, 20.0);
        let rate = model.update(2.0, 0.0, 0.0, 0.0);
        model.pause(30.0);
        let frozen = model.total_kcal();
        assert_relative_eq!(frozen, rate * 0.5, epsilon = 1e-9);

        let climbing = model.update(2.0, 15.0, 0.0, 90.0);
        assert!(climbing > rate);
        assert_relative_eq!(model.current_rate(), climbing);
        assert_eq!(model.total_kcal(), frozen);

        model.resume(120.0);
        model.update(2.0, 15.0, 0.0, 180.0);
        assert_relative_eq!(model.total_kcal(), frozen + climbing, epsilon = 1e-9);
    }

    #[test]
    fn test_stop_returns_total_and_reset_clears() {
        let mut model = started(70.0, 20.0);
        let rate = model.update(1.2, 0.0, 0.0, 0.0);
        let total = model.stop(120.0);
        assert_relative_eq!(total, rate * 2.0, epsilon = 1e-9);
        assert!(!model.is_calculating());

        model.reset();
        assert_eq!(model.total_kcal(), 0.0);
        assert_eq!(model.current_rate(), 0.0);
        assert!(!model.is_calculating());
    }

    #[test]
    fn test_nan_bounds_never_panic() {
        let config = EnergyConfig {
            max_speed_ms: f64::NAN,
            max_body_weight_kg: f64::NAN,
            ..EnergyConfig::default()
        };
        let mut model = EnergyModel::new(config);
        model.start(70.0, 20.0, 0.0);
        assert!(model.total_weight_kg().is_finite());

        let rate = model.metabolic_rate(2.0, 5.0, 0.0);
        assert!(rate.is_finite() && rate >= 0.0);
        let rate = model.update(2.0, 5.0, 0.0, 60.0);
        assert!(rate.is_finite() && rate >= 0.0);
        assert!(model.total_kcal().is_finite());
    }

    #[test]
    fn test_clock_going_backwards_never_subtracts() {
        let mut model = started(70.0, 20.0);
        model.update(2.0, 0.0, 0.0, 100.0);
        let before = model.total_kcal();
        model.update(2.0, 0.0, 0.0, 50.0);
        assert!(model.total_kcal() >= before);
    }
}
