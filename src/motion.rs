use geo::{HaversineDistance, Point};

use crate::config::MotionConfig;
use crate::sample::PositionSample;

/// Great-circle distance in meters between two fixes
pub fn haversine_distance(from: &PositionSample, to: &PositionSample) -> f64 {
    let a = Point::new(from.longitude, from.latitude);
    let b = Point::new(to.longitude, to.latitude);
    let d = a.haversine_distance(&b);
    if d.is_finite() {
        d
    } else {
        0.0
    }
}

/// Instantaneous pace in minutes per kilometer, `None` for non-positive speed
pub fn pace_from_speed(speed_ms: f64) -> Option<f64> {
    if speed_ms > 0.0 && speed_ms.is_finite() {
        Some((1000.0 / speed_ms) / 60.0)
    } else {
        None
    }
}

/// Average pace in minutes per kilometer over the whole session
pub fn average_pace(elapsed_minutes: f64, distance_m: f64) -> Option<f64> {
    if distance_m > 0.0 && elapsed_minutes >= 0.0 {
        Some(elapsed_minutes / (distance_m / 1000.0))
    } else {
        None
    }
}

/// Increment produced from one pair of accepted fixes
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MetricsDelta {
    /// Raw great-circle distance between the pair
    pub horizontal_distance_m: f64,
    /// Portion that counts toward the session total (0 below the jitter floor)
    pub counted_distance_m: f64,
    pub elevation_gain_m: f64,
    pub elevation_loss_m: f64,
    pub grade_percent: Option<f64>,
    pub pace_min_per_km: Option<f64>,
}

pub struct MotionCalculator {
    config: MotionConfig,
}

impl MotionCalculator {
    pub fn new(config: MotionConfig) -> Self {
        MotionCalculator { config }
    }

    pub fn clamp_grade(&self, grade: f64) -> f64 {
        let limit = self.config.grade_limit_percent;
        grade.clamp(-limit, limit)
    }

    /// Derive distance, elevation, grade and pace from a pair of fixes.
    ///
    /// Distance counts only above `min_distance_m` and while not
    /// auto-paused. Pace is `None` when the current fix reports no speed so
    /// the caller keeps the previous value.
    pub fn update(
        &self,
        previous: &PositionSample,
        current: &PositionSample,
        auto_paused: bool,
    ) -> MetricsDelta {
        let horizontal = haversine_distance(previous, current);

        let counted = if horizontal > self.config.min_distance_m && !auto_paused {
            horizontal
        } else {
            0.0
        };

        let elevation_delta = current.altitude - previous.altitude;
        let (gain, loss) = if !elevation_delta.is_finite() {
            (0.0, 0.0)
        } else if elevation_delta > 0.0 {
            (elevation_delta, 0.0)
        } else {
            (0.0, -elevation_delta)
        };

        let grade = if horizontal > 0.0 && elevation_delta.is_finite() {
            Some(self.clamp_grade(elevation_delta / horizontal * 100.0))
        } else {
            None
        };

        MetricsDelta {
            horizontal_distance_m: horizontal,
            counted_distance_m: counted,
            elevation_gain_m: gain,
            elevation_loss_m: loss,
            grade_percent: grade,
            pace_min_per_km: pace_from_speed(current.speed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn fix(lat: f64, lon: f64, alt: f64, speed: f64) -> PositionSample {
        PositionSample::new(0.0, lat, lon, alt, 5.0, speed)
    }

    #[test]
    fn test_haversine_hundredth_degree_latitude() {
        let a = fix(37.0, -122.0, 0.0, 1.0);
        let b = fix(37.01, -122.0, 0.0, 1.0);
        let d = haversine_distance(&a, &b);
        assert!(d > 1100.0 && d < 1120.0, "distance {}", d);
    }

    #[test]
    fn test_pace_from_speed() {
        // 1000 m / 2 m/s = 500 s = 8.33 min/km
        assert_relative_eq!(pace_from_speed(2.0).unwrap(), 8.333_333, epsilon = 1e-5);
        assert!(pace_from_speed(0.0).is_none());
        assert!(pace_from_speed(-1.0).is_none());
        assert!(pace_from_speed(f64::NAN).is_none());
    }

    #[test]
    fn test_average_pace() {
        assert_relative_eq!(average_pace(10.0, 1000.0).unwrap(), 10.0);
        assert!(average_pace(10.0, 0.0).is_none());
    }

    #[test]
    fn test_jitter_below_min_distance_not_counted() {
        let calc = MotionCalculator::new(MotionConfig::default());
        // ~1.1 m apart
        let delta = calc.update(&fix(37.0, -122.0, 0.0, 0.0), &fix(37.00001, -122.0, 0.0, 0.0), false);
        assert!(delta.horizontal_distance_m > 0.0);
        assert_eq!(delta.counted_distance_m, 0.0);
    }

    #[test]
    fn test_auto_paused_pair_not_counted() {
        let calc = MotionCalculator::new(MotionConfig::default());
        let delta = calc.update(&fix(37.0, -122.0, 0.0, 1.0), &fix(37.001, -122.0, 0.0, 1.0), true);
        assert!(delta.horizontal_distance_m > 100.0);
        assert_eq!(delta.counted_distance_m, 0.0);
    }

    #[test]
    fn test_elevation_split_and_grade() {
        let calc = MotionCalculator::new(MotionConfig::default());
        let up = calc.update(&fix(37.0, -122.0, 100.0, 1.0), &fix(37.001, -122.0, 105.0, 1.0), false);
        assert_relative_eq!(up.elevation_gain_m, 5.0);
        assert_eq!(up.elevation_loss_m, 0.0);
        let grade = up.grade_percent.unwrap();
        assert!(grade > 4.0 && grade < 5.0, "grade {}", grade);

        let down = calc.update(&fix(37.001, -122.0, 105.0, 1.0), &fix(37.002, -122.0, 101.0, 1.0), false);
        assert_eq!(down.elevation_gain_m, 0.0);
        assert_relative_eq!(down.elevation_loss_m, 4.0, epsilon = 1e-9);
        assert!(down.grade_percent.unwrap() < 0.0);
    }

    #[test]
    fn test_grade_is_clamped() {
        let calc = MotionCalculator::new(MotionConfig::default());
        let cliff = calc.update(&fix(37.0, -122.0, 0.0, 1.0), &fix(37.00003, -122.0, 500.0, 1.0), false);
        assert_eq!(cliff.grade_percent, Some(20.0));

        let drop = calc.update(&fix(37.0, -122.0, 500.0, 1.0), &fix(37.00003, -122.0, 0.0, 1.0), false);
        assert_eq!(drop.grade_percent, Some(-20.0));
    }

    #[test]
    fn test_grade_undefined_without_horizontal_motion() {
        let calc = MotionCalculator::new(MotionConfig::default());
        let delta = calc.update(&fix(37.0, -122.0, 0.0, 0.0), &fix(37.0, -122.0, 10.0, 0.0), false);
        assert!(delta.grade_percent.is_none());
        assert!(delta.pace_min_per_km.is_none());
        assert_relative_eq!(delta.elevation_gain_m, 10.0);
    }
}
