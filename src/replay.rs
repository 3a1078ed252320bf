//! Offline driver that pushes a recorded track through a controller on
//! simulated time.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use flate2::read::GzDecoder;
use serde::{Deserialize, Serialize};

use crate::collaborators::{HealthProvider, LocationProvider, SessionId, SessionStore};
use crate::controller::{SampleOutcome, SessionController};
use crate::error::{TrackerError, TrackerResult};
use crate::filter::RejectReason;
use crate::metrics::SessionMetrics;
use crate::sample::PositionSample;

/// Track log on disk: a bare array of fixes or `{"samples": [...]}`
#[derive(Deserialize)]
#[serde(untagged)]
enum TrackLog {
    Samples(Vec<PositionSample>),
    Wrapped { samples: Vec<PositionSample> },
}

/// Read a `.json` or `.json.gz` track log
pub fn load_track(path: &Path) -> TrackerResult<Vec<PositionSample>> {
    let file = File::open(path)?;
    let log: TrackLog = if path.extension().map(|e| e == "gz").unwrap_or(false) {
        serde_json::from_reader(BufReader::new(GzDecoder::new(file)))?
    } else {
        serde_json::from_reader(BufReader::new(file))?
    };
    Ok(match log {
        TrackLog::Samples(samples) | TrackLog::Wrapped { samples } => samples,
    })
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RejectionCounts {
    pub invalid_accuracy: usize,
    pub poor_accuracy: usize,
    pub too_frequent: usize,
    pub invalid_timestamp: usize,
}

impl RejectionCounts {
    fn record(&mut self, reason: RejectReason) {
        match reason {
            RejectReason::InvalidAccuracy => self.invalid_accuracy += 1,
            RejectReason::PoorAccuracy => self.poor_accuracy += 1,
            RejectReason::TooFrequent => self.too_frequent += 1,
            RejectReason::InvalidTimestamp => self.invalid_timestamp += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.invalid_accuracy + self.poor_accuracy + self.too_frequent + self.invalid_timestamp
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReplayReport {
    pub session_id: SessionId,
    pub samples: usize,
    pub accepted: usize,
    pub rejected: RejectionCounts,
    /// Accepted fixes handed to the store
    pub persisted: usize,
    pub auto_pauses: usize,
    pub auto_resumes: usize,
    pub duration_secs: f64,
    pub metrics: SessionMetrics,
}

impl ReplayReport {
    fn new(session_id: SessionId, samples: usize) -> Self {
        ReplayReport {
            session_id,
            samples,
            accepted: 0,
            rejected: RejectionCounts::default(),
            persisted: 0,
            auto_pauses: 0,
            auto_resumes: 0,
            duration_secs: 0.0,
            metrics: SessionMetrics::default(),
        }
    }

    fn note_auto_pause(&mut self, before: bool, after: bool) {
        match (before, after) {
            (false, true) => self.auto_pauses += 1,
            (true, false) => self.auto_resumes += 1,
            _ => {}
        }
    }

    pub fn print_summary(&self) {
        println!("=== Replay {} ===", self.session_id);
        println!(
            "Samples: {} (accepted {}, rejected {}: {} invalid, {} poor, {} too frequent, {} bad timestamp)",
            self.samples,
            self.accepted,
            self.rejected.total(),
            self.rejected.invalid_accuracy,
            self.rejected.poor_accuracy,
            self.rejected.too_frequent,
            self.rejected.invalid_timestamp
        );
        println!("Persisted points: {}", self.persisted);
        println!(
            "Auto-pause: {} pauses, {} resumes",
            self.auto_pauses, self.auto_resumes
        );
        println!("Duration: {:.0} s", self.duration_secs);
        println!(
            "Distance: {:.1} m | Elevation: +{:.1} / -{:.1} m",
            self.metrics.distance_m, self.metrics.elevation_gain_m, self.metrics.elevation_loss_m
        );
        println!(
            "Energy: {:.1} kcal | Avg pace: {:.2} min/km",
            self.metrics.energy_kcal, self.metrics.average_pace_min_per_km
        );
    }
}

/// Simulated timer cadences between recorded fixes
struct TickSchedule {
    auto_pause_every: f64,
    publish_every: f64,
    next_auto_pause: f64,
    next_publish: f64,
}

impl TickSchedule {
    fn new(start: f64, auto_pause_every: f64, publish_every: f64) -> Self {
        let auto_pause_every = sane_period(auto_pause_every);
        let publish_every = sane_period(publish_every);
        TickSchedule {
            auto_pause_every,
            publish_every,
            next_auto_pause: start + auto_pause_every,
            next_publish: start + publish_every,
        }
    }

    /// Fire every tick due at or before `until`, in time order
    fn fire_until<S, H, L>(
        &mut self,
        controller: &mut SessionController<S, H, L>,
        until: f64,
        report: &mut ReplayReport,
    ) where
        S: SessionStore,
        H: HealthProvider,
        L: LocationProvider,
    {
        loop {
            let due = self.next_auto_pause.min(self.next_publish);
            if due > until {
                break;
            }
            if self.next_auto_pause <= self.next_publish {
                let before = controller.is_auto_paused();
                controller.on_auto_pause_tick(due);
                report.note_auto_pause(before, controller.is_auto_paused());
                self.next_auto_pause += self.auto_pause_every;
            } else {
                controller.on_publish_tick(due);
                self.next_publish += self.publish_every;
            }
        }
    }
}

fn sane_period(secs: f64) -> f64 {
    if secs.is_finite() && secs > 0.0 {
        secs
    } else {
        1.0
    }
}

/// Replay `samples` as one session carrying `load_weight_kg`.
///
/// The session starts at the earliest fix and stops at the latest; fixes are
/// fed in timestamp order with the auto-pause and publish timers firing at
/// their configured cadence in between.
pub fn replay_track<S, H, L>(
    controller: &mut SessionController<S, H, L>,
    samples: &[PositionSample],
    load_weight_kg: f64,
) -> TrackerResult<ReplayReport>
where
    S: SessionStore,
    H: HealthProvider,
    L: LocationProvider,
{
    let mut ordered: Vec<&PositionSample> = samples
        .iter()
        .filter(|sample| sample.timestamp.is_finite())
        .collect();
    ordered.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));

    let (first, last) = match (ordered.first(), ordered.last()) {
        (Some(first), Some(last)) => (first.timestamp, last.timestamp),
        _ => return Err(TrackerError::EmptyTrack),
    };
    if ordered.len() < samples.len() {
        log::warn!(
            "Skipping {} samples without a usable timestamp",
            samples.len() - ordered.len()
        );
    }

    let session_id = controller.start(load_weight_kg, first)?;
    let mut report = ReplayReport::new(session_id, ordered.len());
    let mut ticks = TickSchedule::new(
        first,
        controller.config().auto_pause.check_interval_secs,
        controller.config().publish_interval_secs,
    );

    for sample in ordered {
        ticks.fire_until(controller, sample.timestamp, &mut report);

        let before = controller.is_auto_paused();
        match controller.handle_sample(sample) {
            SampleOutcome::Accepted { persisted, .. } => {
                report.accepted += 1;
                if persisted {
                    report.persisted += 1;
                }
            }
            SampleOutcome::Rejected(reason) => report.rejected.record(reason),
            SampleOutcome::Ignored => {}
        }
        report.note_auto_pause(before, controller.is_auto_paused());
    }

    report.duration_secs = last - first;
    report.metrics = match controller.stop(last) {
        Some(metrics) => metrics,
        None => controller.metrics().clone(),
    };
    log::info!(
        "Replayed {} samples: {} accepted, {} rejected",
        report.samples,
        report.accepted,
        report.rejected.total()
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TrackerConfig;
    use crate::health::StaticHealthProvider;
    use crate::location::RecordingLocationProvider;
    use crate::metrics::TrackingState;
    use crate::store::MemoryStore;
    use approx::assert_relative_eq;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    type Controller = SessionController<MemoryStore, StaticHealthProvider, RecordingLocationProvider>;

    const T0: f64 = 1_720_000_000.0;
    const STEP: f64 = 0.0001;

    fn controller() -> Controller {
        SessionController::new(
            TrackerConfig::default(),
            MemoryStore::new(),
            StaticHealthProvider::with_weight(80.0),
            RecordingLocationProvider::new(),
        )
    }

    fn fix(t: f64, lat: f64) -> PositionSample {
        PositionSample::new(T0 + t, lat, 11.4, 550.0, 7.0, 2.2)
    }

    /// Walk 20 fixes, stand for a minute, walk 10 more
    fn walk_stop_walk() -> Vec<PositionSample> {
        let mut track = Vec::new();
        let mut lat = 46.0;
        for i in 0..20 {
            track.push(fix(i as f64 * 5.0, lat));
            lat += STEP;
        }
        lat -= STEP;
        for i in 0..13 {
            track.push(fix(100.0 + i as f64 * 5.0, lat));
        }
        for i in 0..10 {
            lat += STEP;
            track.push(fix(165.0 + i as f64 * 5.0, lat));
        }
        track
    }

    #[test]
    fn test_replay_walk_stop_walk() {
        let mut c = controller();
        let report = replay_track(&mut c, &walk_stop_walk(), 18.0).unwrap();

        assert_eq!(report.samples, 43);
        assert_eq!(report.accepted, 43);
        assert_eq!(report.rejected.total(), 0);
        assert_eq!(report.auto_pauses, 1);
        assert_eq!(report.auto_resumes, 1);
        // Fixes from 130 s to 160 s arrived while auto-paused
        assert_eq!(report.persisted, 36);
        assert_eq!(report.duration_secs, 210.0);

        // 29 steps of ~11.1 m
        assert!(
            report.metrics.distance_m > 315.0 && report.metrics.distance_m < 330.0,
            "distance {}",
            report.metrics.distance_m
        );
        assert!(report.metrics.energy_kcal > 0.0);

        assert_eq!(c.state(), TrackingState::Stopped);
        assert_eq!(c.store().points_for(report.session_id).len(), 36);
        let record = c.store().session(report.session_id).unwrap();
        assert!(!record.is_active);
        assert_eq!(record.load_weight_kg, 18.0);
    }

    #[test]
    fn test_replay_counts_rejections_and_sorts() {
        let mut noisy = fix(10.0, 46.0002);
        noisy.horizontal_accuracy = 60.0;
        let mut broken = fix(20.0, 46.0003);
        broken.horizontal_accuracy = 0.0;
        let track = vec![
            fix(30.0, 46.0003),
            fix(0.0, 46.0),
            fix(1.0, 46.00001),
            noisy,
            broken,
            fix(5.0, 46.0001),
        ];

        let mut c = controller();
        let report = replay_track(&mut c, &track, 0.0).unwrap();
        assert_eq!(report.accepted, 3);
        assert_eq!(
            report.rejected,
            RejectionCounts {
                invalid_accuracy: 1,
                poor_accuracy: 1,
                too_frequent: 1,
                invalid_timestamp: 0,
            }
        );
        assert_eq!(report.duration_secs, 30.0);
    }

    #[test]
    fn test_replay_empty_track() {
        let mut c = controller();
        assert!(matches!(
            replay_track(&mut c, &[], 10.0),
            Err(TrackerError::EmptyTrack)
        ));
        assert_eq!(c.state(), TrackingState::Stopped);
    }

    #[test]
    fn test_load_track_plain_and_gzip() {
        let dir = std::env::temp_dir().join(format!("ruck_replay_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let track = walk_stop_walk();

        let plain = dir.join("track.json");
        std::fs::write(&plain, serde_json::to_string(&track).unwrap()).unwrap();
        let loaded = load_track(&plain).unwrap();
        assert_eq!(loaded.len(), track.len());
        assert_relative_eq!(loaded[42].latitude, track[42].latitude, epsilon = 1e-12);
        assert_eq!(loaded[42].heading, -1.0);

        let wrapped = serde_json::json!({ "samples": track });
        let gz_path = dir.join("track.json.gz");
        let mut encoder = GzEncoder::new(File::create(&gz_path).unwrap(), Compression::default());
        encoder
            .write_all(wrapped.to_string().as_bytes())
            .unwrap();
        encoder.finish().unwrap();
        assert_eq!(load_track(&gz_path).unwrap().len(), 43);

        assert!(matches!(
            load_track(&dir.join("missing.json")),
            Err(TrackerError::Io(_))
        ));
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
