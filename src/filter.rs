use std::collections::VecDeque;

use crate::config::FilterConfig;
use crate::sample::{PositionSample, QualityTier};

/// Why a fix was dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// Accuracy <= 0 or not a number
    InvalidAccuracy,
    /// Accuracy at or beyond the usable limit
    PoorAccuracy,
    /// Arrived before the minimum update interval elapsed
    TooFrequent,
    /// Timestamp is NaN or infinite
    InvalidTimestamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOutcome {
    Accepted(QualityTier),
    Rejected(RejectReason),
}

impl FilterOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, FilterOutcome::Accepted(_))
    }
}

/// Bounded most-recent-first buffer of accepted fixes
#[derive(Debug, Clone)]
pub struct RecentSampleWindow {
    samples: VecDeque<PositionSample>,
    capacity: usize,
}

impl RecentSampleWindow {
    pub fn new(capacity: usize) -> Self {
        RecentSampleWindow {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, sample: PositionSample) {
        self.samples.push_front(sample);
        while self.samples.len() > self.capacity {
            self.samples.pop_back();
        }
    }

    pub fn latest(&self) -> Option<&PositionSample> {
        self.samples.front()
    }

    /// The fix accepted just before the latest one
    pub fn previous(&self) -> Option<&PositionSample> {
        self.samples.get(1)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PositionSample> {
        self.samples.iter()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }
}

/// Accuracy and rate gate in front of the metrics pipeline
pub struct SampleFilter {
    config: FilterConfig,
    window: RecentSampleWindow,
    last_accepted_at: Option<f64>,
}

impl SampleFilter {
    pub fn new(config: FilterConfig) -> Self {
        let window = RecentSampleWindow::new(config.window_capacity);
        SampleFilter {
            config,
            window,
            last_accepted_at: None,
        }
    }

    /// Classify a fix. Accepted fixes are pushed into the window.
    pub fn accept(&mut self, sample: &PositionSample) -> FilterOutcome {
        if !sample.timestamp.is_finite() {
            return FilterOutcome::Rejected(RejectReason::InvalidTimestamp);
        }
        let accuracy = sample.horizontal_accuracy;
        if !(accuracy > 0.0) {
            return FilterOutcome::Rejected(RejectReason::InvalidAccuracy);
        }
        if accuracy >= self.config.max_horizontal_accuracy_m {
            return FilterOutcome::Rejected(RejectReason::PoorAccuracy);
        }

        if let Some(last) = self.last_accepted_at {
            if sample.timestamp - last < self.config.min_update_interval_secs {
                return FilterOutcome::Rejected(RejectReason::TooFrequent);
            }
        }

        self.last_accepted_at = Some(sample.timestamp);
        self.window.push(sample.clone());
        FilterOutcome::Accepted(QualityTier::from_accuracy(accuracy))
    }

    pub fn window(&self) -> &RecentSampleWindow {
        &self.window
    }

    /// Forget window contents but keep the rate limit anchored
    pub fn clear_window(&mut self) {
        self.window.clear();
    }

    pub fn reset(&mut self) {
        self.window.clear();
        self.last_accepted_at = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fix(timestamp: f64, accuracy: f64) -> PositionSample {
        PositionSample::new(timestamp, 40.0, -105.0, 1600.0, accuracy, 1.2)
    }

    #[test]
    fn test_rejects_invalid_and_poor_accuracy() {
        let mut filter = SampleFilter::new(FilterConfig::default());

        assert_eq!(
            filter.accept(&fix(0.0, 0.0)),
            FilterOutcome::Rejected(RejectReason::InvalidAccuracy)
        );
        assert_eq!(
            filter.accept(&fix(0.0, -3.0)),
            FilterOutcome::Rejected(RejectReason::InvalidAccuracy)
        );
        assert_eq!(
            filter.accept(&fix(0.0, f64::NAN)),
            FilterOutcome::Rejected(RejectReason::InvalidAccuracy)
        );
        assert_eq!(
            filter.accept(&fix(0.0, 30.0)),
            FilterOutcome::Rejected(RejectReason::PoorAccuracy)
        );
        assert!(filter.window().is_empty());
    }

    #[test]
    fn test_accepts_and_classifies() {
        let mut filter = SampleFilter::new(FilterConfig::default());

        assert_eq!(
            filter.accept(&fix(0.0, 8.0)),
            FilterOutcome::Accepted(QualityTier::Excellent)
        );
        assert_eq!(
            filter.accept(&fix(2.0, 15.0)),
            FilterOutcome::Accepted(QualityTier::Good)
        );
        assert_eq!(
            filter.accept(&fix(4.0, 25.0)),
            FilterOutcome::Accepted(QualityTier::Fair)
        );
        assert_eq!(
            filter.accept(&fix(6.0, 29.9)),
            FilterOutcome::Accepted(QualityTier::Poor)
        );
    }

    #[test]
    fn test_throttles_frequent_updates() {
        let mut filter = SampleFilter::new(FilterConfig::default());

        assert!(filter.accept(&fix(100.0, 5.0)).is_accepted());
        assert_eq!(
            filter.accept(&fix(101.5, 5.0)),
            FilterOutcome::Rejected(RejectReason::TooFrequent)
        );
        assert!(filter.accept(&fix(102.0, 5.0)).is_accepted());
        assert_eq!(filter.window().len(), 2);
    }

    #[test]
    fn test_window_is_most_recent_first_and_bounded() {
        let mut filter = SampleFilter::new(FilterConfig::default());

        for i in 0..8 {
            filter.accept(&fix(i as f64 * 2.0, 5.0));
        }

        let window = filter.window();
        assert_eq!(window.len(), 5);
        assert_eq!(window.latest().unwrap().timestamp, 14.0);
        assert_eq!(window.previous().unwrap().timestamp, 12.0);
        let timestamps: Vec<f64> = window.iter().map(|s| s.timestamp).collect();
        assert_eq!(timestamps, vec![14.0, 12.0, 10.0, 8.0, 6.0]);
    }

    #[test]
    fn test_rejects_non_finite_timestamp() {
        let mut filter = SampleFilter::new(FilterConfig::default());
        assert!(filter.accept(&fix(10.0, 5.0)).is_accepted());

        for timestamp in [f64::NAN, f64::INFINITY] {
            assert_eq!(
                filter.accept(&fix(timestamp, 5.0)),
                FilterOutcome::Rejected(RejectReason::InvalidTimestamp)
            );
        }
        assert_eq!(filter.window().len(), 1);
        // The rate limit is still anchored on the last good fix
        assert_eq!(
            filter.accept(&fix(11.0, 5.0)),
            FilterOutcome::Rejected(RejectReason::TooFrequent)
        );
        assert!(filter.accept(&fix(12.0, 5.0)).is_accepted());
    }

    #[test]
    fn test_clear_window_keeps_rate_limit() {
        let mut filter = SampleFilter::new(FilterConfig::default());
        filter.accept(&fix(10.0, 5.0));
        filter.clear_window();

        assert!(filter.window().is_empty());
        assert!(!filter.accept(&fix(11.0, 5.0)).is_accepted());

        filter.reset();
        assert!(filter.accept(&fix(11.0, 5.0)).is_accepted());
    }
}
