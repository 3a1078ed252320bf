use crate::collaborators::{LocationProvider, PowerProfile};

/// Location provider that records the controller's requests
///
/// Used by the replay driver, where fixes come from a log file, and by
/// tests that check which power profile the engine asked for.
#[derive(Debug, Clone)]
pub struct RecordingLocationProvider {
    updating: bool,
    profile: PowerProfile,
    history: Vec<PowerProfile>,
}

impl RecordingLocationProvider {
    pub fn new() -> Self {
        RecordingLocationProvider {
            updating: false,
            profile: PowerProfile::Full,
            history: Vec::new(),
        }
    }

    pub fn is_updating(&self) -> bool {
        self.updating
    }

    pub fn profile(&self) -> PowerProfile {
        self.profile
    }

    pub fn distance_filter_m(&self) -> f64 {
        self.profile.distance_filter_m()
    }

    /// Every profile request in order, including repeats
    pub fn history(&self) -> &[PowerProfile] {
        &self.history
    }
}

impl Default for RecordingLocationProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl LocationProvider for RecordingLocationProvider {
    fn start_updates(&mut self) {
        self.updating = true;
    }

    fn stop_updates(&mut self) {
        self.updating = false;
    }

    fn set_power_profile(&mut self, profile: PowerProfile) {
        if profile != self.profile {
            log::debug!(
                "Location profile {:?} -> {:?} (distance filter {} m)",
                self.profile,
                profile,
                profile.distance_filter_m()
            );
        }
        self.profile = profile;
        self.history.push(profile);
    }
}
