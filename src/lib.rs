//! Rucking activity tracker core
//!
//! Turns a stream of position fixes into distance, elevation, grade, pace and
//! load-adjusted energy expenditure, with automatic pause detection and a
//! session state machine that drives persistence, health and location
//! collaborators.

pub mod auto_pause;
pub mod collaborators;
pub mod config;
pub mod controller;
pub mod energy;
pub mod error;
pub mod filter;
pub mod health;
pub mod location;
pub mod metrics;
pub mod motion;
pub mod replay;
pub mod runtime;
pub mod sample;
pub mod store;

pub use collaborators::{
    BodyMetrics, HealthProvider, LocationProvider, PowerProfile, SessionId, SessionStore,
    SessionTotals,
};
pub use config::TrackerConfig;
pub use controller::{SampleOutcome, SessionController};
pub use energy::{EnergyModel, TerrainBand};
pub use error::{HealthError, StoreError, TrackerError, TrackerResult};
pub use metrics::{SessionMetrics, TrackerSnapshot, TrackingState};
pub use runtime::{spawn_tracker, Clock, ManualClock, SystemClock, TrackerCommand, TrackerEvent, TrackerHandle};
pub use sample::{PositionSample, QualityTier};
