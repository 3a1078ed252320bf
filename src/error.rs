use thiserror::Error;

use crate::collaborators::SessionId;

/// Failures reported by the persistence collaborator
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("An active session already exists")]
    SessionAlreadyExists,

    #[error("No active session")]
    NoActiveSession,

    #[error("Call targets session {actual} but the active session is {expected}")]
    StaleSession {
        expected: SessionId,
        actual: SessionId,
    },
}

/// Failures reported by the health/body-metrics collaborator
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HealthError {
    #[error("Health data unavailable: {0}")]
    Unavailable(String),

    #[error("Workout session already running")]
    WorkoutAlreadyRunning,

    #[error("No workout session running")]
    NoWorkoutRunning,
}

/// Engine-level error types
#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("Session already exists")]
    SessionAlreadyExists,

    #[error("Storage error: {0}")]
    Store(#[source] StoreError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Tracker event loop is no longer running")]
    ChannelClosed,

    #[error("Track contains no samples")]
    EmptyTrack,
}

impl From<StoreError> for TrackerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::SessionAlreadyExists => TrackerError::SessionAlreadyExists,
            other => TrackerError::Store(other),
        }
    }
}

/// Result type for engine operations
pub type TrackerResult<T> = Result<T, TrackerError>;
