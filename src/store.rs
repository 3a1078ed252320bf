use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::collaborators::{SessionId, SessionStore, SessionTotals};
use crate::error::StoreError;
use crate::sample::PositionSample;

/// Pending points are committed once this many have accumulated
pub const BATCH_SIZE: usize = 10;
/// Sessions kept in the in-memory recent list
pub const RECENT_SESSIONS: usize = 5;
/// Points and completed sessions older than this are purged
pub const RETENTION_SECS: f64 = 48.0 * 3600.0;

pub fn to_datetime(timestamp: f64) -> DateTime<Utc> {
    if !timestamp.is_finite() {
        return DateTime::<Utc>::default();
    }
    let secs = timestamp.floor();
    let nanos = ((timestamp - secs) * 1e9) as u32;
    DateTime::<Utc>::from_timestamp(secs as i64, nanos.min(999_999_999)).unwrap_or_default()
}

/// Persisted session record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: SessionId,
    pub load_weight_kg: f64,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub is_paused: bool,
    pub current_latitude: Option<f64>,
    pub current_longitude: Option<f64>,
    pub point_count: u32,
    pub totals: SessionTotals,
}

/// Persisted location point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationPoint {
    pub session_id: SessionId,
    pub timestamp: f64,
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
    pub horizontal_accuracy: f64,
    pub vertical_accuracy: f64,
    pub speed: f64,
    pub heading: f64,
    pub heart_rate: Option<f64>,
}

impl LocationPoint {
    fn from_sample(session_id: SessionId, sample: &PositionSample) -> Self {
        LocationPoint {
            session_id,
            timestamp: sample.timestamp,
            latitude: sample.latitude,
            longitude: sample.longitude,
            altitude: sample.altitude,
            horizontal_accuracy: sample.horizontal_accuracy,
            vertical_accuracy: sample.vertical_accuracy,
            speed: sample.speed,
            heading: sample.heading,
            heart_rate: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StorageStats {
    pub session_count: usize,
    pub point_count: usize,
    pub estimated_size_bytes: usize,
}

/// In-memory session store with batched point commits and a retention
/// window.
///
/// Appended points sit in a pending batch until [`BATCH_SIZE`] accumulate
/// or the session pauses/completes.
pub struct MemoryStore {
    next_id: u64,
    current: Option<SessionRecord>,
    completed: Vec<SessionRecord>,
    recent: VecDeque<SessionRecord>,
    points: Vec<LocationPoint>,
    pending: Vec<LocationPoint>,
    commits: u32,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore {
            next_id: 1,
            current: None,
            completed: Vec::new(),
            recent: VecDeque::with_capacity(RECENT_SESSIONS),
            points: Vec::new(),
            pending: Vec::new(),
            commits: 0,
        }
    }

    pub fn current_session(&self) -> Option<&SessionRecord> {
        self.current.as_ref()
    }

    /// Most recent first, at most [`RECENT_SESSIONS`]
    pub fn recent_sessions(&self) -> impl Iterator<Item = &SessionRecord> {
        self.recent.iter()
    }

    pub fn session(&self, id: SessionId) -> Option<&SessionRecord> {
        self.current
            .iter()
            .chain(self.completed.iter())
            .find(|record| record.id == id)
    }

    /// Committed and pending points of a session in append order
    pub fn points_for(&self, id: SessionId) -> Vec<LocationPoint> {
        self.points
            .iter()
            .chain(self.pending.iter())
            .filter(|point| point.session_id == id)
            .cloned()
            .collect()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Number of batch commits performed so far
    pub fn commit_count(&self) -> u32 {
        self.commits
    }

    pub fn storage_stats(&self) -> StorageStats {
        let session_count = self.completed.len() + self.current.iter().count();
        let point_count = self.points.len() + self.pending.len();
        StorageStats {
            session_count,
            point_count,
            estimated_size_bytes: point_count * 96 + session_count * 256,
        }
    }

    /// Drop points and completed sessions older than the retention window.
    /// Returns how many points were removed.
    pub fn purge_expired(&mut self, now: f64) -> usize {
        let cutoff = now - RETENTION_SECS;
        let before = self.points.len();
        self.points.retain(|point| point.timestamp >= cutoff);
        let removed = before - self.points.len();

        let cutoff_date = to_datetime(cutoff);
        self.completed
            .retain(|record| record.end_date.map_or(true, |end| end >= cutoff_date));
        self.recent
            .retain(|record| record.end_date.map_or(true, |end| end >= cutoff_date));

        if removed > 0 {
            log::info!("Purged {} location points older than 48h", removed);
        }
        removed
    }

    pub fn export(&self, id: SessionId) -> Option<SessionExport> {
        let record = self.session(id)?.clone();
        let points = self.points_for(id);
        Some(SessionExport { record, points })
    }

    fn commit(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        log::debug!("Committing {} location points", self.pending.len());
        self.points.append(&mut self.pending);
        self.commits += 1;
    }

    fn active_mut(&mut self, session: SessionId) -> Result<&mut SessionRecord, StoreError> {
        match self.current.as_mut() {
            Some(record) if record.id == session => Ok(record),
            Some(record) => Err(StoreError::StaleSession {
                expected: record.id,
                actual: session,
            }),
            None => Err(StoreError::NoActiveSession),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore for MemoryStore {
    fn create_session(&mut self, load_weight_kg: f64, started_at: f64) -> Result<SessionId, StoreError> {
        if self.current.is_some() {
            return Err(StoreError::SessionAlreadyExists);
        }

        let id = SessionId(self.next_id);
        self.next_id += 1;
        self.current = Some(SessionRecord {
            id,
            load_weight_kg,
            start_date: to_datetime(started_at),
            end_date: None,
            is_active: true,
            is_paused: false,
            current_latitude: None,
            current_longitude: None,
            point_count: 0,
            totals: SessionTotals::default(),
        });
        Ok(id)
    }

    fn append_location_point(&mut self, session: SessionId, sample: &PositionSample) -> Result<(), StoreError> {
        let record = self.active_mut(session)?;
        record.current_latitude = Some(sample.latitude);
        record.current_longitude = Some(sample.longitude);
        record.point_count += 1;

        self.pending.push(LocationPoint::from_sample(session, sample));
        if self.pending.len() >= BATCH_SIZE {
            self.commit();
        }
        Ok(())
    }

    fn attach_heart_rate(&mut self, session: SessionId, bpm: f64) -> Result<(), StoreError> {
        self.active_mut(session)?;
        // pending points are newer than committed ones
        let newest = self
            .pending
            .iter_mut()
            .rev()
            .chain(self.points.iter_mut().rev())
            .find(|point| point.session_id == session);
        if let Some(point) = newest {
            point.heart_rate = Some(bpm);
        }
        Ok(())
    }

    fn pause_session(&mut self, session: SessionId) -> Result<(), StoreError> {
        self.active_mut(session)?.is_paused = true;
        self.commit();
        Ok(())
    }

    fn resume_session(&mut self, session: SessionId) -> Result<(), StoreError> {
        self.active_mut(session)?.is_paused = false;
        Ok(())
    }

    fn update_totals(&mut self, session: SessionId, totals: &SessionTotals) -> Result<(), StoreError> {
        self.active_mut(session)?.totals = *totals;
        Ok(())
    }

    fn complete_session(&mut self, session: SessionId, ended_at: f64) -> Result<(), StoreError> {
        {
            let record = self.active_mut(session)?;
            record.end_date = Some(to_datetime(ended_at));
            record.is_active = false;
            record.is_paused = false;
        }
        self.commit();

        if let Some(record) = self.current.take() {
            self.recent.push_front(record.clone());
            while self.recent.len() > RECENT_SESSIONS {
                self.recent.pop_back();
            }
            self.completed.push(record);
        }
        Ok(())
    }
}

/// Complete session export (JSON-serializable)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionExport {
    pub record: SessionRecord,
    pub points: Vec<LocationPoint>,
}

impl SessionExport {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// GPX 1.1 document with one track segment
    pub fn to_gpx_xml(&self) -> String {
        let name = format!("Ruck {}", self.record.id);
        let mut xml = String::new();
        xml.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        xml.push_str("<gpx version=\"1.1\" creator=\"ruck_tracker\">\n");
        xml.push_str("  <metadata>\n");
        xml.push_str(&format!("    <name>{}</name>\n", name));
        xml.push_str(&format!(
            "    <desc>Load {:.1} kg, started {}</desc>\n",
            self.record.load_weight_kg,
            self.record.start_date.to_rfc3339()
        ));
        xml.push_str("  </metadata>\n");
        xml.push_str("  <trk>\n");
        xml.push_str(&format!("    <name>{}</name>\n", name));
        xml.push_str("    <trkseg>\n");

        for point in &self.points {
            xml.push_str(&format!(
                "      <trkpt lat=\"{}\" lon=\"{}\">\n",
                point.latitude, point.longitude
            ));
            xml.push_str(&format!("        <ele>{}</ele>\n", point.altitude));
            xml.push_str(&format!(
                "        <time>{}</time>\n",
                to_datetime(point.timestamp).to_rfc3339()
            ));
            if let Some(bpm) = point.heart_rate {
                xml.push_str(&format!(
                    "        <extensions><hr>{}</hr></extensions>\n",
                    bpm.round() as u32
                ));
            }
            xml.push_str("      </trkpt>\n");
        }

        xml.push_str("    </trkseg>\n");
        xml.push_str("  </trk>\n");
        xml.push_str("</gpx>\n");
        xml
    }
}
