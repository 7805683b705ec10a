//! Per-project session state

use serde::{Deserialize, Serialize};

use super::ScanRecord;

/// Last-seen scan of a project with an open session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectState {
    /// Scan start time (epoch seconds)
    pub unix_time: f64,
    /// Right ascension (degrees)
    pub ra_deg: f64,
    /// Declination (degrees)
    pub dec_deg: f64,
    /// Scan intent of the stored scan
    pub intent: String,
    /// Event id minted when this scan was processed
    pub event_id: u64,
    /// Source name of the stored scan
    pub source_name: String,
}

impl ProjectState {
    /// Snapshot a scan record under the given event id.
    pub fn from_record(record: &ScanRecord, event_id: u64) -> Self {
        Self {
            unix_time: record.absolute_time(),
            ra_deg: record.ra_deg,
            dec_deg: record.dec_deg,
            intent: record.scan_intent.clone(),
            event_id,
            source_name: record.source_name.clone(),
        }
    }
}
