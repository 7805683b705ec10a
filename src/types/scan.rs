//! Scan record types
//!
//! A [`ScanRecord`] is the normalized form of one observation document: one
//! per scan, produced by the obsdoc adapter and consumed by the pipeline.

use serde::{Deserialize, Serialize};

use crate::config::defaults::{MJD_OFFSET_DAYS, SECS_IN_DAY, UNIX_EPOCH_JD};

/// Source name the control system uses to mark the end of a session.
pub const FINISH_SOURCE: &str = "FINISH";

/// Scan start time as delivered by the adapter.
///
/// Observation documents carry Modified Julian Date; replayed or hand-built
/// records may already carry epoch seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanTime {
    /// Modified Julian Date (days)
    Mjd(f64),
    /// Unix epoch seconds
    Unix(f64),
}

impl ScanTime {
    /// Absolute (Unix epoch) time in seconds.
    pub fn to_unix(self) -> f64 {
        match self {
            ScanTime::Mjd(mjd) => mjd_to_unix(mjd),
            ScanTime::Unix(secs) => secs,
        }
    }
}

/// Convert a Modified Julian Date to Unix epoch seconds.
pub fn mjd_to_unix(mjd: f64) -> f64 {
    (mjd + MJD_OFFSET_DAYS - UNIX_EPOCH_JD) * SECS_IN_DAY
}

/// One scan of the telescope's schedule, normalized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanRecord {
    /// Dataset / project identifier (e.g. `19A-123.sb3741.eb3742`)
    pub project_id: String,
    /// Scan sequence number within the scheduling block (1-based)
    pub scan_number: u32,
    /// Value of the `ScanIntent` intent, `"None"` if absent
    pub scan_intent: String,
    /// Source name; [`FINISH_SOURCE`] marks a terminal scan
    pub source_name: String,
    /// Right ascension (degrees)
    pub ra_deg: f64,
    /// Declination (degrees)
    pub dec_deg: f64,
    /// Scan start time
    pub start_time: ScanTime,
}

impl ScanRecord {
    /// Whether this record closes the project's current session.
    pub fn is_finish(&self) -> bool {
        self.source_name == FINISH_SOURCE
    }

    /// Start time in Unix epoch seconds.
    pub fn absolute_time(&self) -> f64 {
        self.start_time.to_unix()
    }

    /// Right ascension as `HH:MM:SS.sss`.
    pub fn ra_str(&self) -> String {
        sexagesimal(self.ra_deg / 15.0, false)
    }

    /// Declination as `+DD:MM:SS.sss`.
    pub fn dec_str(&self) -> String {
        sexagesimal(self.dec_deg, true)
    }
}

/// Format `value` (hours or degrees) as `[sign]NN:MM:SS.sss`.
///
/// Rounds to the millisecond before splitting so `59.9999` carries into the
/// next minute instead of printing `60.000`.
fn sexagesimal(value: f64, signed: bool) -> String {
    let sign = if value < 0.0 {
        "-"
    } else if signed {
        "+"
    } else {
        ""
    };
    let millis = (value.abs() * 3_600_000.0).round() as u64;
    let secs = millis / 1000;
    format!(
        "{}{:02}:{:02}:{:02}.{:03}",
        sign,
        secs / 3600,
        (secs / 60) % 60,
        secs % 60,
        millis % 1000
    )
}
