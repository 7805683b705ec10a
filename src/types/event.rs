//! Dispatch event types
//!
//! A [`DispatchEvent`] is the decision handed from the classifier to the
//! dispatch gate. Its serialized form is the command-queue wire format.

use serde::{Deserialize, Serialize};

/// Value used for RA, Dec and duration when the event does not carry them.
pub const UNSET: f64 = -1.0;

/// Kind of trigger raised for an external experiment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum NoticeType {
    /// A project's session has started (first scan)
    Ready,
    /// A matching scan has elapsed; carries its position and duration
    Session,
    /// A project's session has finished
    Done,
}

impl NoticeType {
    /// Command name used by the legacy single-line queue format.
    pub fn legacy_name(self) -> &'static str {
        match self {
            NoticeType::Ready => "ELWA_READY",
            NoticeType::Session => "ELWA_SESSION",
            NoticeType::Done => "ELWA_DONE",
        }
    }
}

impl std::fmt::Display for NoticeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NoticeType::Ready => write!(f, "READY"),
            NoticeType::Session => write!(f, "SESSION"),
            NoticeType::Done => write!(f, "DONE"),
        }
    }
}

/// A trigger decision for one project.
///
/// Field names are renamed to the queue consumer's vocabulary on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchEvent {
    pub notice_type: NoticeType,
    pub event_id: u64,
    pub project_id: String,
    #[serde(rename = "scan_id")]
    pub scan_number: u32,
    #[serde(rename = "scan_intent")]
    pub intent: String,
    /// Epoch seconds
    #[serde(rename = "event_t")]
    pub event_time: f64,
    #[serde(rename = "event_source")]
    pub source: String,
    /// Degrees, or [`UNSET`]
    #[serde(rename = "event_ra")]
    pub ra_deg: f64,
    /// Degrees, or [`UNSET`]
    #[serde(rename = "event_dec")]
    pub dec_deg: f64,
    /// Seconds, or [`UNSET`]
    #[serde(rename = "event_duration")]
    pub duration_seconds: f64,
}

impl DispatchEvent {
    /// Render the legacy single-line command: `TYPE id t ra dec duration`.
    pub fn to_legacy_line(&self) -> String {
        format!(
            "{} {} {:.6} {:.6} {:.6} {:.6}",
            self.notice_type.legacy_name(),
            self.event_id,
            self.event_time,
            self.ra_deg,
            self.dec_deg,
            self.duration_seconds
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ready() -> DispatchEvent {
        DispatchEvent {
            notice_type: NoticeType::Ready,
            event_id: 2610161230,
            project_id: "19A-123.sb1.eb2".to_string(),
            scan_number: 1,
            intent: "OBSERVE_TARGET".to_string(),
            event_time: 1_760_617_800.0,
            source: "J1331+3030".to_string(),
            ra_deg: UNSET,
            dec_deg: UNSET,
            duration_seconds: UNSET,
        }
    }

    #[test]
    fn test_wire_field_names() {
        let value = serde_json::to_value(ready()).unwrap();
        let obj = value.as_object().unwrap();
        let mut keys: Vec<&str> = obj.keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(
            keys,
            vec![
                "event_dec",
                "event_duration",
                "event_id",
                "event_ra",
                "event_source",
                "event_t",
                "notice_type",
                "project_id",
                "scan_id",
                "scan_intent",
            ]
        );
        assert_eq!(obj["notice_type"], "READY");
        assert_eq!(obj["scan_id"], 1);
        assert_eq!(obj["event_ra"], -1.0);
    }

    #[test]
    fn test_legacy_line() {
        assert_eq!(
            ready().to_legacy_line(),
            "ELWA_READY 2610161230 1760617800.000000 -1.000000 -1.000000 -1.000000"
        );
    }

    #[test]
    fn test_notice_type_display() {
        assert_eq!(format!("{}", NoticeType::Ready), "READY");
        assert_eq!(format!("{}", NoticeType::Session), "SESSION");
        assert_eq!(format!("{}", NoticeType::Done), "DONE");
    }
}
