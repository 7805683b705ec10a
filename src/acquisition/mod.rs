//! Observation document acquisition
//!
//! Receives obsdoc XML from the control system's multicast stream and decodes
//! it into scan records.

pub mod multicast;
pub mod obsdoc;

pub use multicast::{ListenerError, ObsdocListener};
pub use obsdoc::{parse_obsdoc, parse_obsdoc_bytes, Obsdoc, ObsdocError};
