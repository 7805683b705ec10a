//! VLA Dispatcher: coordinated observing triggers
//!
//! Follows the telescope's observation stream scan by scan, tracks the open
//! session of every project, and raises READY / SESSION / DONE triggers for
//! external experiments through a single-slot command queue file.
//!
//! ## Architecture
//!
//! - **Acquisition**: obsdoc multicast listener and XML decoder
//! - **Pipeline**: transition classifier, project state table, processing loop
//! - **Dispatch**: queue-file handoff gate

pub mod acquisition;
pub mod config;
pub mod dispatch;
pub mod pipeline;
pub mod types;

pub use config::{ConfigOrigin, DispatcherConfig, FilterConfig, QueueFormat};

pub use types::{DispatchEvent, NoticeType, ProjectState, ScanRecord, ScanTime};

pub use pipeline::{
    Classification, PipelineStats, ProcessingLoop, ProjectStateTable, TransitionClassifier,
};

pub use dispatch::{DispatchError, DispatchGate};
