//! Scan Processing Pipeline
//!
//! ```text
//! ScanSource ──► TransitionClassifier ──► DispatchGate ──► ProjectStateTable::apply
//!                 (reads state table)     (queue file,     (insert / replace /
//!                                          dispatch mode)   remove on FINISH)
//! ```
//!
//! One record is carried through all stages before the next is read.

pub mod classifier;
pub mod event_id;
pub mod processing_loop;
pub mod source;
mod state;

pub use classifier::{Classification, Rule, SessionState, SkipReason, TransitionClassifier, RULES};
pub use event_id::EventIdGenerator;
pub use processing_loop::{Delivery, PipelineStats, ProcessingLoop, RecordOutcome};
pub use state::{ProjectStateTable, StateChange};
